//! Property-based tests for the expiring line.
//!
//! Random operation sequences run against both a `Line` and a plain `HashMap`
//! model of what should be visible, on a manual clock.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::clock::{Clock, ManualClock};
use crate::error::Error;
use crate::line::Line;

const DEFAULT_TTL_MS: u64 = 100;

#[derive(Debug, Clone)]
enum Op {
    Store { key: u8, value: u32 },
    StoreFor { key: u8, value: u32, ttl_ms: u64 },
    Renew { key: u8 },
    RenewFor { key: u8, ttl_ms: u64 },
    Check { key: u8 },
    Get { key: u8 },
    Delete { key: u8 },
    Advance { ms: u64 },
    Purge,
}

fn key_strategy() -> impl Strategy<Value = u8> {
    0u8..8
}

fn default_ttl_op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| Op::Store { key, value }),
        key_strategy().prop_map(|key| Op::Renew { key }),
        key_strategy().prop_map(|key| Op::Check { key }),
        key_strategy().prop_map(|key| Op::Get { key }),
        key_strategy().prop_map(|key| Op::Delete { key }),
        (0u64..150).prop_map(|ms| Op::Advance { ms }),
    ]
}

fn mixed_ttl_op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        default_ttl_op_strategy(),
        (key_strategy(), any::<u32>(), 1u64..300)
            .prop_map(|(key, value, ttl_ms)| Op::StoreFor { key, value, ttl_ms }),
        (key_strategy(), 1u64..300).prop_map(|(key, ttl_ms)| Op::RenewFor { key, ttl_ms }),
        Just(Op::Purge),
    ]
}

/// What a caller should observe: the value and deadline last written per key.
struct Model {
    records: HashMap<u8, (u32, Instant)>,
}

impl Model {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    fn live(&self, key: u8, now: Instant) -> Option<u32> {
        match self.records.get(&key) {
            Some(&(value, deadline)) if deadline > now => Some(value),
            _ => None,
        }
    }

    fn live_count(&self, now: Instant) -> usize {
        self.records.values().filter(|(_, d)| *d > now).count()
    }
}

impl Op {
    /// Whether the operation gives the line a chance to sweep.
    fn sweeps(&self) -> bool {
        !matches!(self, Op::Delete { .. } | Op::Advance { .. } | Op::Purge)
    }
}

fn run(ops: Vec<Op>, ordered: bool) -> std::result::Result<(), TestCaseError> {
    let clock = ManualClock::new();
    let default_ttl = Duration::from_millis(DEFAULT_TTL_MS);
    let mut line = Line::with_clock(default_ttl, clock.clone()).unwrap();
    let mut model = Model::new();
    let mut next_sweep_at = clock.now() + default_ttl;

    for op in ops {
        let now = clock.now();
        let sweeps = op.sweeps();
        match op {
            Op::Store { key, value } => {
                let expected = model.live(key, now).is_some();
                prop_assert_eq!(line.store(key, value), expected);
                model.records.insert(key, (value, now + default_ttl));
            }
            Op::StoreFor { key, value, ttl_ms } => {
                let ttl = Duration::from_millis(ttl_ms);
                let expected = model.live(key, now).is_some();
                prop_assert_eq!(line.store_for(key, value, ttl), expected);
                model.records.insert(key, (value, now + ttl));
            }
            Op::Renew { key } => {
                let live = model.live(key, now).is_some();
                prop_assert_eq!(line.renew(&key), live);
                if live {
                    if let Some(record) = model.records.get_mut(&key) {
                        record.1 = now + default_ttl;
                    }
                }
            }
            Op::RenewFor { key, ttl_ms } => {
                let live = model.live(key, now).is_some();
                prop_assert_eq!(line.renew_for(&key, Duration::from_millis(ttl_ms)), live);
                if live {
                    if let Some(record) = model.records.get_mut(&key) {
                        record.1 = now + Duration::from_millis(ttl_ms);
                    }
                }
            }
            Op::Check { key } => {
                prop_assert_eq!(line.check(&key), model.live(key, now).is_some());
            }
            Op::Get { key } => {
                let expected = model.live(key, now).ok_or(Error::NotFound);
                prop_assert_eq!(line.get(&key).copied(), expected);
            }
            Op::Delete { key } => {
                prop_assert_eq!(line.delete(&key), model.live(key, now).is_some());
                model.records.remove(&key);
            }
            Op::Advance { ms } => clock.advance(Duration::from_millis(ms)),
            Op::Purge => {
                line.purge_expired();
                prop_assert_eq!(line.len_approx(), line.len());
                next_sweep_at = now + default_ttl;
            }
        }

        if sweeps && now >= next_sweep_at {
            next_sweep_at = now + default_ttl;

            // an ordered queue has no expired record past the swept prefix.
            if ordered {
                prop_assert_eq!(line.len_approx(), model.live_count(now), "sweep left expired records");
            }
        }

        line.assert_invariants(ordered);

        let now = clock.now();
        prop_assert_eq!(line.len(), model.live_count(now), "live count mismatch");
        prop_assert!(line.len_approx() >= line.len());
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Using only the default expiration keeps the queue sorted by deadline, and
    // the index and queue always hold the same entries.
    #[test]
    fn prop_default_ttl_matches_model(ops in prop::collection::vec(default_ttl_op_strategy(), 1..120)) {
        run(ops, true)?;
    }

    // Per-call ttls may break queue order, but never visibility or index/queue
    // consistency.
    #[test]
    fn prop_mixed_ttl_matches_model(ops in prop::collection::vec(mixed_ttl_op_strategy(), 1..120)) {
        run(ops, false)?;
    }

    // Freshness: a stored value is readable at any time before its deadline.
    #[test]
    fn prop_fresh_until_deadline(
        value in any::<u32>(),
        ttl_ms in 1u64..1000,
        elapsed_ms in 0u64..1000,
    ) {
        let clock = ManualClock::new();
        let mut line = Line::with_clock(Duration::from_millis(DEFAULT_TTL_MS), clock.clone()).unwrap();

        line.store_for("k", value, Duration::from_millis(ttl_ms));
        clock.advance(Duration::from_millis(elapsed_ms));

        if elapsed_ms < ttl_ms {
            prop_assert_eq!(line.get("k"), Ok(&value));
        } else {
            prop_assert_eq!(line.get("k"), Err(Error::NotFound));
            prop_assert!(!line.check("k"));
        }
    }

    // Deleting a live entry succeeds exactly once.
    #[test]
    fn prop_delete_once(keys in prop::collection::hash_set(any::<u16>(), 1..50)) {
        let mut line = Line::new(Duration::from_secs(60)).unwrap();
        for key in &keys {
            line.store(*key, ());
        }

        for key in &keys {
            prop_assert!(line.delete(key));
            prop_assert!(!line.delete(key));
        }
        prop_assert!(line.is_empty());
        line.assert_invariants(true);
    }
}
