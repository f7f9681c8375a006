use crate::clock::{Clock, SystemClock};
use crate::entry::{Entry, EntryId};
use crate::error::{Error, Result};
use crate::hash::*;

use hashbrown::{DefaultHashBuilder, HashTable};
use slotmap::SlotMap;
use tracing::{debug, trace};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::{FusedIterator, Iterator};
use std::time::{Duration, Instant};

/// An expiring key-value cache.
///
/// Entries live in an arena and are chained into an expiration queue ordered by
/// deadline, earliest at the head. A hash index over the arena gives O(1)
/// lookup. Every store or renewal moves the entry to the tail of the queue, and
/// a sweep gated to once per default expiration window reclaims the expired
/// prefix of the queue.
///
/// The queue stays sorted as long as every deadline appended at the tail is no
/// earlier than the one before it, which always holds when only the default
/// expiration is used. Mixing in per-call ttls shorter than earlier deadlines
/// never makes an expired entry visible, but may delay reclaiming its memory
/// until [`Line::purge_expired`] or a later sweep walks past it.
pub struct Line<K, V, C = SystemClock, H = DefaultHashBuilder> {
    entries: SlotMap<EntryId, Entry<K, V>>,
    index: HashTable<EntryId>,
    head: Option<EntryId>,
    tail: Option<EntryId>,

    default_expiration: Duration,
    next_sweep_at: Instant,

    clock: C,
    hash_builder: H,
}

impl<K, V> Line<K, V, SystemClock, DefaultHashBuilder> {
    /// Creates an empty `Line` whose entries expire `default_expiration` after
    /// their last store or renewal.
    ///
    /// Returns [`Error::InvalidConfiguration`] if `default_expiration` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::Line;
    ///
    /// use std::time::Duration;
    ///
    /// let mut line = Line::new(Duration::from_secs(30))?;
    /// line.store("session", 42);
    /// assert_eq!(line.get("session"), Ok(&42));
    ///
    /// assert!(Line::<&str, u32>::new(Duration::ZERO).is_err());
    /// # Ok::<(), ttline::Error>(())
    /// ```
    pub fn new(default_expiration: Duration) -> Result<Self> {
        Self::with_capacity(default_expiration, 0)
    }

    pub fn with_capacity(default_expiration: Duration, capacity: usize) -> Result<Self> {
        Self::with_clock_and_hasher(
            default_expiration,
            capacity,
            SystemClock,
            DefaultHashBuilder::default(),
        )
    }
}

impl<K, V, C> Line<K, V, C, DefaultHashBuilder>
where
    C: Clock,
{
    /// Creates an empty `Line` that reads time from `clock`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::{Line, ManualClock};
    ///
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new();
    /// let mut line = Line::with_clock(Duration::from_millis(250), clock.clone())?;
    ///
    /// line.store("a", "v1");
    /// clock.advance(Duration::from_millis(500));
    /// assert!(!line.check("a"));
    /// # Ok::<(), ttline::Error>(())
    /// ```
    pub fn with_clock(default_expiration: Duration, clock: C) -> Result<Self> {
        Self::with_clock_and_hasher(
            default_expiration,
            0,
            clock,
            DefaultHashBuilder::default(),
        )
    }
}

impl<K, V, C, H> Line<K, V, C, H>
where
    C: Clock,
{
    pub fn with_clock_and_hasher(
        default_expiration: Duration,
        capacity: usize,
        clock: C,
        hash_builder: H,
    ) -> Result<Self> {
        if default_expiration.is_zero() {
            return Err(Error::InvalidConfiguration(
                "default expiration must be positive",
            ));
        }

        let next_sweep_at = deadline_after(clock.now(), default_expiration);

        debug!(?default_expiration, capacity, "created expiring line");
        Ok(Self {
            entries: SlotMap::with_capacity_and_key(capacity),
            index: HashTable::with_capacity(capacity),
            head: None,
            tail: None,

            default_expiration,
            next_sweep_at,

            clock,
            hash_builder,
        })
    }

    /// Returns the expiration applied by [`Line::store`] and [`Line::renew`].
    #[inline]
    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    /// Returns the number of live entries.
    ///
    /// This walks the queue, `O(n)`. See [`Line::len_approx`] for the constant
    /// time count.
    #[inline]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns the number of tracked records, including expired ones the sweep
    /// has not reclaimed yet.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::{Line, ManualClock};
    ///
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new();
    /// let mut line = Line::with_clock(Duration::from_secs(10), clock.clone())?;
    /// line.store(0, "a");
    /// line.store_for(1, "b", Duration::from_secs(1));
    ///
    /// clock.advance(Duration::from_secs(2));
    /// assert_eq!(line.len(), 1);
    /// assert_eq!(line.len_approx(), 2);
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn len_approx(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if there is no live entry. Stops at the first live one.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Removes every entry and re-arms the sweep window.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.next_sweep_at = deadline_after(self.clock.now(), self.default_expiration);

        debug!("cleared expiring line");
    }

    /// An iterator visiting all live key-value pairs in queue order, earliest
    /// deadline first. The iterator element type is `(&'a K, &'a V)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::Line;
    ///
    /// use std::time::Duration;
    ///
    /// let mut line = Line::new(Duration::from_secs(30))?;
    /// line.store("a", 1);
    /// line.store("b", 2);
    /// line.store("c", 3);
    /// line.renew("a");
    ///
    /// let keys: Vec<_> = line.keys().copied().collect();
    /// assert_eq!(keys, ["b", "c", "a"]);
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            entries: &self.entries,
            cursor: self.head,
            now: self.clock.now(),
        }
    }

    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    #[inline]
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<K, V, C, H> Line<K, V, C, H>
where
    K: Hash + Eq,
    C: Clock,
    H: BuildHasher,
{
    /// Stores `value` under `key` with the default expiration.
    ///
    /// Returns `true` if a live entry was updated, `false` if a new entry was
    /// created. Either way the entry's deadline becomes now plus the default
    /// expiration.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::Line;
    ///
    /// use std::time::Duration;
    ///
    /// let mut line = Line::new(Duration::from_millis(250))?;
    /// assert!(!line.store("a", "v1"));
    /// assert!(line.store("a", "v2"));
    /// assert_eq!(line.get("a"), Ok(&"v2"));
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn store(&mut self, key: K, value: V) -> bool {
        self.store_for(key, value, self.default_expiration)
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    ///
    /// Returns `true` if a live entry was updated, `false` if a new entry was
    /// created. May reclaim unrelated expired entries.
    ///
    /// A `ttl` past the end of the clock's range saturates to the furthest
    /// representable deadline.
    pub fn store_for(&mut self, key: K, value: V, ttl: Duration) -> bool {
        let now = self.clock.now();
        let deadline = deadline_after(now, ttl);

        let updated = match self.find_live(&key, now) {
            Some(id) => {
                let entry = &mut self.entries[id];
                entry.value = value;
                entry.deadline = deadline;
                self.move_to_back(id);
                true
            }
            None => {
                self.insert_new(key, value, deadline);
                false
            }
        };

        self.sweep(now);
        updated
    }

    /// Pushes the deadline of a live entry to now plus the default expiration,
    /// keeping its value.
    ///
    /// Returns `false` and does nothing if the key is absent or expired.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::{Line, ManualClock};
    ///
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new();
    /// let mut line: Line<&str, u32, _> =
    ///     Line::with_clock(Duration::from_millis(250), clock.clone())?;
    /// assert!(!line.renew("a"));
    ///
    /// line.store("a", 1);
    /// for _ in 0..5 {
    ///     clock.advance(Duration::from_millis(100));
    ///     assert!(line.renew("a"));
    /// }
    /// assert!(line.check("a"));
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn renew<Q: ?Sized>(&mut self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.renew_for(k, self.default_expiration)
    }

    /// Pushes the deadline of a live entry to now plus `ttl`, keeping its value.
    pub fn renew_for<Q: ?Sized>(&mut self, k: &Q, ttl: Duration) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();

        let renewed = match self.find_live(k, now) {
            Some(id) => {
                self.entries[id].deadline = deadline_after(now, ttl);
                self.move_to_back(id);
                true
            }
            None => false,
        };

        self.sweep(now);
        renewed
    }

    /// Returns `true` if `k` has a live entry. Never extends its deadline.
    #[inline]
    pub fn check<Q: ?Sized>(&mut self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();
        self.sweep(now);
        self.find_live(k, now).is_some()
    }

    /// Returns a reference to the value of a live entry.
    ///
    /// Returns [`Error::NotFound`] if the key is absent or expired. Does not
    /// extend the deadline.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::{Error, Line, ManualClock};
    ///
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new();
    /// let mut line = Line::with_clock(Duration::from_millis(10), clock.clone())?;
    /// line.store(0, "0");
    /// assert_eq!(line.get(&0), Ok(&"0"));
    /// assert_eq!(line.get(&1), Err(Error::NotFound));
    ///
    /// clock.advance(Duration::from_millis(10));
    /// assert_eq!(line.get(&0), Err(Error::NotFound));
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn get<Q: ?Sized>(&mut self, k: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();
        self.sweep(now);

        match self.find_live(k, now) {
            Some(id) => Ok(&self.entries[id].value),
            None => Err(Error::NotFound),
        }
    }

    /// Returns a mutable reference to the value of a live entry.
    ///
    /// Does not extend the deadline.
    #[inline]
    pub fn get_mut<Q: ?Sized>(&mut self, k: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();
        self.sweep(now);

        match self.find_live(k, now) {
            Some(id) => Ok(&mut self.entries[id].value),
            None => Err(Error::NotFound),
        }
    }

    /// Returns the deadline of a live entry.
    #[inline]
    pub fn expires_at<Q: ?Sized>(&self, k: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();
        let entry = &self.entries[self.find(k)?];

        if entry.is_expired(now) {
            None
        } else {
            Some(entry.deadline)
        }
    }

    /// Removes `k`, returning `true` if it had a live entry.
    ///
    /// A record whose deadline has passed counts as absent even if the sweep has
    /// not reclaimed it yet: it is dropped and `false` is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::Line;
    ///
    /// use std::time::Duration;
    ///
    /// let mut line = Line::new(Duration::from_secs(60))?;
    /// line.store(1, 0);
    /// line.store(2, 0);
    ///
    /// assert!(line.delete(&1));
    /// assert!(!line.delete(&1));
    /// assert!(line.check(&2));
    /// # Ok::<(), ttline::Error>(())
    /// ```
    #[inline]
    pub fn delete<Q: ?Sized>(&mut self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.remove(k).is_some()
    }

    /// Removes `k`, returning the value if it had a live entry.
    ///
    /// A record that already expired is dropped as well, but its value is not
    /// returned.
    pub fn remove<Q: ?Sized>(&mut self, k: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let now = self.clock.now();
        let entry = self.remove_id(self.find(k)?)?;

        if entry.is_expired(now) {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Reclaims every expired record, wherever it sits in the queue, and
    /// returns how many were removed.
    ///
    /// Unlike the sweep this is `O(n)`; use it to recover memory after storing
    /// with ttls shorter than the deadlines already queued.
    ///
    /// # Examples
    ///
    /// ```
    /// use ttline::{Line, ManualClock};
    ///
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new();
    /// let mut line = Line::with_clock(Duration::from_secs(60), clock.clone())?;
    /// line.store("long", 1);
    /// line.store_for("short", 2, Duration::from_secs(1));
    ///
    /// clock.advance(Duration::from_secs(2));
    /// assert_eq!(line.purge_expired(), 1);
    /// assert_eq!(line.len_approx(), 1);
    /// # Ok::<(), ttline::Error>(())
    /// ```
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        self.next_sweep_at = deadline_after(now, self.default_expiration);

        let mut purged = 0;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let entry = &self.entries[id];
            cursor = entry.next;

            if entry.is_expired(now) {
                self.remove_id(id);
                purged += 1;
            }
        }

        if purged > 0 {
            trace!(purged, remaining = self.index.len(), "purged expired entries");
        }
        purged
    }

    /// Reclaims the expired prefix of the queue, at most once per default
    /// expiration window.
    fn sweep(&mut self, now: Instant) {
        if now < self.next_sweep_at {
            return;
        }
        self.next_sweep_at = deadline_after(now, self.default_expiration);

        let mut expired = 0;
        while let Some(id) = self.head {
            // the queue is ordered, nothing past a live entry is expired.
            if !self.entries[id].is_expired(now) {
                break;
            }

            self.remove_id(id);
            expired += 1;
        }

        if expired > 0 {
            trace!(expired, remaining = self.index.len(), "swept expired entries");
        }
    }

    #[inline]
    fn find<Q: ?Sized>(&self, k: &Q) -> Option<EntryId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let hash = make_hash::<Q, H>(&self.hash_builder, k);
        self.index
            .find(hash, equivalent_key(&self.entries, k))
            .copied()
    }

    /// Looks up a live entry. An expired record found on the way is dropped.
    #[inline]
    fn find_live<Q: ?Sized>(&mut self, k: &Q, now: Instant) -> Option<EntryId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let id = self.find(k)?;
        if !self.entries[id].is_expired(now) {
            return Some(id);
        }

        self.remove_id(id);
        trace!("dropped expired entry on access");
        None
    }

    fn insert_new(&mut self, key: K, value: V, deadline: Instant) {
        let hash = make_hash::<K, H>(&self.hash_builder, &key);
        let id = self.entries.insert(Entry::new(key, value, deadline));

        self.index
            .insert_unique(hash, id, make_hasher(&self.hash_builder, &self.entries));
        self.push_back(id);
    }

    /// Detaches an entry from both the queue and the index.
    fn remove_id(&mut self, id: EntryId) -> Option<Entry<K, V>> {
        self.unlink(id);

        let hash = make_hash::<K, H>(&self.hash_builder, &self.entries[id].key);
        let indexed = self
            .index
            .find_entry(hash, equivalent_id(id))
            .map(|slot| slot.remove())
            .is_ok();
        debug_assert!(indexed, "queued entry is missing from the index");

        self.entries.remove(id)
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self, ordered: bool) {
        let mut walked = 0;
        let mut prev: Option<EntryId> = None;
        let mut cursor = self.head;

        while let Some(id) = cursor {
            let entry = &self.entries[id];
            assert_eq!(entry.prev, prev, "broken back link");
            assert_eq!(self.find(&entry.key), Some(id), "queued entry is not indexed");

            if ordered {
                if let Some(p) = prev {
                    assert!(self.entries[p].deadline <= entry.deadline, "queue out of order");
                }
            }

            walked += 1;
            prev = Some(id);
            cursor = entry.next;
        }

        assert_eq!(self.tail, prev, "tail is not the last queued entry");
        assert_eq!(walked, self.entries.len(), "arena holds unqueued entries");
        assert_eq!(walked, self.index.len(), "index holds unqueued entries");
    }
}

/// `now + ttl`, saturating at the furthest instant the clock can represent.
fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    if let Some(deadline) = now.checked_add(ttl) {
        return deadline;
    }

    let mut deadline = now;
    let mut step = ttl;
    while !step.is_zero() {
        match deadline.checked_add(step) {
            Some(next) => deadline = next,
            None => step /= 2,
        }
    }
    deadline
}

// queue links.
impl<K, V, C, H> Line<K, V, C, H> {
    fn unlink(&mut self, id: EntryId) {
        let (prev, next) = {
            let entry = &self.entries[id];
            (entry.prev, entry.next)
        };

        match prev {
            Some(p) => self.entries[p].next = next,
            None => {
                debug_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }

        match next {
            Some(n) => self.entries[n].prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(id));
                self.tail = prev;
            }
        }

        let entry = &mut self.entries[id];
        entry.prev = None;
        entry.next = None;
    }

    fn push_back(&mut self, id: EntryId) {
        let tail = self.tail;

        let entry = &mut self.entries[id];
        debug_assert!(entry.prev.is_none() && entry.next.is_none());
        entry.prev = tail;

        match tail {
            Some(t) => self.entries[t].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    #[inline]
    fn move_to_back(&mut self, id: EntryId) {
        if self.tail != Some(id) {
            self.unlink(id);
            self.push_back(id);
        }
    }
}

impl<K, V, C, H> fmt::Debug for Line<K, V, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("default_expiration", &self.default_expiration)
            .field("tracked", &self.index.len())
            .finish_non_exhaustive()
    }
}

pub struct Iter<'a, K, V> {
    entries: &'a SlotMap<EntryId, Entry<K, V>>,
    cursor: Option<EntryId>,
    now: Instant,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            cursor: self.cursor,
            now: self.now,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries;
        loop {
            let entry = &entries[self.cursor?];
            self.cursor = entry.next;

            if !entry.is_expired(self.now) {
                return Some((&entry.key, &entry.value));
            }
        }
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<'a, K, V, C, H> IntoIterator for &'a Line<K, V, C, H>
where
    C: Clock,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
