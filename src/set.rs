use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::line::{Keys, Line};

use hashbrown::DefaultHashBuilder;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::time::Duration;

/// An expiring set, for things like rate-limit windows or recently seen ids.
///
/// # Examples
///
/// ```
/// use ttline::{LineSet, ManualClock};
///
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let mut seen = LineSet::with_clock(Duration::from_secs(1), clock.clone())?;
///
/// assert!(!seen.insert("req-1"));
/// assert!(seen.insert("req-1"));
///
/// clock.advance(Duration::from_secs(1));
/// assert!(!seen.contains("req-1"));
/// # Ok::<(), ttline::Error>(())
/// ```
pub struct LineSet<T, C = SystemClock, H = DefaultHashBuilder> {
    line: Line<T, (), C, H>,
}

impl<T> LineSet<T, SystemClock, DefaultHashBuilder> {
    pub fn new(default_expiration: Duration) -> Result<Self> {
        Ok(Self {
            line: Line::new(default_expiration)?,
        })
    }
}

impl<T, C> LineSet<T, C, DefaultHashBuilder>
where
    C: Clock,
{
    pub fn with_clock(default_expiration: Duration, clock: C) -> Result<Self> {
        Ok(Self {
            line: Line::with_clock(default_expiration, clock)?,
        })
    }
}

impl<T, C, H> LineSet<T, C, H>
where
    C: Clock,
{
    #[inline]
    pub fn len(&self) -> usize {
        self.line.len()
    }

    #[inline]
    pub fn len_approx(&self) -> usize {
        self.line.len_approx()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.line.clear()
    }

    /// Live members in queue order.
    #[inline]
    pub fn iter(&self) -> Keys<'_, T, ()> {
        self.line.keys()
    }
}

impl<T, C, H> LineSet<T, C, H>
where
    T: Hash + Eq,
    C: Clock,
    H: BuildHasher,
{
    /// Adds `value` or refreshes it. Returns `true` if it was already a live
    /// member.
    #[inline]
    pub fn insert(&mut self, value: T) -> bool {
        self.line.store(value, ())
    }

    #[inline]
    pub fn insert_for(&mut self, value: T, ttl: Duration) -> bool {
        self.line.store_for(value, (), ttl)
    }

    #[inline]
    pub fn renew<Q: ?Sized>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.line.renew(value)
    }

    #[inline]
    pub fn renew_for<Q: ?Sized>(&mut self, value: &Q, ttl: Duration) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.line.renew_for(value, ttl)
    }

    #[inline]
    pub fn contains<Q: ?Sized>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.line.check(value)
    }

    #[inline]
    pub fn remove<Q: ?Sized>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.line.delete(value)
    }
}

#[cfg(test)]
mod test_set {
    use super::LineSet;
    use crate::clock::ManualClock;

    use std::time::Duration;

    #[test]
    fn test_insert_and_expire() {
        let clock = ManualClock::new();
        let mut set = LineSet::with_clock(Duration::from_millis(100), clock.clone()).unwrap();

        assert!(!set.insert(1));
        assert!(!set.insert(2));
        assert!(set.insert(1));
        assert_eq!(set.len(), 2);

        clock.advance(Duration::from_millis(60));
        assert!(set.renew(&2));

        clock.advance(Duration::from_millis(60));
        assert!(!set.contains(&1));
        assert!(set.contains(&2));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn test_insert_for_and_remove() {
        let clock = ManualClock::new();
        let mut set = LineSet::with_clock(Duration::from_secs(10), clock.clone()).unwrap();

        set.insert_for("a", Duration::from_secs(1));
        assert!(set.renew_for("a", Duration::from_secs(2)));

        clock.advance(Duration::from_secs(1));
        assert!(set.contains("a"));

        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert!(set.is_empty());

        set.insert("b");
        set.clear();
        assert_eq!(set.len_approx(), 0);
    }
}
