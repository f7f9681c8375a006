use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::line::Line;

use hashbrown::DefaultHashBuilder;
use parking_lot::{Mutex, MutexGuard};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::time::{Duration, Instant};

/// A [`Line`] behind a single lock, shareable between threads.
///
/// Index and queue are always updated together, so every operation holds the
/// lock for its whole duration. Use [`SyncLine::lock`] to run several operations
/// as one critical section.
///
/// # Examples
///
/// ```
/// use ttline::SyncLine;
///
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let line = Arc::new(SyncLine::new(Duration::from_secs(30))?);
///
/// let handles: Vec<_> = (0..4)
///     .map(|i| {
///         let line = Arc::clone(&line);
///         thread::spawn(move || line.store(i, i * 10))
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(line.len(), 4);
/// assert_eq!(line.get(&3), Ok(30));
/// # Ok::<(), ttline::Error>(())
/// ```
pub struct SyncLine<K, V, C = SystemClock, H = DefaultHashBuilder> {
    base: Mutex<Line<K, V, C, H>>,
}

impl<K, V> SyncLine<K, V, SystemClock, DefaultHashBuilder> {
    pub fn new(default_expiration: Duration) -> Result<Self> {
        Ok(Self::from_line(Line::new(default_expiration)?))
    }
}

impl<K, V, C> SyncLine<K, V, C, DefaultHashBuilder>
where
    C: Clock,
{
    pub fn with_clock(default_expiration: Duration, clock: C) -> Result<Self> {
        Ok(Self::from_line(Line::with_clock(default_expiration, clock)?))
    }
}

impl<K, V, C, H> SyncLine<K, V, C, H> {
    pub fn from_line(line: Line<K, V, C, H>) -> Self {
        Self {
            base: Mutex::new(line),
        }
    }

    pub fn into_inner(self) -> Line<K, V, C, H> {
        self.base.into_inner()
    }

    /// Locks the line for a multi-operation critical section.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Line<K, V, C, H>> {
        self.base.lock()
    }
}

impl<K, V, C, H> SyncLine<K, V, C, H>
where
    C: Clock,
{
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn len_approx(&self) -> usize {
        self.lock().len_approx()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[inline]
    pub fn clear(&self) {
        self.lock().clear()
    }
}

impl<K, V, C, H> SyncLine<K, V, C, H>
where
    K: Hash + Eq,
    C: Clock,
    H: BuildHasher,
{
    #[inline]
    pub fn store(&self, key: K, value: V) -> bool {
        self.lock().store(key, value)
    }

    #[inline]
    pub fn store_for(&self, key: K, value: V, ttl: Duration) -> bool {
        self.lock().store_for(key, value, ttl)
    }

    #[inline]
    pub fn renew<Q: ?Sized>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().renew(k)
    }

    #[inline]
    pub fn renew_for<Q: ?Sized>(&self, k: &Q, ttl: Duration) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().renew_for(k, ttl)
    }

    #[inline]
    pub fn check<Q: ?Sized>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().check(k)
    }

    /// Returns a clone of the value of a live entry.
    #[inline]
    pub fn get<Q: ?Sized>(&self, k: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        V: Clone,
    {
        self.lock().get(k).cloned()
    }

    /// Runs `f` on the value of a live entry while the lock is held.
    #[inline]
    pub fn get_with<Q: ?Sized, R, F>(&self, k: &Q, f: F) -> Result<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        self.lock().get(k).map(f)
    }

    #[inline]
    pub fn expires_at<Q: ?Sized>(&self, k: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().expires_at(k)
    }

    #[inline]
    pub fn delete<Q: ?Sized>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().delete(k)
    }

    #[inline]
    pub fn remove<Q: ?Sized>(&self, k: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lock().remove(k)
    }

    #[inline]
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired()
    }
}

impl<K, V, C, H> fmt::Debug for SyncLine<K, V, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base.try_lock() {
            Some(line) => f.debug_tuple("SyncLine").field(&*line).finish(),
            None => f.write_str("SyncLine(<locked>)"),
        }
    }
}

impl<K, V, C, H> From<Line<K, V, C, H>> for SyncLine<K, V, C, H> {
    fn from(line: Line<K, V, C, H>) -> Self {
        Self::from_line(line)
    }
}
