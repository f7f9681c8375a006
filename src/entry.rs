use slotmap::new_key_type;

use std::time::Instant;

new_key_type! {
    /// Stable handle of an entry inside the arena.
    ///
    /// Handles stay valid while the entry lives, so the expiration queue links
    /// entries by handle rather than by reference.
    pub(crate) struct EntryId;
}

/// One cached record plus its position in the expiration queue.
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) deadline: Instant,

    // queue links.
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V, deadline: Instant) -> Self {
        Self {
            key,
            value,
            deadline,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}
