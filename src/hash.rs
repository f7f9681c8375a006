use crate::entry::{Entry, EntryId};

use slotmap::SlotMap;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

/// Rehashing callback for the index: the table only holds handles, so the
/// hash is recomputed from the key stored in the arena.
#[inline]
pub(crate) fn make_hasher<'a, K, V, H>(
    hash_builder: &'a H,
    entries: &'a SlotMap<EntryId, Entry<K, V>>,
) -> impl Fn(&EntryId) -> u64 + 'a
where
    K: Hash,
    H: BuildHasher,
{
    move |id| make_hash::<K, H>(hash_builder, &entries[*id].key)
}

#[inline]
pub(crate) fn equivalent_key<'a, Q, K, V>(
    entries: &'a SlotMap<EntryId, Entry<K, V>>,
    k: &'a Q,
) -> impl Fn(&EntryId) -> bool + 'a
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    move |id| k.eq(entries[*id].key.borrow())
}

#[inline]
pub(crate) fn equivalent_id(id: EntryId) -> impl Fn(&EntryId) -> bool {
    move |x| *x == id
}

#[inline]
pub(crate) fn make_hash<Q, H>(hash_builder: &H, val: &Q) -> u64
where
    Q: Hash + ?Sized,
    H: BuildHasher,
{
    use core::hash::Hasher;
    let mut state = hash_builder.build_hasher();
    val.hash(&mut state);
    state.finish()
}
