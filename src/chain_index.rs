//! ChainIndex: owned mode. Items live in a slotmap arena behind stable handles.

use core::mem;

use slotmap::{DefaultKey, SlotMap};

use crate::hash::{Seed, DEFAULT_SEED};
use crate::key_ops::KeyOps;

/// Stable, copyable reference to an item in a [`ChainIndex`].
///
/// Handles are generational: after the item is removed, the handle misses
/// instead of aliasing a later insertion that reuses the slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ItemRef(DefaultKey);

impl ItemRef {
    pub(crate) fn new(k: DefaultKey) -> Self {
        ItemRef(k)
    }

    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }

    /// Borrow the item's key, if the item is still present in `index`.
    pub fn key<'a, K, D>(&self, index: &'a ChainIndex<K, D>) -> Option<&'a K>
    where
        D: KeyOps<K>,
    {
        index.key(*self)
    }
}

struct Item<K> {
    /// Hash computed at insertion under the table seed; relocates the
    /// item's bin on removal without touching the key again.
    hash: u64,
    next: Option<DefaultKey>,
    key: K,
}

/// Bin-count validation error at table creation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinCountError {
    /// The bin count must be positive.
    Zero,
    /// The bin array's byte size would overflow `usize`.
    Overflow,
}

/// A fixed-bin chained hash index that owns its keys.
///
/// Keys move into the table on insert and move back out on removal, so
/// every key is released exactly once: either handed back to the caller
/// by a removal, drained by [`into_keys`](ChainIndex::into_keys), or
/// dropped with the table. The bin count is fixed for the table's
/// lifetime; there is no resizing or rehashing.
///
/// Duplicate keys are allowed and no duplicate check is performed on
/// insert. Chains are LIFO, so retrieval returns the most recently
/// inserted match; callers wanting set semantics check with
/// [`retrieve`](ChainIndex::retrieve) first.
pub struct ChainIndex<K, D> {
    ops: D,
    seed: Seed,
    /// Chain heads, one per bin. `item_count` is `slots.len()`: every live
    /// slot is linked in exactly one chain.
    bins: Vec<Option<DefaultKey>>,
    slots: SlotMap<DefaultKey, Item<K>>,
}

impl<K, D> ChainIndex<K, D>
where
    D: KeyOps<K>,
{
    /// Creates an index with `bins` chains and the all-zero seed.
    pub fn new(bins: usize, ops: D) -> Result<Self, BinCountError> {
        Self::with_seed(bins, ops, DEFAULT_SEED)
    }

    /// Creates an index with an explicit seed, fixed for the table's
    /// lifetime. Use a per-process random seed when key bytes may be
    /// attacker-influenced.
    pub fn with_seed(bins: usize, ops: D, seed: Seed) -> Result<Self, BinCountError> {
        if bins == 0 {
            return Err(BinCountError::Zero);
        }
        if bins.checked_mul(mem::size_of::<Option<DefaultKey>>()).is_none() {
            return Err(BinCountError::Overflow);
        }
        Ok(Self {
            ops,
            seed,
            bins: vec![None; bins],
            slots: SlotMap::with_key(),
        })
    }

    fn bin_of_hash(&self, hash: u64) -> usize {
        (hash % self.bins.len() as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Finds the most recently inserted item whose key equals `key`.
    ///
    /// Cost is the matching bin's chain length: amortized O(1) under a
    /// well-distributed hash and load factor.
    pub fn retrieve(&self, key: &K) -> Option<ItemRef> {
        let hash = self.ops.hash(key, &self.seed);
        let mut cur = self.bins[self.bin_of_hash(hash)];
        while let Some(slot) = cur {
            let item = &self.slots[slot];
            if self.ops.eq(key, &item.key) {
                return Some(ItemRef::new(slot));
            }
            cur = item.next;
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.retrieve(key).is_some()
    }

    /// Inserts `key`, making its item the new head of its bin's chain.
    ///
    /// No duplicate check is performed: inserting a key equal to an
    /// existing one creates a second reachable item, and retrieval will
    /// surface the newer of the two.
    pub fn insert(&mut self, key: K) -> ItemRef {
        let hash = self.ops.hash(&key, &self.seed);
        let bin = self.bin_of_hash(hash);
        let next = self.bins[bin];
        let slot = self.slots.insert(Item { hash, next, key });
        self.bins[bin] = Some(slot);
        ItemRef::new(slot)
    }

    /// Unlinks `item` from its chain and hands its key back.
    ///
    /// The bin is recomputed from the item's cached hash; the chain is
    /// singly linked, so unlinking scans for the predecessor. A stale
    /// handle (already removed) returns `None` and changes nothing.
    pub fn remove_item(&mut self, item: ItemRef) -> Option<K> {
        let slot = item.raw();
        let hash = self.slots.get(slot)?.hash;
        let bin = self.bin_of_hash(hash);

        if self.bins[bin] == Some(slot) {
            self.bins[bin] = self.slots[slot].next;
        } else {
            let mut prev = self.bins[bin];
            while let Some(p) = prev {
                if self.slots[p].next == Some(slot) {
                    self.slots[p].next = self.slots[slot].next;
                    break;
                }
                prev = self.slots[p].next;
            }
        }

        self.slots.remove(slot).map(|item| item.key)
    }

    /// Removes the most recently inserted item matching `key` and hands
    /// its stored key back, or returns `None` if no item matches.
    pub fn remove_key(&mut self, key: &K) -> Option<K> {
        let item = self.retrieve(key)?;
        self.remove_item(item)
    }

    /// Removes the most recently inserted item matching `key`, dropping
    /// the stored key. The lookup key itself is consumed whether or not a
    /// match exists: callers pass a key they are relinquishing. Returns
    /// whether an item was removed.
    pub fn discard(&mut self, key: K) -> bool {
        self.remove_key(&key).is_some()
    }

    /// Borrow the key of `item`, if it is still present.
    pub fn key(&self, item: ItemRef) -> Option<&K> {
        self.slots.get(item.raw()).map(|item| &item.key)
    }

    /// The hash cached for `item` at insertion time.
    pub fn cached_hash(&self, item: ItemRef) -> Option<u64> {
        self.slots.get(item.raw()).map(|item| item.hash)
    }

    /// The bin `item` is reachable from: its cached hash modulo the bin count.
    pub fn bin(&self, item: ItemRef) -> Option<usize> {
        self.cached_hash(item).map(|hash| self.bin_of_hash(hash))
    }

    /// Iterates over all items in arbitrary (arena) order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            it: self.slots.iter(),
        }
    }

    /// Walks the chain of bin `bin`, most recently inserted first.
    ///
    /// Panics if `bin >= bin_count()`.
    pub fn chain(&self, bin: usize) -> Chain<'_, K, D> {
        Chain {
            index: self,
            cur: self.bins[bin],
        }
    }

    /// Tears the table down, handing every remaining key back untouched.
    /// Dropping the table instead drops every remaining key exactly once.
    pub fn into_keys(self) -> IntoKeys<K> {
        IntoKeys {
            it: self.slots.into_iter(),
        }
    }
}

/// Iterator over all items of a [`ChainIndex`], in arbitrary order.
pub struct Iter<'a, K> {
    it: slotmap::basic::Iter<'a, DefaultKey, Item<K>>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = (ItemRef, &'a K);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, item)| (ItemRef::new(k), &item.key))
    }
}

/// Iterator over one bin's chain, most recently inserted first.
pub struct Chain<'a, K, D> {
    index: &'a ChainIndex<K, D>,
    cur: Option<DefaultKey>,
}

impl<'a, K, D> Iterator for Chain<'a, K, D> {
    type Item = (ItemRef, &'a K);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cur?;
        let item = &self.index.slots[slot];
        self.cur = item.next;
        Some((ItemRef::new(slot), &item.key))
    }
}

/// Draining iterator returned by [`ChainIndex::into_keys`].
pub struct IntoKeys<K> {
    it: slotmap::basic::IntoIter<DefaultKey, Item<K>>,
}

impl<K> Iterator for IntoKeys<K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.it.next().map(|(_, item)| item.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_ops::{FnOps, MixBytes};

    // Four bins, hashing by a key's first byte so chosen keys collide.
    fn colliding_index() -> ChainIndex<&'static str, impl KeyOps<&'static str>> {
        let ops = FnOps::new(
            |key: &&'static str, _seed: &Seed| u64::from(key.as_bytes()[0]),
            |a: &&'static str, b: &&'static str| a == b,
        );
        ChainIndex::new(4, ops).unwrap()
    }

    /// Invariant: creation rejects a zero bin count and a bin count whose
    /// array size would overflow, returning no partial table.
    #[test]
    fn creation_rejects_bad_bin_counts() {
        assert_eq!(
            ChainIndex::<String, MixBytes>::new(0, MixBytes).err(),
            Some(BinCountError::Zero)
        );
        assert_eq!(
            ChainIndex::<String, MixBytes>::new(usize::MAX, MixBytes).err(),
            Some(BinCountError::Overflow)
        );

        let index = ChainIndex::<String, MixBytes>::new(8, MixBytes).unwrap();
        assert_eq!(index.len(), 0);
        assert_eq!(index.bin_count(), 8);
        assert!(index.is_empty());
    }

    /// Invariant: every inserted key is retrievable, and the retrieved
    /// item's key compares equal to the probe.
    #[test]
    fn insert_then_retrieve() {
        let mut index = ChainIndex::new(4, MixBytes).unwrap();
        for name in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            index.insert(name.to_string());
        }
        assert_eq!(index.len(), 5);

        for name in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            let item = index.retrieve(&name.to_string()).expect("key present");
            assert_eq!(item.key(&index), Some(&name.to_string()));
        }
        assert!(index.retrieve(&"zeta".to_string()).is_none());
        assert!(!index.contains(&"zeta".to_string()));
    }

    /// Invariant: an item is reachable from exactly the bin given by its
    /// cached hash modulo the bin count.
    #[test]
    fn bin_placement_follows_cached_hash() {
        let mut index = ChainIndex::new(5, MixBytes).unwrap();
        for n in 0..20u8 {
            let item = index.insert(vec![n, n ^ 0x5a]);
            let hash = index.cached_hash(item).unwrap();
            let bin = index.bin(item).unwrap();
            assert_eq!(bin, (hash % 5) as usize);
            assert!(index.chain(bin).any(|(i, _)| i == item));
            for other in (0..5).filter(|b| *b != bin) {
                assert!(!index.chain(other).any(|(i, _)| i == item));
            }
        }
    }

    /// Invariant: chains are LIFO; a new insertion becomes the chain head.
    #[test]
    fn chains_are_lifo() {
        let mut index = colliding_index();
        // All three share byte 'k' so they collide into one bin.
        index.insert("k1");
        index.insert("k2");
        index.insert("k3");

        let bin = (u64::from(b'k') % 4) as usize;
        let order: Vec<&str> = index.chain(bin).map(|(_, k)| *k).collect();
        assert_eq!(order, ["k3", "k2", "k1"]);
    }

    /// Invariant: duplicate keys both stay reachable by chain traversal,
    /// and retrieval returns the most recently inserted one.
    #[test]
    fn duplicates_retrieve_newest() {
        let mut index = ChainIndex::new(2, MixBytes).unwrap();
        let older = index.insert("dup".to_string());
        let newer = index.insert("dup".to_string());
        assert_eq!(index.len(), 2);

        assert_eq!(index.retrieve(&"dup".to_string()), Some(newer));
        let bin = index.bin(newer).unwrap();
        let in_chain: Vec<ItemRef> = index.chain(bin).map(|(i, _)| i).collect();
        assert!(in_chain.contains(&older));
        assert!(in_chain.contains(&newer));
    }

    /// Invariant: a caller holding the older duplicate can remove it
    /// directly while retrieval keeps surfacing the newer one.
    #[test]
    fn older_duplicate_removable_by_item() {
        let mut index = ChainIndex::new(2, MixBytes).unwrap();
        let older = index.insert("dup".to_string());
        let newer = index.insert("dup".to_string());

        assert_eq!(index.remove_item(older), Some("dup".to_string()));
        assert_eq!(index.len(), 1);
        assert_eq!(index.retrieve(&"dup".to_string()), Some(newer));
    }

    /// Invariant: removal unlinks head, middle, and tail positions, and
    /// the remaining chain preserves its relative order.
    #[test]
    fn remove_item_at_each_chain_position() {
        for victim in 0..3 {
            let mut index = colliding_index();
            let items = [index.insert("k1"), index.insert("k2"), index.insert("k3")];
            let bin = (u64::from(b'k') % 4) as usize;

            // Chain order is k3, k2, k1; items[victim] may be tail, middle, or head.
            index.remove_item(items[victim]);
            assert_eq!(index.len(), 2);

            let expected: Vec<&str> = ["k3", "k2", "k1"]
                .into_iter()
                .filter(|k| *k != ["k1", "k2", "k3"][victim])
                .collect();
            let order: Vec<&str> = index.chain(bin).map(|(_, k)| *k).collect();
            assert_eq!(order, expected);
        }
    }

    /// Invariant: a stale handle is a no-op miss; it does not alias a
    /// later insertion that reuses the slot, and the count is untouched.
    #[test]
    fn stale_handle_misses() {
        let mut index = ChainIndex::new(2, MixBytes).unwrap();
        let old = index.insert("old".to_string());
        assert_eq!(index.remove_item(old), Some("old".to_string()));

        let new = index.insert("new".to_string());
        assert_ne!(old, new, "handles must differ across generations");
        assert_eq!(index.key(old), None);
        assert_eq!(index.cached_hash(old), None);
        assert_eq!(index.remove_item(old), None);
        assert_eq!(index.len(), 1, "stale removal must not change the count");
    }

    /// Invariant: remove_key removes exactly one matching item; discard
    /// consumes the lookup key even when nothing matches.
    #[test]
    fn remove_key_and_discard() {
        let mut index = ChainIndex::new(4, MixBytes).unwrap();
        index.insert("a".to_string());
        index.insert("b".to_string());

        assert_eq!(index.remove_key(&"a".to_string()), Some("a".to_string()));
        assert_eq!(index.remove_key(&"a".to_string()), None);
        assert_eq!(index.len(), 1);

        assert!(index.discard("b".to_string()));
        assert!(!index.discard("absent".to_string()));
        assert_eq!(index.len(), 0);
    }

    /// Invariant: iteration visits each live item exactly once.
    #[test]
    fn iter_visits_each_item_once() {
        let mut index = ChainIndex::new(3, MixBytes).unwrap();
        let mut expected = Vec::new();
        for n in 0..10u8 {
            expected.push(vec![n]);
            index.insert(vec![n]);
        }

        let mut seen: Vec<Vec<u8>> = index.iter().map(|(_, k)| k.clone()).collect();
        seen.sort();
        assert_eq!(seen, expected);
    }

    /// Invariant: into_keys yields every key exactly once, in some order.
    #[test]
    fn into_keys_drains_all() {
        let mut index = ChainIndex::new(3, MixBytes).unwrap();
        for name in ["x", "y", "z"] {
            index.insert(name.to_string());
        }

        let mut keys: Vec<String> = index.into_keys().collect();
        keys.sort();
        assert_eq!(keys, ["x", "y", "z"]);
    }

    /// Invariant: an empty table tears down without error, and the seed
    /// accessor reports the construction seed.
    #[test]
    fn empty_table_teardown_and_seed() {
        let mut seed = DEFAULT_SEED;
        seed[3] = 7;
        let index = ChainIndex::<String, MixBytes>::with_seed(16, MixBytes, seed).unwrap();
        assert_eq!(index.seed(), &seed);
        assert_eq!(index.into_keys().count(), 0);

        let empty = ChainIndex::<String, MixBytes>::new(1, MixBytes).unwrap();
        drop(empty);
    }
}
