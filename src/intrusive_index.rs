//! IntrusiveIndex: intrusive mode. The chain node is embedded in the
//! caller's key structure and the table allocates no item storage.
//!
//! Keys are shared as `Rc<K>`: the table holds one share per item (as a
//! bin head or a predecessor's `next` link) and the caller keeps their
//! own. Unlinking drops the table's share, so a key the caller has
//! released cannot dangle inside a chain. The link fields are
//! interior-mutable (`Cell`) because the table only ever has shared
//! access to key contents.

use core::cell::Cell;
use core::mem;
use std::rc::Rc;

use crate::chain_index::BinCountError;
use crate::hash::{Seed, DEFAULT_SEED};
use crate::key_ops::KeyOps;

/// Chain node embedded in a key structure.
///
/// Carries the hash cached at insertion and the link to the next item in
/// the same bin. A key can be threaded into at most one table at a time.
pub struct ChainLink<K> {
    hash: Cell<u64>,
    next: Cell<Option<Rc<K>>>,
    linked: Cell<bool>,
}

impl<K> ChainLink<K> {
    pub const fn new() -> Self {
        Self {
            hash: Cell::new(0),
            next: Cell::new(None),
            linked: Cell::new(false),
        }
    }

    /// Whether this link is currently threaded into a table.
    pub fn is_linked(&self) -> bool {
        self.linked.get()
    }

    // Non-destructive read of the `next` share. No user code runs between
    // the take and the set, so the chain never appears broken to callers.
    fn next_clone(&self) -> Option<Rc<K>> {
        let next = self.next.take();
        let out = next.clone();
        self.next.set(next);
        out
    }
}

impl<K> Default for ChainLink<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Item-extractor capability: key types that embed a [`ChainLink`].
pub trait Linked: Sized {
    fn link(&self) -> &ChainLink<Self>;
}

/// Intrusive insertion error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    /// The key's link is already threaded into a table. Linking it again
    /// would corrupt the chain it currently sits in.
    AlreadyLinked,
}

/// A fixed-bin chained hash index over caller-owned keys.
///
/// The table never allocates or frees item memory: the chain node lives
/// inside each key via [`Linked`]. Duplicate keys (equal under the
/// discipline, distinct allocations) are allowed, chains are LIFO, and
/// retrieval returns the most recently inserted match. Single-threaded:
/// `Rc` and `Cell` keep the whole structure `!Send`/`!Sync`.
pub struct IntrusiveIndex<K: Linked, D> {
    ops: D,
    seed: Seed,
    bins: Vec<Option<Rc<K>>>,
    len: usize,
}

impl<K, D> IntrusiveIndex<K, D>
where
    K: Linked,
    D: KeyOps<K>,
{
    /// Creates an index with `bins` chains and the all-zero seed.
    pub fn new(bins: usize, ops: D) -> Result<Self, BinCountError> {
        Self::with_seed(bins, ops, DEFAULT_SEED)
    }

    /// Creates an index with an explicit seed, fixed for the table's lifetime.
    pub fn with_seed(bins: usize, ops: D, seed: Seed) -> Result<Self, BinCountError> {
        if bins == 0 {
            return Err(BinCountError::Zero);
        }
        if bins.checked_mul(mem::size_of::<Option<Rc<K>>>()).is_none() {
            return Err(BinCountError::Overflow);
        }
        Ok(Self {
            ops,
            seed,
            bins: vec![None; bins],
            len: 0,
        })
    }

    fn bin_of_hash(&self, hash: u64) -> usize {
        (hash % self.bins.len() as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Finds the most recently inserted item whose key equals `key`,
    /// returning a fresh share of it.
    pub fn retrieve(&self, key: &K) -> Option<Rc<K>> {
        let hash = self.ops.hash(key, &self.seed);
        let mut cur = self.bins[self.bin_of_hash(hash)].clone();
        while let Some(item) = cur {
            if self.ops.eq(key, item.as_ref()) {
                return Some(item);
            }
            cur = item.link().next_clone();
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.retrieve(key).is_some()
    }

    /// Threads `key` into its bin as the new chain head, taking one share.
    ///
    /// Fails if the key is already linked, into this table or another.
    /// The passed share is consumed either way; check
    /// [`ChainLink::is_linked`] first to keep it on the failure path.
    pub fn insert(&mut self, key: Rc<K>) -> Result<(), InsertError> {
        if key.link().is_linked() {
            return Err(InsertError::AlreadyLinked);
        }
        let hash = self.ops.hash(key.as_ref(), &self.seed);
        let bin = self.bin_of_hash(hash);
        {
            let link = key.link();
            link.hash.set(hash);
            link.next.set(self.bins[bin].take());
            link.linked.set(true);
        }
        self.bins[bin] = Some(key);
        self.len += 1;
        Ok(())
    }

    /// Unlinks `item` from its chain, dropping the table's share of it.
    ///
    /// The bin is recomputed from the cached hash and the chain scanned
    /// for the predecessor; identity is by allocation (`Rc::ptr_eq`), not
    /// key equality, so an older duplicate can be unlinked directly. An
    /// item that is not linked, or is linked in a different table, is a
    /// no-op returning `false`, and the count is untouched.
    pub fn unlink(&mut self, item: &Rc<K>) -> bool {
        let link = item.link();
        if !link.is_linked() {
            return false;
        }
        let bin = self.bin_of_hash(link.hash.get());

        let head = match self.bins[bin].clone() {
            Some(head) => head,
            None => return false,
        };
        if Rc::ptr_eq(&head, item) {
            self.bins[bin] = link.next.take();
            link.linked.set(false);
            self.len -= 1;
            return true;
        }

        let mut prev = head;
        loop {
            let next = match prev.link().next_clone() {
                Some(next) => next,
                None => return false,
            };
            if Rc::ptr_eq(&next, item) {
                prev.link().next.set(link.next.take());
                link.linked.set(false);
                self.len -= 1;
                return true;
            }
            prev = next;
        }
    }

    /// Removes the most recently inserted item matching `key`, returning
    /// the share the table held. The key stays alive for as long as the
    /// caller keeps any share of it.
    pub fn remove_key(&mut self, key: &K) -> Option<Rc<K>> {
        let item = self.retrieve(key)?;
        self.unlink(&item);
        Some(item)
    }

    /// Iterates over all items, one share per item, in bin order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            bins: self.bins.iter(),
            cur: None,
        }
    }

    /// Walks the chain of bin `bin`, most recently inserted first.
    ///
    /// Panics if `bin >= bin_count()`.
    pub fn chain(&self, bin: usize) -> Chain<K> {
        Chain {
            cur: self.bins[bin].clone(),
        }
    }
}

/// Teardown walks every chain, dropping the table's shares and clearing
/// the embedded links, so no key keeps another alive through a dead
/// table's chain and every link can be reused afterwards.
impl<K: Linked, D> Drop for IntrusiveIndex<K, D> {
    fn drop(&mut self) {
        for head in &mut self.bins {
            let mut cur = head.take();
            while let Some(item) = cur {
                let link = item.link();
                cur = link.next.take();
                link.linked.set(false);
            }
        }
    }
}

/// Iterator over all items of an [`IntrusiveIndex`], chain by chain.
pub struct Iter<'a, K: Linked> {
    bins: core::slice::Iter<'a, Option<Rc<K>>>,
    cur: Option<Rc<K>>,
}

impl<'a, K: Linked> Iterator for Iter<'a, K> {
    type Item = Rc<K>;

    fn next(&mut self) -> Option<Rc<K>> {
        loop {
            if let Some(item) = self.cur.take() {
                self.cur = item.link().next_clone();
                return Some(item);
            }
            self.cur = self.bins.next()?.clone();
        }
    }
}

/// Iterator over one bin's chain, most recently inserted first.
pub struct Chain<K: Linked> {
    cur: Option<Rc<K>>,
}

impl<K: Linked> Iterator for Chain<K> {
    type Item = Rc<K>;

    fn next(&mut self) -> Option<Rc<K>> {
        let item = self.cur.take()?;
        self.cur = item.link().next_clone();
        Some(item)
    }
}
