//! chain-index: a single-threaded, fixed-bin chained hash index with
//! seeded hashing and two item-ownership modes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small associative index usable as a building block inside a
//!   larger system (e.g. mapping connection identifiers to connection
//!   state), with the storage mode chosen by the caller.
//! - Layers:
//!   - hash: two interchangeable seeded 64-bit hash functions over bytes,
//!     a fast mixing hash for trusted keys and SipHash-2-4 for
//!     attacker-influenced ones.
//!   - key_ops: the KeyOps discipline (hashing + equality) a table uses to
//!     interpret keys; byte-view and function-pair implementations.
//!   - chain_index: ChainIndex<K, D>, owned mode. Items live in a slotmap
//!     arena behind stable ItemRef handles; keys move in on insert and
//!     move back out on removal.
//!   - intrusive_index: IntrusiveIndex<K, D>, intrusive mode. The chain
//!     node is embedded in the caller's key (ChainLink via the Linked
//!     trait) and keys are shared as Rc<K>; the table allocates no item
//!     storage.
//!
//! Constraints
//! - Fixed bin count for a table's lifetime: no resizing or rehashing.
//!   The bin is always the item's cached hash modulo the bin count.
//! - Chains are singly linked and LIFO; insertion pushes the chain head
//!   and unlinking scans for the predecessor.
//! - Duplicate keys are allowed; retrieval returns the most recently
//!   inserted match. Callers wanting set semantics probe first.
//! - Single-threaded: no internal synchronization; concurrent use needs
//!   external serialization. IntrusiveIndex is `!Send`/`!Sync` through
//!   `Rc` and `Cell`.
//!
//! Why two modes?
//! - Owned mode gives the common case a self-contained table: stale
//!   handles miss generationally instead of dangling.
//! - Intrusive mode serves keys whose storage the caller already manages;
//!   the table threads through them without allocating, and `Rc` shares
//!   make an independently released key impossible to dangle in a chain.
//!
//! Seeding
//! - Every table carries a 16-byte seed (all zero unless supplied) that
//!   both hash functions mix in. A random seed plus the SipHash
//!   discipline resists hash-flooding when key bytes are adversarial;
//!   neither function provides cryptographic integrity.

pub mod chain_index;
pub mod hash;
pub mod intrusive_index;
pub mod key_ops;

// Public surface
pub use chain_index::{BinCountError, ChainIndex, ItemRef};
pub use hash::{mix_hash, sip_hash, Seed, DEFAULT_SEED};
pub use intrusive_index::{ChainLink, InsertError, IntrusiveIndex, Linked};
pub use key_ops::{FnOps, KeyOps, MixBytes, SipBytes};
