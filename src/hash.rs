//! Seeded 64-bit hash functions over byte sequences.
//!
//! Both functions take a 16-byte seed and are pure: identical
//! `(bytes, seed)` pairs always produce identical output. They differ in
//! their trust model:
//! - [`mix_hash`] is a fast byte-mixing hash with a data-dependent rotate.
//!   It is not collision-resistant against adversarial inputs; use it only
//!   for keys from trusted sources.
//! - [`sip_hash`] is SipHash-2-4 keyed with the seed. Use it when keys may
//!   be attacker-influenced, to resist deliberate bin-collision flooding.

use core::hash::Hasher;
use siphasher::sip::SipHasher24;

/// 16 opaque bytes mixed into both hash functions. A table's seed is fixed
/// at creation and randomizes its bin distribution.
pub type Seed = [u8; 16];

/// The all-zero seed used when a table is created without an explicit one.
pub const DEFAULT_SEED: Seed = [0; 16];

/// Byte-mixing hash with a self-referential rotate amount.
///
/// The accumulator starts from seed bytes 8..16 assembled little-endian.
/// Each input byte is XORed in along with the seed byte at `i mod 16`,
/// then the state is stirred with a shift-XOR and a shifted add whose
/// shift amount is recomputed from the running hash value. A final
/// XOR-fold by the last rotate amount closes the loop.
pub fn mix_hash(bytes: &[u8], seed: &Seed) -> u64 {
    let mut hash = u64::from_le_bytes([
        seed[8], seed[9], seed[10], seed[11], seed[12], seed[13], seed[14], seed[15],
    ]);
    // rotate stays in 11..=42, so the shifts below cannot reach the bit width.
    let mut rotate = 11u32;

    for (i, &byte) in bytes.iter().enumerate() {
        hash ^= u64::from(byte);
        hash ^= u64::from(seed[i & 15]);
        hash ^= hash << 8;
        hash = hash.wrapping_add(hash >> rotate);
        rotate = (hash & 31) as u32 + 11;
    }

    hash ^ (hash >> rotate)
}

/// SipHash-2-4 of `bytes` keyed with the seed, assembled little-endian
/// into a `u64`. Matches the reference implementation's 8-byte output.
pub fn sip_hash(bytes: &[u8], seed: &Seed) -> u64 {
    let mut hasher = SipHasher24::new_with_key(seed);
    hasher.write(bytes);
    hasher.finish()
}
