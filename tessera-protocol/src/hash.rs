//! Custom key hashing.
//!
//! The engine addresses records by numeric keys. A human-chosen "custom key"
//! is mapped onto that key space with 32-bit MurmurHash3 (x86 variant, seed
//! 0) over the key's UTF-8 bytes, rendered as unsigned decimal text. The
//! engine applies the same function, so the algorithm and seed must not drift.

use crate::codec::is_u64_text;

/// Seed the engine uses for custom keys.
pub const CUSTOM_KEY_SEED: u32 = 0;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Hashes a custom key into its wire key.
pub fn hash(key: &str) -> String {
    hash_with_seed(key, CUSTOM_KEY_SEED)
}

/// Hashes `key` with an explicit seed.
pub fn hash_with_seed(key: &str, seed: u32) -> String {
    murmur3_32(key.as_bytes(), seed).to_string()
}

/// Returns `key` unchanged if it is already an engine key, otherwise its hash.
pub fn canonical_key(key: &str) -> String {
    if is_u64_text(key) {
        key.to_string()
    } else {
        hash(key)
    }
}

/// MurmurHash3 x86_32.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k |= u32::from(*byte) << (8 * i);
        }
        h ^= scramble(k);
    }

    // Length is mixed in modulo 2^32, as the reference implementation does.
    h ^= data.len() as u32;
    fmix32(h)
}

fn scramble(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
