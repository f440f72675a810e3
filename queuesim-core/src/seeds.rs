//! Deterministic seed derivation.
//!
//! A batch of runs is configured with one seed. Each run gets its own stream
//! seed derived from it, so runs can execute in any order (or concurrently)
//! and still reproduce bit-for-bit.

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the seed of stream `stream` (e.g. a run index) from a base seed.
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    splitmix64(base ^ splitmix64(stream.wrapping_add(0xD1B5_4A32_D192_ED03)))
}
