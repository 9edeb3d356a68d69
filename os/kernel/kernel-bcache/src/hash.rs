//! Home slot of a block number.
//!
//! Layers above the cache rely on the exact mapping, so it is fixed:
//! Knuth's multiplicative method on the 32-bit block number, high bits of
//! the 64-bit product truncated to 32 bits, reduced modulo the table size.

use kernel_info::disk::{HASH_MULTIPLIER, HASH_SHIFT};

/// First probe position for `block` in a table of `slots` entries.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
pub const fn home(block: u32, slots: usize) -> usize {
    let mixed = ((block as u64 * HASH_MULTIPLIER) >> HASH_SHIFT) as u32;
    mixed as usize % slots
}
