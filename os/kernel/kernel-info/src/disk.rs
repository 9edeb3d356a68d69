//! # Disk Cache Geometry

/// Size of one disk block, and of one cache slot payload, in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Max number of blocks any single file-system operation writes.
pub const MAX_OP_BLOCKS: usize = 10;

/// Number of slots in the buffer cache.
pub const NBUF: usize = MAX_OP_BLOCKS * 3;

/// Knuth's multiplicative hashing constant (`⌊2^32 / φ⌋`).
pub const HASH_MULTIPLIER: u64 = 2_654_435_769;

/// Right shift applied to the 64-bit product before reduction.
pub const HASH_SHIFT: u32 = 28;

const _: () = {
    assert!(BLOCK_SIZE.is_power_of_two());
    assert!(NBUF > 0);
};
