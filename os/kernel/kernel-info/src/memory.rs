//! # Memory Layout

/// Size of one physical page frame in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel image is placed in *physical* memory.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Amount of RAM handed to the frame allocator, counted from [`PHYS_LOAD`].
pub const RAM_SIZE: u64 = 127 * 1024 * 1024;

/// First physical address past the managed RAM range.
pub const PHYS_TOP: u64 = PHYS_LOAD + RAM_SIZE;

/// Upper bound on the number of frames the allocator tracks.
///
/// The per-frame reference-count table is sized from this; the managed range
/// starts after the kernel image and therefore never holds more.
pub const MAX_FRAMES: usize = (RAM_SIZE / PAGE_SIZE) as usize;

/// Maximum number of cores, and therefore of per-core free lists.
pub const MAX_CPUS: usize = 8;

/// Byte written over a frame when its last reference is dropped.
pub const FREED_FILL: u8 = 0x01;

/// Byte written over a frame when it is handed out.
pub const ALLOC_FILL: u8 = 0x05;

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP.is_multiple_of(PAGE_SIZE));
    assert!(MAX_CPUS > 0);
    assert!(FREED_FILL != ALLOC_FILL);
};
