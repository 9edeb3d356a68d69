//! # Kernel Configuration
//!
//! Build-time constants shared by the memory-management core. Every table in
//! the frame allocator and the buffer cache is sized once from these values;
//! nothing here is computed at runtime.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! * **Page geometry**: page size and shift used by the frame allocator
//! * **Managed RAM**: the top of physical memory and the resulting frame count
//! * **Direct map**: the HHDM base used to touch physical frames
//! * **Cores**: the maximum number of per-core free lists
//!
//! ### Disk Cache Geometry ([`disk`])
//! * **Block size**: the payload size of one cached block
//! * **Slot count**: the fixed number of cache slots
//! * **Home hash**: the multiplicative hash constants that place a block
//!   number in the slot table
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!  kernel end ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (per-core free lists)          │
//! PHYS_TOP    └─────────────────────────────────┘ 0x0800_0000 (128 MiB)
//! ```
//!
//! The disk constants form a bit-exact contract for anything built on top of
//! the cache (file system layout, log sizing), so changing them is an on-disk
//! format change.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod disk;
pub mod memory;
