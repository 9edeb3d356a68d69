//! # Kernel Physical Memory Allocation
//!
//! This crate owns every physical page frame between the end of the kernel
//! image and the top of RAM. It hands frames out to the virtual-memory
//! manager, counts how many mappings share each one, and takes them back
//! when the last mapping goes away.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Virtual Memory Manager (external)            │
//! │    • copy-on-write fork: get_page / put_page        │
//! │    • fault handler: allocate + copy_frame + free    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameAlloc
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Frame Allocator                  │
//! │    • one free list per core, ticket-locked          │
//! │    • stride-3 stealing when the local list is empty │
//! │    • one refcount lock per frame                    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • HHDM or identity translation                   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame Allocator ([`frame_alloc`])
//! * **Per-core lists**: allocation and free touch the executing core's list;
//!   a miss steals one frame from a single victim at a time.
//! * **Reference counts**: a frame returns to a free list only when its count
//!   drops to zero. Sharing a frame never copies it.
//! * **Junk fill**: freed frames are overwritten with `0x01`, allocated
//!   frames with `0x05`, so dangling readers see garbage instead of stale data.
//!
//! ### Frames and addresses ([`frame`])
//! Typed physical addresses, page-aligned frames and the managed range.
//!
//! ### Physical Mapper ([`phys_mapper`])
//! How the allocator touches frame contents from the current address space.
//!
//! ### Core identity ([`cores`])
//! The seam through which the allocator learns which core is calling.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_alloc::cores::BootCore;
//! use kernel_alloc::frame::PhysicalAddress;
//! use kernel_alloc::frame_alloc::FrameAllocator;
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//! use kernel_info::memory::PHYS_TOP;
//!
//! static FRAMES: FrameAllocator<HhdmPhysMapper, BootCore> =
//!     FrameAllocator::new(HhdmPhysMapper, BootCore);
//!
//! # let kernel_end = PhysicalAddress::new(0x0040_0000);
//! // SAFETY: everything past the kernel image up to PHYS_TOP is unused RAM.
//! unsafe { FRAMES.init(kernel_end, PhysicalAddress::new(PHYS_TOP)) }.unwrap();
//!
//! let frame = FRAMES.allocate().expect("out of memory");
//! FRAMES.get_page(frame);   // shared by a forked child
//! FRAMES.put_page(frame);   // child exits
//! FRAMES.free(frame);       // parent unmaps; frame is free again
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod cores;
mod error;
pub mod frame;
pub mod frame_alloc;
mod free_list;
pub mod phys_mapper;

pub use error::FrameAllocError;
pub use frame::{Frame, FrameRange, PhysicalAddress};
pub use frame_alloc::{FrameAlloc, FrameAllocator};
