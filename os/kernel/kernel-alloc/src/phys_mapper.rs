//! # Reaching Physical Frames
//!
//! The allocator never dereferences a physical address directly. Scrubbing a
//! freed frame, filling a new one, or threading a free-list link through it
//! all go through a [`PhysMapper`], which turns a physical address into a
//! pointer valid in the current address space.
//!
//! Two strategies are provided:
//! - [`HhdmPhysMapper`]: the kernel's higher-half direct map, `HHDM_BASE + pa`.
//! - [`IdentityPhysMapper`]: physical equals virtual. Used before paging is
//!   switched on, and by hosted tests that hand the allocator a page-aligned
//!   buffer as "RAM".

use crate::frame::PhysicalAddress;
use kernel_info::memory::HHDM_BASE;

/// Converts physical addresses into usable references.
pub trait PhysMapper {
    /// Map a physical address to a mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped, writable, and suitably aligned for `T`.
    /// - The caller must ensure nothing else accesses the memory for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// The HHDM mapping must be present and cover the referenced physical range.
#[derive(Debug, Default, Clone, Copy)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (HHDM_BASE + pa.as_u64()) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] for identity-mapped memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_u64() as *mut T;
        // SAFETY: Caller guarantees `pa` is an identity-mapped, exclusive location.
        unsafe { &mut *va }
    }
}
