#![allow(dead_code)]

use kernel_alloc::cores::CurrentCore;
use kernel_alloc::frame::FRAME_BYTES;
use kernel_alloc::phys_mapper::IdentityPhysMapper;
use kernel_alloc::{Frame, FrameAllocator, PhysicalAddress};
use std::cell::Cell;

pub type TestAlloc<const FRAMES: usize, const CPUS: usize> =
    FrameAllocator<IdentityPhysMapper, ThreadCore, FRAMES, CPUS>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

thread_local! {
    static CORE: Cell<usize> = const { Cell::new(0) };
}

/// Reports whatever core the current test thread pretends to be.
pub struct ThreadCore;

impl ThreadCore {
    pub fn enter(core: usize) {
        CORE.with(|c| c.set(core));
    }
}

impl CurrentCore for ThreadCore {
    fn current_core(&self) -> usize {
        CORE.with(Cell::get)
    }
}

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
struct Page([u8; FRAME_BYTES]);

/// Page-aligned host memory standing in for physical RAM (identity mapped).
pub struct TestRam {
    pages: Box<[Page]>,
}

impl TestRam {
    pub fn new(frames: usize) -> Self {
        Self {
            pages: vec![Page([0; FRAME_BYTES]); frames].into_boxed_slice(),
        }
    }

    pub fn start(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.pages.as_ptr() as u64)
    }

    pub fn end(&self) -> PhysicalAddress {
        self.start() + (self.pages.len() * FRAME_BYTES) as u64
    }

    /// Allocator over all of this RAM.
    pub fn allocator<const FRAMES: usize, const CPUS: usize>(&self) -> TestAlloc<FRAMES, CPUS> {
        init_logging();
        let alloc = TestAlloc::new(IdentityPhysMapper, ThreadCore);
        // SAFETY: the pages are ours and outlive the allocator in every test.
        let frames = unsafe { alloc.init(self.start(), self.end()) }.expect("init");
        assert_eq!(frames, self.pages.len());
        alloc
    }
}

/// Read a frame's bytes.
///
/// # Safety
/// The frame must come from a live `TestRam` and nobody may be writing it.
pub unsafe fn frame_bytes<'a>(frame: Frame) -> &'a [u8; FRAME_BYTES] {
    unsafe { &*(frame.base().as_u64() as *const [u8; FRAME_BYTES]) }
}

/// Write a frame's bytes.
///
/// # Safety
/// The caller must own the frame.
pub unsafe fn frame_bytes_mut<'a>(frame: Frame) -> &'a mut [u8; FRAME_BYTES] {
    unsafe { &mut *(frame.base().as_u64() as *mut [u8; FRAME_BYTES]) }
}
