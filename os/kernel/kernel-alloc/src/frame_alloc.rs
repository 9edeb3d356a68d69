//! # Per-Core Physical Frame Allocator
//!
//! Hands out 4 KiB frames from per-core free lists and tracks a reference
//! count per frame so that copy-on-write mappings can share one frame.
//!
//! ```text
//!            core 0            core 1                core N-1
//!        ┌───────────┐     ┌───────────┐         ┌───────────┐
//! lists  │ Ticket    │     │ Ticket    │   ...   │ Ticket    │
//!        │ FreeList  │     │ FreeList  │         │ FreeList  │
//!        └───────────┘     └───────────┘         └───────────┘
//!
//! refs   [SpinLock<u32>; FRAMES]  one lock per frame, indexed by
//!                                 (pa - range.start) / 4096
//! ```
//!
//! ## Locking
//! - An allocation or free touches exactly one list lock at a time: its own
//!   core's list, or a single victim's list while stealing.
//! - Refcount locks are independent of list locks and of each other.
//!
//! ## Stealing
//! A core whose list is empty walks the other cores by repeatedly adding a
//! fixed stride that is coprime with the core count (3 unless that shares a
//! factor with `CPUS`). Simultaneous misses on neighbouring cores therefore
//! start at different victims instead of all hammering "the next" core.
//!
//! ## Failure model
//! - Running out of frames is ordinary: [`allocate`](FrameAllocator::allocate)
//!   returns `None` and the caller decides what to do.
//! - Freeing a misaligned or foreign address, freeing a frame twice, or
//!   touching the refcount of an unmanaged address is a caller bug and panics.

use crate::cores::CurrentCore;
use crate::error::FrameAllocError;
use crate::frame::{FRAME_BYTES, Frame, FrameRange, PhysicalAddress};
use crate::free_list::FreeList;
use crate::phys_mapper::PhysMapper;
use kernel_info::memory::{ALLOC_FILL, FREED_FILL, MAX_CPUS, MAX_FRAMES};
use kernel_sync::{SpinLock, SyncOnceCell, TicketMutex};
use log::{debug, error, info, trace};

/// Stride used to walk victim cores; must be coprime with the core count.
const PREFERRED_STEAL_STRIDE: usize = 3;

/// Smallest stride `>= PREFERRED_STEAL_STRIDE` that is coprime with `cpus`.
const fn steal_stride(cpus: usize) -> usize {
    const fn gcd(mut a: usize, mut b: usize) -> usize {
        while b != 0 {
            let t = a % b;
            a = b;
            b = t;
        }
        a
    }

    let mut stride = PREFERRED_STEAL_STRIDE;
    while gcd(stride, cpus) != 1 {
        stride += 1;
    }
    stride
}

/// Source of 4 KiB frames, as consumed by the virtual-memory manager.
pub trait FrameAlloc {
    /// Allocate one frame with refcount 1, or `None` if memory is exhausted.
    fn alloc_4k(&self) -> Option<Frame>;

    /// Drop one reference to `frame`, returning it to a free list at zero.
    fn free_4k(&self, frame: Frame);
}

/// Physical frame allocator with per-core free lists and per-frame refcounts.
///
/// `FRAMES` bounds the size of the managed range (one refcount lock per
/// frame); `CPUS` is the number of free lists.
pub struct FrameAllocator<M, C, const FRAMES: usize = MAX_FRAMES, const CPUS: usize = MAX_CPUS> {
    mapper: M,
    cores: C,
    range: SyncOnceCell<FrameRange>,
    free_lists: [TicketMutex<FreeList>; CPUS],
    refcounts: [SpinLock<u32>; FRAMES],
}

impl<M, C, const FRAMES: usize, const CPUS: usize> FrameAllocator<M, C, FRAMES, CPUS> {
    const STEAL_STRIDE: usize = {
        assert!(CPUS > 0, "frame allocator needs at least one core");
        steal_stride(CPUS)
    };

    /// Create an empty allocator. No frame is available until [`init`](Self::init).
    pub const fn new(mapper: M, cores: C) -> Self {
        Self {
            mapper,
            cores,
            range: SyncOnceCell::new(),
            free_lists: [const { TicketMutex::new(FreeList::new()) }; CPUS],
            refcounts: [const { SpinLock::new(0) }; FRAMES],
        }
    }

    /// The managed range, once initialized.
    pub fn managed_range(&self) -> Option<FrameRange> {
        self.range.get().copied()
    }

    /// Number of frames under management (free or not).
    pub fn frame_count(&self) -> usize {
        self.range.get().map_or(0, FrameRange::len)
    }

    /// Number of frames currently on any free list.
    ///
    /// Each list is counted under its own lock, one after another, so while
    /// other cores allocate or free this is only a hint.
    pub fn free_frames(&self) -> usize {
        (0..CPUS).map(|core| self.free_frames_on(core)).sum()
    }

    /// Number of frames currently on `core`'s free list.
    ///
    /// # Panics
    /// If `core` is not below `CPUS`.
    pub fn free_frames_on(&self, core: usize) -> usize {
        self.free_lists[Self::check_core(core)].lock().len()
    }

    /// Order in which `core` visits other cores' lists when its own is empty.
    fn steal_order(core: usize) -> impl Iterator<Item = usize> {
        (1..CPUS).scan(core, |victim, _| {
            *victim = (*victim + Self::STEAL_STRIDE) % CPUS;
            Some(*victim)
        })
    }

    #[track_caller]
    fn check_core(core: usize) -> usize {
        if core >= CPUS {
            error!("core index {core} out of range (have {} free lists)", CPUS);
            panic!("frame allocator: core index {core} out of range");
        }
        core
    }

    /// Index of the list with the fewest frames; ties go to the lowest index.
    fn least_loaded_list(&self) -> usize {
        let mut best = 0;
        let mut best_len = usize::MAX;
        for (core, list) in self.free_lists.iter().enumerate() {
            let len = list.lock().len();
            if len < best_len {
                best = core;
                best_len = len;
            }
        }
        best
    }
}

impl<M, C, const FRAMES: usize, const CPUS: usize> FrameAllocator<M, C, FRAMES, CPUS>
where
    M: PhysMapper,
    C: CurrentCore,
{
    /// Put every whole frame in `[start, end)` on the free lists.
    ///
    /// The executing core is not trusted this early, so frames are spread by
    /// always pushing onto the currently shortest list. Returns the number of
    /// frames now managed.
    ///
    /// # Errors
    /// - [`FrameAllocError::EmptyRange`] if no whole frame fits in the range.
    /// - [`FrameAllocError::RangeTooLarge`] if the range exceeds `FRAMES`.
    /// - [`FrameAllocError::AlreadyInitialized`] on a second call.
    ///
    /// # Safety
    /// - The range must be RAM that nothing else uses, now or later, except
    ///   through frames handed out by this allocator.
    /// - Every frame in the range must be writable through the mapper.
    pub unsafe fn init(
        &self,
        start: PhysicalAddress,
        end: PhysicalAddress,
    ) -> Result<usize, FrameAllocError> {
        let range = FrameRange::new(start, end).ok_or(FrameAllocError::EmptyRange)?;
        let frames = range.len();
        if frames > FRAMES {
            return Err(FrameAllocError::RangeTooLarge {
                frames,
                capacity: FRAMES,
            });
        }
        let range = self
            .range
            .set(range)
            .map_err(|_| FrameAllocError::AlreadyInitialized)?;

        for (index, frame) in range.iter().enumerate() {
            self.refcounts[index].with_lock(|count| *count = 0);
            // SAFETY: the caller hands us exclusive ownership of the range.
            unsafe {
                self.fill(frame, FREED_FILL);
                self.free_lists[self.least_loaded_list()]
                    .lock()
                    .push(&self.mapper, frame);
            }
        }

        info!(
            "frame allocator: {frames} frames in [{}, {}) across {} cores (steal stride {})",
            range.start().base(),
            range.end(),
            CPUS,
            Self::STEAL_STRIDE
        );
        Ok(frames)
    }

    /// Allocate a frame for the executing core.
    ///
    /// The frame comes back with refcount 1 and its contents filled with junk.
    /// Returns `None` once every list is empty.
    pub fn allocate(&self) -> Option<Frame> {
        self.allocate_on(self.cores.current_core())
    }

    /// Allocate a frame on behalf of `core`, stealing from others if needed.
    ///
    /// # Panics
    /// If `core` is not below `CPUS`.
    pub fn allocate_on(&self, core: usize) -> Option<Frame> {
        let core = Self::check_core(core);
        let range = self.range.get()?;

        // SAFETY: list frames are ours and reachable through the mapper.
        let local = unsafe { self.free_lists[core].lock().pop(&self.mapper) };
        let Some(frame) = local.or_else(|| self.steal(core)) else {
            debug!("core {core}: out of physical frames");
            return None;
        };

        let index = range
            .index_of(frame.base())
            .unwrap_or_else(|| Self::violation("allocate", FrameAllocError::OutOfRange(frame.base())));
        self.refcounts[index].with_lock(|count| {
            debug_assert_eq!(*count, 0, "free frame {frame} had live references");
            *count = 1;
        });

        // SAFETY: we just took the frame off a free list; nobody else has it.
        unsafe { self.fill(frame, ALLOC_FILL) };
        trace!("core {core}: allocated {frame}");
        Some(frame)
    }

    /// Take one frame from another core's list, holding one list lock at a time.
    fn steal(&self, core: usize) -> Option<Frame> {
        for victim in Self::steal_order(core) {
            // SAFETY: list frames are ours and reachable through the mapper.
            let stolen = unsafe { self.free_lists[victim].lock().pop(&self.mapper) };
            if let Some(frame) = stolen {
                debug!("core {core}: stole {frame} from core {victim}");
                return Some(frame);
            }
        }
        None
    }

    /// Drop one reference to the frame at `pa` on behalf of the executing core.
    ///
    /// When the count reaches zero the frame is scrubbed and pushed onto the
    /// executing core's list, regardless of which core allocated it.
    ///
    /// # Panics
    /// If `pa` is misaligned, outside the managed range, or already free.
    #[track_caller]
    pub fn free(&self, pa: impl Into<PhysicalAddress>) {
        self.free_on(self.cores.current_core(), pa);
    }

    /// [`free`](Self::free) with an explicit destination core.
    ///
    /// # Panics
    /// If `core` is out of range, or `pa` is misaligned, outside the managed
    /// range, or already free.
    #[track_caller]
    pub fn free_on(&self, core: usize, pa: impl Into<PhysicalAddress>) {
        let core = Self::check_core(core);
        let pa = pa.into();
        let (frame, index) = self.lookup(pa).unwrap_or_else(|e| Self::violation("free", e));

        let remaining = self.refcounts[index].with_lock(|count| {
            let previous = *count;
            *count = previous.saturating_sub(1);
            previous.checked_sub(1)
        });
        match remaining {
            None => {
                error!("free: double free of {frame}");
                panic!("free: frame {frame} is already free");
            }
            Some(0) => {}
            Some(left) => {
                trace!("free: {frame} still shared ({left} refs)");
                return;
            }
        }

        // SAFETY: the last reference is gone, so the frame is ours again.
        unsafe {
            self.fill(frame, FREED_FILL);
            self.free_lists[core].lock().push(&self.mapper, frame);
        }
        trace!("core {core}: freed {frame}");
    }

    /// Current reference count of the frame at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[track_caller]
    pub fn refcount(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let index = self.index("refcount", pa.into());
        self.refcounts[index].with_lock(|count| *count)
    }

    /// Overwrite the reference count of the frame at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[track_caller]
    pub fn set_refcount(&self, pa: impl Into<PhysicalAddress>, count: u32) {
        let index = self.index("set_refcount", pa.into());
        self.refcounts[index].with_lock(|c| *c = count);
    }

    /// Add one reference; returns the new count.
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[track_caller]
    pub fn increment_refcount(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let index = self.index("increment_refcount", pa.into());
        self.refcounts[index].with_lock(|count| {
            *count += 1;
            *count
        })
    }

    /// Remove one reference without freeing; returns the new count.
    ///
    /// Use [`free`](Self::free) or [`put_page`](Self::put_page) to release a
    /// frame. This only adjusts bookkeeping.
    ///
    /// # Panics
    /// If `pa` is not a managed frame or its count is already zero.
    #[track_caller]
    pub fn decrement_refcount(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let pa = pa.into();
        let index = self.index("decrement_refcount", pa);
        let remaining = self.refcounts[index].with_lock(|count| {
            let left = count.checked_sub(1)?;
            *count = left;
            Some(left)
        });
        remaining.unwrap_or_else(|| {
            error!("decrement_refcount: {pa} has no references");
            panic!("decrement_refcount: refcount of {pa} would go negative");
        })
    }

    /// Share the frame at `pa` with one more mapping (copy-on-write fork).
    ///
    /// # Panics
    /// If `pa` is not a managed frame.
    #[track_caller]
    pub fn get_page(&self, pa: impl Into<PhysicalAddress>) {
        self.increment_refcount(pa);
    }

    /// Drop one mapping's share of the frame at `pa`, freeing it if that was
    /// the last one.
    ///
    /// The decrement and the "was it the last?" decision happen under the
    /// frame's lock, so two concurrent `put_page` calls free it exactly once.
    ///
    /// # Panics
    /// See [`free`](Self::free).
    #[track_caller]
    pub fn put_page(&self, pa: impl Into<PhysicalAddress>) {
        self.free(pa);
    }

    /// Copy the contents of `src` into `dst`, as a copy-on-write fault does.
    ///
    /// # Safety
    /// The caller must own a reference to both frames and nobody may write
    /// `src` or access `dst` during the copy.
    ///
    /// # Panics
    /// If either frame is not managed by this allocator.
    #[track_caller]
    pub unsafe fn copy_frame(&self, src: Frame, dst: Frame) {
        self.index("copy_frame", src.base());
        self.index("copy_frame", dst.base());
        if src == dst {
            return;
        }
        unsafe {
            let from: &[u8; FRAME_BYTES] = self.mapper.phys_to_mut(src.base());
            let to: &mut [u8; FRAME_BYTES] = self.mapper.phys_to_mut(dst.base());
            to.copy_from_slice(from);
        }
    }

    /// Validate `pa` as a managed frame and return it with its table index.
    fn lookup(&self, pa: PhysicalAddress) -> Result<(Frame, usize), FrameAllocError> {
        let range = self.range.get().ok_or(FrameAllocError::NotInitialized)?;
        let frame = Frame::from_aligned(pa).ok_or(FrameAllocError::Misaligned(pa))?;
        let index = range
            .index_of(pa)
            .ok_or(FrameAllocError::OutOfRange(pa))?;
        Ok((frame, index))
    }

    #[track_caller]
    fn index(&self, op: &'static str, pa: PhysicalAddress) -> usize {
        self.lookup(pa).unwrap_or_else(|e| Self::violation(op, e)).1
    }

    #[cold]
    #[track_caller]
    fn violation(op: &'static str, err: FrameAllocError) -> ! {
        error!("{op}: {err}");
        panic!("{op}: {err}");
    }

    /// Overwrite a whole frame with `byte`.
    ///
    /// # Safety
    /// Nobody else may access `frame` during the call.
    unsafe fn fill(&self, frame: Frame, byte: u8) {
        let bytes: &mut [u8; FRAME_BYTES] = unsafe { self.mapper.phys_to_mut(frame.base()) };
        bytes.fill(byte);
    }
}

impl<M, C, const FRAMES: usize, const CPUS: usize> FrameAlloc for FrameAllocator<M, C, FRAMES, CPUS>
where
    M: PhysMapper,
    C: CurrentCore,
{
    fn alloc_4k(&self) -> Option<Frame> {
        self.allocate()
    }

    fn free_4k(&self, frame: Frame) {
        self.free(frame);
    }
}
