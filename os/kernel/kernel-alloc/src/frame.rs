//! Physical addresses and 4 KiB frames.

use core::fmt;
use core::ops::Add;
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE};

/// Number of bytes in a frame, as a `usize` for slicing.
pub const FRAME_BYTES: usize = PAGE_SIZE as usize;

/// Physical memory address.
///
/// A thin `u64` wrapper that keeps physical addresses from being mixed up
/// with kernel pointers. It carries no alignment guarantee; see [`Frame`].
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & (PAGE_SIZE - 1) == 0
    }

    /// Round down to the containing page boundary.
    #[inline]
    #[must_use]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE - 1))
    }

    /// Round up to the next page boundary, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_align_up(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE - 1) {
            Some(v) => Some(Self(v & !(PAGE_SIZE - 1))),
            None => None,
        }
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// One page-aligned 4 KiB physical frame.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Frame(PhysicalAddress);

impl Frame {
    /// The frame starting exactly at `pa`, or `None` if `pa` is not page aligned.
    #[inline]
    #[must_use]
    pub const fn from_aligned(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_page_aligned() {
            Some(Self(pa))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(0x{:016X})", self.0.as_u64())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/4K", self.0.as_u64())
    }
}

impl From<Frame> for PhysicalAddress {
    #[inline]
    fn from(value: Frame) -> Self {
        value.base()
    }
}

/// Half-open, page-aligned range of frames handed to the allocator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameRange {
    start: Frame,
    end: Frame,
}

impl FrameRange {
    /// Every whole frame inside `[start, end)`.
    ///
    /// `start` is rounded up and `end` rounded down; `None` if no whole
    /// frame remains.
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Option<Self> {
        let Some(start) = start.checked_align_up() else {
            return None;
        };
        let end = end.align_down();
        if start.as_u64() >= end.as_u64() {
            return None;
        }
        Some(Self {
            start: Frame(start),
            end: Frame(end),
        })
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> Frame {
        self.start
    }

    /// First address past the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end.base()
    }

    /// Number of frames in the range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn len(&self) -> usize {
        ((self.end.base().as_u64() - self.start.base().as_u64()) >> PAGE_SHIFT) as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.as_u64() >= self.start.base().as_u64() && pa.as_u64() < self.end.base().as_u64()
    }

    /// Position of the frame starting at `pa`, or `None` if `pa` is
    /// misaligned or outside the range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(&self, pa: PhysicalAddress) -> Option<usize> {
        if !pa.is_page_aligned() || !self.contains(pa) {
            return None;
        }
        Some(((pa.as_u64() - self.start.base().as_u64()) >> PAGE_SHIFT) as usize)
    }

    /// The `index`-th frame; `index` must be below [`len`](Self::len).
    #[inline]
    #[must_use]
    pub const fn frame_at(&self, index: usize) -> Frame {
        debug_assert!(index < self.len());
        Frame(PhysicalAddress::new(
            self.start.base().as_u64() + ((index as u64) << PAGE_SHIFT),
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = Frame> + '_ {
        (0..self.len()).map(|i| self.frame_at(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rounds_inwards() {
        let r = FrameRange::new(PhysicalAddress::new(0x1001), PhysicalAddress::new(0x5fff)).unwrap();
        assert_eq!(r.start().base().as_u64(), 0x2000);
        assert_eq!(r.end().as_u64(), 0x5000);
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn range_without_a_whole_frame_is_rejected() {
        assert!(FrameRange::new(PhysicalAddress::new(0x1001), PhysicalAddress::new(0x1fff)).is_none());
        assert!(FrameRange::new(PhysicalAddress::new(0x3000), PhysicalAddress::new(0x3000)).is_none());
        assert!(FrameRange::new(PhysicalAddress::new(u64::MAX), PhysicalAddress::new(u64::MAX)).is_none());
    }

    #[test]
    fn index_of_checks_alignment_and_bounds() {
        let r = FrameRange::new(PhysicalAddress::new(0x10_000), PhysicalAddress::new(0x14_000)).unwrap();
        assert_eq!(r.index_of(PhysicalAddress::new(0x10_000)), Some(0));
        assert_eq!(r.index_of(PhysicalAddress::new(0x13_000)), Some(3));
        assert_eq!(r.index_of(PhysicalAddress::new(0x14_000)), None);
        assert_eq!(r.index_of(PhysicalAddress::new(0x0f_000)), None);
        assert_eq!(r.index_of(PhysicalAddress::new(0x10_008)), None);
        assert_eq!(r.frame_at(2).base().as_u64(), 0x12_000);
        assert_eq!(r.iter().count(), 4);
    }

    #[test]
    fn frame_from_aligned_rejects_offsets() {
        assert!(Frame::from_aligned(PhysicalAddress::new(0x2000)).is_some());
        assert!(Frame::from_aligned(PhysicalAddress::new(0x2001)).is_none());
    }
}
