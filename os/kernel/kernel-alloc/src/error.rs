use crate::frame::PhysicalAddress;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("frame allocator used before init")]
    NotInitialized,
    #[error("frame allocator already initialized")]
    AlreadyInitialized,
    #[error("managed range holds no whole frame")]
    EmptyRange,
    #[error("managed range holds {frames} frames, refcount table only fits {capacity}")]
    RangeTooLarge { frames: usize, capacity: usize },
    #[error("frame address {0} is not page aligned")]
    Misaligned(PhysicalAddress),
    #[error("frame address {0} is outside the managed range")]
    OutOfRange(PhysicalAddress),
}
