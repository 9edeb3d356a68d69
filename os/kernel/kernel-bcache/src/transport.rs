//! The disk driver as seen by the cache.

use core::fmt;
use kernel_info::disk::BLOCK_SIZE;

/// Identity of one disk block.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BlockId {
    pub device: u32,
    pub block: u32,
}

impl BlockId {
    #[must_use]
    pub const fn new(device: u32, block: u32) -> Self {
        Self { device, block }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.block)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    /// Disk to payload.
    Read,
    /// Payload to disk.
    Write,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("device error {code} on block {block}")]
    Device { block: BlockId, code: i32 },
    #[error("block {block} is past the end of the device")]
    OutOfRange { block: BlockId },
}

/// Synchronous block transfer.
///
/// The cache only calls this while it holds the slot's hold lock, so an
/// implementation may sleep until the device completes.
pub trait DiskTransport {
    /// Move one block between the device and `data`.
    ///
    /// # Errors
    /// Whatever the device reports; the cache hands it back to its caller.
    fn transfer(
        &self,
        block: BlockId,
        data: &mut [u8; BLOCK_SIZE],
        direction: Direction,
    ) -> Result<(), TransferError>;
}

impl<T: DiskTransport + ?Sized> DiskTransport for &T {
    fn transfer(
        &self,
        block: BlockId,
        data: &mut [u8; BLOCK_SIZE],
        direction: Direction,
    ) -> Result<(), TransferError> {
        (**self).transfer(block, data, direction)
    }
}
