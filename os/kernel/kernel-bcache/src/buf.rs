//! Handles to cache slots.

use crate::cache::BufferCache;
use crate::transport::BlockId;
use core::fmt;
use core::ops::{Deref, DerefMut};
use kernel_info::disk::BLOCK_SIZE;
use kernel_sync::{Park, SleepLockGuard};

/// One counted reference to a slot, dropped when the lease is.
pub(crate) struct Lease<'a, D, P: Park, const SLOTS: usize> {
    cache: &'a BufferCache<D, P, SLOTS>,
    slot: usize,
}

impl<'a, D, P: Park, const SLOTS: usize> Lease<'a, D, P, SLOTS> {
    /// Wrap a reference the caller already counted.
    pub(crate) const fn new(cache: &'a BufferCache<D, P, SLOTS>, slot: usize) -> Self {
        Self { cache, slot }
    }

    pub(crate) const fn cache(&self) -> &'a BufferCache<D, P, SLOTS> {
        self.cache
    }
}

impl<D, P: Park, const SLOTS: usize> Drop for Lease<'_, D, P, SLOTS> {
    fn drop(&mut self) {
        self.cache.unref(self.slot);
    }
}

/// A referenced slot whose hold lock is held by the owner of this handle.
///
/// Dereferences to the block payload. Dropping it releases the hold lock
/// first and the reference second.
pub struct Buf<'a, D, P: Park, const SLOTS: usize> {
    id: BlockId,
    // Field order is drop order: unlock, then unref.
    data: SleepLockGuard<'a, [u8; BLOCK_SIZE], P>,
    lease: Lease<'a, D, P, SLOTS>,
}

impl<'a, D, P: Park, const SLOTS: usize> Buf<'a, D, P, SLOTS> {
    pub(crate) const fn new(
        id: BlockId,
        data: SleepLockGuard<'a, [u8; BLOCK_SIZE], P>,
        lease: Lease<'a, D, P, SLOTS>,
    ) -> Self {
        Self { id, data, lease }
    }

    pub(crate) const fn lease(&self) -> &Lease<'a, D, P, SLOTS> {
        &self.lease
    }

    pub const fn block(&self) -> BlockId {
        self.id
    }

    /// Index of the slot backing this buffer.
    pub const fn slot(&self) -> usize {
        self.lease.slot
    }

    /// Whether the payload holds the block's on-disk contents (or newer).
    pub fn is_valid(&self) -> bool {
        self.lease.cache.slot_valid(self.lease.slot)
    }
}

impl<D, P: Park, const SLOTS: usize> Deref for Buf<'_, D, P, SLOTS> {
    type Target = [u8; BLOCK_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<D, P: Park, const SLOTS: usize> DerefMut for Buf<'_, D, P, SLOTS> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<D, P: Park, const SLOTS: usize> fmt::Debug for Buf<'_, D, P, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("block", &self.id)
            .field("slot", &self.lease.slot)
            .finish_non_exhaustive()
    }
}

/// Keeps a block's slot from being recycled without holding its lock.
pub struct PinnedBlock<'a, D, P: Park, const SLOTS: usize> {
    id: BlockId,
    lease: Lease<'a, D, P, SLOTS>,
}

impl<'a, D, P: Park, const SLOTS: usize> PinnedBlock<'a, D, P, SLOTS> {
    pub(crate) const fn new(id: BlockId, lease: Lease<'a, D, P, SLOTS>) -> Self {
        Self { id, lease }
    }

    pub(crate) const fn lease(&self) -> &Lease<'a, D, P, SLOTS> {
        &self.lease
    }

    pub const fn block(&self) -> BlockId {
        self.id
    }

    pub const fn slot(&self) -> usize {
        self.lease.slot
    }
}

impl<D, P: Park, const SLOTS: usize> fmt::Debug for PinnedBlock<'_, D, P, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedBlock")
            .field("block", &self.id)
            .field("slot", &self.lease.slot)
            .finish()
    }
}
