//! # Sharded Buffer Cache
//!
//! A fixed table of block-sized slots, addressed by linear probing from each
//! block's [home](crate::hash::home) position.
//!
//! ```text
//!  slot i:   meta  SpinLock<SlotMeta>   identity, valid, refcnt   (fast lock)
//!            data  SleepLock<[u8; 1024]>                          (hold lock)
//!  bucket i: SpinLock<()>   serializes misses whose home is i
//! ```
//!
//! ## Lookup
//! 1. Probe every slot from home, each under its own fast lock. A match gets
//!    its refcount bumped and the caller goes on to the hold lock.
//! 2. On a miss, take the home bucket lock and probe again. A match installed
//!    by a racing thread is adopted; otherwise the first slot with refcount 0
//!    is claimed. The bucket lock is dropped before the hold lock is taken.
//!
//! Every thread missing on the same block serializes on the same bucket, so
//! an identity is installed at most once. Recycling picks the first free slot
//! in probe order; there is no recency tracking.
//!
//! ## Lock order
//! bucket → slot fast lock. The hold lock is only taken with no spin lock
//! held, and disk transfers only happen under the hold lock.

use crate::buf::{Buf, Lease, PinnedBlock};
use crate::error::BufferCacheError;
use crate::hash::home;
use crate::transport::{BlockId, Direction, DiskTransport};
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_info::disk::{BLOCK_SIZE, NBUF};
use kernel_sync::{Park, SleepLock, SpinLock};
use log::{debug, error, info, trace, warn};

/// What `acquire` does when every slot is referenced.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum ExhaustionPolicy {
    /// Treat a full table as a kernel bug.
    #[default]
    Panic,
    /// Report [`BufferCacheError::NoFreeSlots`].
    Fail,
    /// Suspend until some slot's refcount drops to zero, then retry.
    Wait,
}

/// Slots carrying one identity and the references they hold.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Occupancy {
    /// Slots whose identity is the block.
    pub slots: usize,
    /// Sum of those slots' refcounts.
    pub refs: u32,
}

#[derive(Debug, Default)]
struct SlotMeta {
    id: Option<BlockId>,
    valid: bool,
    refcnt: u32,
}

struct Slot<P> {
    meta: SpinLock<SlotMeta>,
    data: SleepLock<[u8; BLOCK_SIZE], P>,
}

/// Fixed table of `SLOTS` block buffers in front of a [`DiskTransport`].
///
/// `P` suspends threads waiting for a hold lock (and, under
/// [`ExhaustionPolicy::Wait`], for a free slot).
pub struct BufferCache<D, P, const SLOTS: usize = NBUF> {
    transport: D,
    policy: ExhaustionPolicy,
    slots: [Slot<P>; SLOTS],
    buckets: [SpinLock<()>; SLOTS],
    /// Threads parked on `freed` under [`ExhaustionPolicy::Wait`].
    waiters: AtomicUsize,
    /// Orders "register as waiter" against "wake waiters".
    exhausted: SpinLock<()>,
    freed: P,
}

impl<D, P: Park, const SLOTS: usize> BufferCache<D, P, SLOTS> {
    /// Build a cache whose hold locks and exhaustion wait use `P::default()`.
    pub fn new(transport: D, policy: ExhaustionPolicy) -> Self
    where
        P: Default,
    {
        Self::with_parks(transport, policy, P::default)
    }

    /// Build a cache, taking one park for every slot plus one for the
    /// exhaustion wait from `make_park`.
    pub fn with_parks(transport: D, policy: ExhaustionPolicy, mut make_park: impl FnMut() -> P) -> Self {
        const { assert!(SLOTS > 0, "buffer cache needs at least one slot") };
        let slots = core::array::from_fn(|_| Slot {
            meta: SpinLock::new(SlotMeta::default()),
            data: SleepLock::new([0; BLOCK_SIZE], make_park()),
        });
        info!(
            "buffer cache: {} slots of {} bytes, exhaustion policy {policy:?}",
            SLOTS, BLOCK_SIZE
        );
        Self {
            transport,
            policy,
            slots,
            buckets: [const { SpinLock::new(()) }; SLOTS],
            waiters: AtomicUsize::new(0),
            exhausted: SpinLock::new(()),
            freed: make_park(),
        }
    }

    /// Number of slots; fixed for the cache's lifetime.
    pub const fn capacity(&self) -> usize {
        SLOTS
    }

    /// What [`acquire`](Self::acquire) does when every slot is referenced.
    pub const fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    /// The disk transport misses and writes go through.
    pub const fn transport(&self) -> &D {
        &self.transport
    }

    /// Snapshot of how many slots carry `id` and their summed refcount.
    ///
    /// Outside of a quiescent cache this is only a hint.
    pub fn occupancy(&self, id: BlockId) -> Occupancy {
        self.slots.iter().fold(Occupancy::default(), |mut acc, slot| {
            slot.meta.with_lock(|meta| {
                if meta.id == Some(id) {
                    acc.slots += 1;
                    acc.refs += meta.refcnt;
                }
            });
            acc
        })
    }

    /// Take a reference to `id`'s slot, installing it on a miss, and lock it.
    ///
    /// The returned handle holds the slot's hold lock; the payload is only
    /// meaningful if [`Buf::is_valid`] says so. See [`read`](Self::read).
    ///
    /// # Errors
    /// [`BufferCacheError::NoFreeSlots`] under [`ExhaustionPolicy::Fail`].
    ///
    /// # Panics
    /// When every slot is referenced under [`ExhaustionPolicy::Panic`].
    pub fn acquire(&self, id: BlockId) -> Result<Buf<'_, D, P, SLOTS>, BufferCacheError> {
        let mut waited = false;
        loop {
            if let Some(slot) = self.lookup(id).or_else(|| self.install(id)) {
                let lease = Lease::new(self, slot);
                let data = self.slots[slot].data.lock();
                return Ok(Buf::new(id, data, lease));
            }

            if waited {
                debug!("buffer cache: woke up but still no free slot for {id}, retrying");
            } else {
                warn!("buffer cache: all {} slots in use, cannot place {id}", SLOTS);
            }
            waited = true;
            match self.policy {
                ExhaustionPolicy::Panic => {
                    error!("buffer cache exhausted while acquiring {id}");
                    panic!("buffer cache: no free slots for block {id}");
                }
                ExhaustionPolicy::Fail => return Err(BufferCacheError::NoFreeSlots { block: id }),
                ExhaustionPolicy::Wait => self.wait_for_free_slot(),
            }
        }
    }

    /// Acquire `id` and make sure its payload holds the block's contents.
    ///
    /// # Errors
    /// Those of [`acquire`](Self::acquire), and transport failures. On a
    /// failed transfer the slot stays invalid and is released.
    pub fn read(&self, id: BlockId) -> Result<Buf<'_, D, P, SLOTS>, BufferCacheError>
    where
        D: DiskTransport,
    {
        let mut buf = self.acquire(id)?;
        if !buf.is_valid() {
            self.transport.transfer(id, &mut buf, Direction::Read)?;
            self.slots[buf.slot()].meta.with_lock(|meta| meta.valid = true);
            trace!("buffer cache: filled slot {} with {id}", buf.slot());
        }
        Ok(buf)
    }

    /// Write the payload of a locked buffer to disk.
    ///
    /// # Errors
    /// Transport failures.
    ///
    /// # Panics
    /// If `buf` belongs to a different cache.
    pub fn write(&self, buf: &mut Buf<'_, D, P, SLOTS>) -> Result<(), BufferCacheError>
    where
        D: DiskTransport,
    {
        self.check_owner(buf.lease(), "write");
        let id = buf.block();
        self.transport.transfer(id, buf, Direction::Write)?;
        trace!("buffer cache: wrote {id} from slot {}", buf.slot());
        Ok(())
    }

    /// Unlock the buffer and drop its reference. Same as dropping it.
    ///
    /// # Panics
    /// If `buf` belongs to a different cache.
    pub fn release(&self, buf: Buf<'_, D, P, SLOTS>) {
        self.check_owner(buf.lease(), "release");
        drop(buf);
    }

    /// Keep the buffer's slot (and identity) resident after the handle is
    /// released, until the returned token is unpinned or dropped.
    pub fn pin<'a>(&'a self, buf: &Buf<'a, D, P, SLOTS>) -> PinnedBlock<'a, D, P, SLOTS> {
        self.check_owner(buf.lease(), "pin");
        let slot = buf.slot();
        self.slots[slot].meta.with_lock(|meta| meta.refcnt += 1);
        trace!("buffer cache: pinned {} in slot {slot}", buf.block());
        PinnedBlock::new(buf.block(), Lease::new(self, slot))
    }

    /// Drop the reference taken by [`pin`](Self::pin). Same as dropping the token.
    ///
    /// # Panics
    /// If `pinned` belongs to a different cache.
    pub fn unpin(&self, pinned: PinnedBlock<'_, D, P, SLOTS>) {
        self.check_owner(pinned.lease(), "unpin");
        drop(pinned);
    }

    /// Probe order starting at `id`'s home.
    fn probe(id: BlockId) -> impl Iterator<Item = usize> {
        let start = home(id.block, SLOTS);
        (0..SLOTS).map(move |step| (start + step) % SLOTS)
    }

    /// Find `id` and take a reference to it.
    fn lookup(&self, id: BlockId) -> Option<usize> {
        let slot = Self::probe(id).find(|&slot| {
            self.slots[slot].meta.with_lock(|meta| {
                let hit = meta.id == Some(id);
                if hit {
                    meta.refcnt += 1;
                }
                hit
            })
        })?;
        trace!("buffer cache: hit {id} in slot {slot}");
        Some(slot)
    }

    /// Miss path: under the home bucket lock, adopt a racing install of `id`
    /// or claim the first unreferenced slot for it.
    fn install(&self, id: BlockId) -> Option<usize> {
        let _bucket = self.buckets[home(id.block, SLOTS)].lock();

        if let Some(slot) = self.lookup(id) {
            return Some(slot);
        }

        let mut evicted = None;
        let slot = Self::probe(id).find(|&slot| {
            self.slots[slot].meta.with_lock(|meta| {
                if meta.refcnt != 0 {
                    return false;
                }
                evicted = meta.id.replace(id);
                meta.valid = false;
                meta.refcnt = 1;
                true
            })
        })?;

        match evicted {
            Some(old) => debug!("buffer cache: slot {slot} recycled from {old} to {id}"),
            None => trace!("buffer cache: installed {id} in empty slot {slot}"),
        }
        Some(slot)
    }

    fn has_free_slot(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.meta.with_lock(|meta| meta.refcnt == 0))
    }

    /// Park until some slot might be free.
    ///
    /// The waiter count goes up before the re-check, and a releaser reads it
    /// after its decrement, so one of the two always sees the other.
    fn wait_for_free_slot(&self) {
        let guard = self.exhausted.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        if !self.has_free_slot() {
            debug!("buffer cache: waiting for a free slot");
            self.freed.park(move || drop(guard));
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn slot_valid(&self, slot: usize) -> bool {
        self.slots[slot].meta.with_lock(|meta| meta.valid)
    }

    /// Drop one reference to `slot`, waking exhaustion waiters when it hits zero.
    pub(crate) fn unref(&self, slot: usize) {
        let now_free = self.slots[slot].meta.with_lock(|meta| {
            debug_assert!(meta.refcnt > 0, "slot {slot} released with no references");
            meta.refcnt -= 1;
            meta.refcnt == 0
        });
        if now_free && self.waiters.load(Ordering::SeqCst) > 0 {
            let _exhausted = self.exhausted.lock();
            self.freed.unpark_all();
        }
    }

    #[track_caller]
    fn check_owner(&self, lease: &Lease<'_, D, P, SLOTS>, op: &'static str) {
        if !core::ptr::eq(lease.cache(), self) {
            error!("buffer cache: {op} on a handle from another cache");
            panic!("buffer cache: {op} on a handle from another cache");
        }
    }
}
