//! # Kernel Buffer Cache
//!
//! Caches disk blocks in a fixed table of slots so that the file system
//! reads each block from disk once and serializes its users on a per-slot
//! hold lock.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           File system (external)             │
//! │   read / write / release / pin / unpin       │
//! └──────────────────┬───────────────────────────┘
//!                    │ Buf (hold lock held)
//! ┌──────────────────▼───────────────────────────┐
//! │               BufferCache                    │
//! │   • per-slot fast lock: identity, refcount   │
//! │   • per-slot hold lock: payload              │
//! │   • per-home bucket lock: miss path          │
//! └──────────────────┬───────────────────────────┘
//!                    │ DiskTransport (on miss / write)
//! ┌──────────────────▼───────────────────────────┐
//! │            Disk driver (external)            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! No lock covers the whole table. Lookups touch one fast lock at a time,
//! misses on different home positions proceed in parallel, and only the
//! hold lock is ever held across a disk transfer.
//!
//! The "caller must hold the buffer" rules are carried by types: only
//! [`acquire`](BufferCache::acquire) and [`read`](BufferCache::read) produce a
//! [`Buf`], and [`write`](BufferCache::write) and
//! [`release`](BufferCache::release) take one.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_bcache::{BlockId, BufferCache, Direction, DiskTransport, ExhaustionPolicy, TransferError};
//! use kernel_info::disk::BLOCK_SIZE;
//! use kernel_sync::StdPark;
//!
//! struct ZeroDisk;
//!
//! impl DiskTransport for ZeroDisk {
//!     fn transfer(&self, _: BlockId, data: &mut [u8; BLOCK_SIZE], dir: Direction) -> Result<(), TransferError> {
//!         if dir == Direction::Read {
//!             data.fill(0);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let cache: BufferCache<ZeroDisk, StdPark> = BufferCache::new(ZeroDisk, ExhaustionPolicy::Panic);
//! let block = BlockId::new(1, 5);
//!
//! let mut buf = cache.read(block)?;
//! buf[0] = 0xAA;
//! cache.write(&mut buf)?;
//!
//! let pinned = cache.pin(&buf);
//! cache.release(buf);
//! assert_eq!(cache.occupancy(block).refs, 1);
//! cache.unpin(pinned);
//! # Ok::<(), kernel_bcache::BufferCacheError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod buf;
pub mod cache;
mod error;
pub mod hash;
pub mod transport;

pub use buf::{Buf, PinnedBlock};
pub use cache::{BufferCache, ExhaustionPolicy, Occupancy};
pub use error::BufferCacheError;
pub use transport::{BlockId, Direction, DiskTransport, TransferError};
