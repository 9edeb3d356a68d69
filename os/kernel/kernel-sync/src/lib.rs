//! # Kernel synchronization primitives
//!
//! Two families of locks, matching how long a critical section lasts:
//!
//! * **Fast locks** busy-wait. [`SpinLock`] and the [`Mutex`] family over
//!   [`RawTicket`] are held for a handful of instructions (a refcount bump,
//!   a list pop) and never across anything that can block.
//! * **Hold locks** suspend. A [`SleepLock`] parks waiters through a [`Park`]
//!   implementation supplied by the scheduler, so a holder may keep it across
//!   disk I/O without burning other cores.
//!
//! Every lock hands out an RAII guard; releasing happens on drop, including
//! on early returns and unwinding.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

mod mutex;
mod park;
mod raw_ticket;
mod sleep_lock;
mod spin_lock;
mod sync_once_cell;

pub use mutex::{Mutex, MutexGuard};
#[cfg(feature = "std")]
pub use park::StdPark;
pub use park::Park;
pub use raw_ticket::RawTicket;
pub use sleep_lock::{SleepLock, SleepLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;

/// A FIFO-fair spinning mutex.
pub type TicketMutex<T> = Mutex<T, RawTicket>;

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
