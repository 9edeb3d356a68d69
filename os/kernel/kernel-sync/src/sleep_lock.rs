use crate::{Park, SpinLock};
use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
};

/// Long-term lock whose waiters are suspended instead of spinning.
///
/// A small [`SpinLock`] guards the `held` flag; contended callers park
/// through `P` and retry when woken. Holding a `SleepLock` across blocking
/// work (disk transfers) is expected. Taking one while holding a
/// [`SpinLock`] is not.
pub struct SleepLock<T, P> {
    held: SpinLock<bool>,
    park: P,
    data: UnsafeCell<T>,
}

// Safety: `data` is only reachable through a guard, and at most one guard exists.
unsafe impl<T: Send, P: Sync> Sync for SleepLock<T, P> {}
unsafe impl<T: Send, P: Send> Send for SleepLock<T, P> {}

impl<T, P> SleepLock<T, P> {
    pub const fn new(value: T, park: P) -> Self {
        Self {
            held: SpinLock::new(false),
            park,
            data: UnsafeCell::new(value),
        }
    }

    /// Racy snapshot of the lock state, for assertions only.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.held.with_lock(|held| *held)
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T, P: Park> SleepLock<T, P> {
    /// Acquires the lock, suspending the caller while another thread holds it.
    pub fn lock(&self) -> SleepLockGuard<'_, T, P> {
        let mut held = self.held.lock();
        while *held {
            self.park.park(move || drop(held));
            held = self.held.lock();
        }
        *held = true;
        drop(held);
        SleepLockGuard { lock: self }
    }

    /// Acquires the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T, P>> {
        let mut held = self.held.lock();
        if *held {
            return None;
        }
        *held = true;
        drop(held);
        Some(SleepLockGuard { lock: self })
    }

    fn unlock(&self) {
        self.held.with_lock(|held| {
            debug_assert!(*held, "sleep lock released while not held");
            *held = false;
        });
        self.park.unpark_all();
    }
}

/// Proof of holding a [`SleepLock`]; releases and wakes waiters on drop.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct SleepLockGuard<'a, T, P: Park> {
    lock: &'a SleepLock<T, P>,
}

impl<T, P: Park> Deref for SleepLockGuard<'_, T, P> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, P: Park> DerefMut for SleepLockGuard<'_, T, P> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, P: Park> Drop for SleepLockGuard<'_, T, P> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
