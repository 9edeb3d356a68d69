//! Suspension seam between hold locks and the scheduler.

/// Puts the calling thread to sleep until another thread wakes it.
///
/// This is the only thing hold locks need from the scheduler. A kernel
/// implementation sleeps on a wait channel; hosted code can use [`StdPark`].
///
/// # Contract
/// * `park` registers the caller as a waiter **before** running `release`,
///   and only then deschedules it. An [`unpark_all`](Park::unpark_all) that
///   starts after `release` returned therefore always wakes the caller.
/// * `park` may return spuriously; callers re-check their condition.
pub trait Park {
    /// Suspends the caller. `release` typically drops the spin lock that
    /// protects the condition being waited on.
    fn park<F: FnOnce()>(&self, release: F);

    /// Wakes every thread currently parked on `self`.
    fn unpark_all(&self);
}

#[cfg(feature = "std")]
mod std_park {
    use super::Park;
    use std::sync::{Condvar, Mutex, PoisonError};

    /// [`Park`] on top of the host's mutex and condition variable.
    ///
    /// Wake-ups are tracked with a generation counter, so a waiter only
    /// leaves `park` once some `unpark_all` happened after it registered.
    #[derive(Debug, Default)]
    pub struct StdPark {
        generation: Mutex<u64>,
        wakeup: Condvar,
    }

    impl StdPark {
        #[must_use]
        pub const fn new() -> Self {
            Self {
                generation: Mutex::new(0),
                wakeup: Condvar::new(),
            }
        }
    }

    impl Park for StdPark {
        fn park<F: FnOnce()>(&self, release: F) {
            let generation = self
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let seen = *generation;
            release();
            let _woken = self
                .wakeup
                .wait_while(generation, |g| *g == seen)
                .unwrap_or_else(PoisonError::into_inner);
        }

        fn unpark_all(&self) {
            {
                let mut generation = self
                    .generation
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *generation = generation.wrapping_add(1);
            }
            self.wakeup.notify_all();
        }
    }
}

#[cfg(feature = "std")]
pub use std_park::StdPark;
