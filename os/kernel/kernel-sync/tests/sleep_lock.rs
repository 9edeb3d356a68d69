use kernel_sync::{Park, SleepLock, StdPark};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use std::{panic, thread};

#[test]
fn guard_gives_exclusive_access() {
    let l = SleepLock::new([0u8; 16], StdPark::new());
    {
        let mut g = l.lock();
        g[3] = 9;
        assert!(l.is_locked());
        assert!(l.try_lock().is_none());
    }
    assert!(!l.is_locked());
    assert_eq!(l.lock()[3], 9);
}

#[test]
fn waiter_is_suspended_until_release() {
    let l = Arc::new(SleepLock::new(0u32, StdPark::new()));
    let entered = Arc::new(AtomicBool::new(false));

    let g = l.lock();
    let waiter = {
        let l = Arc::clone(&l);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            let mut g = l.lock();
            entered.store(true, Ordering::SeqCst);
            *g += 1;
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!entered.load(Ordering::SeqCst), "waiter got in while held");
    drop(g);

    waiter.join().unwrap();
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(*l.lock(), 1);
}

#[test]
fn contended_holders_never_overlap() {
    let threads = 8;
    let iters = 500;
    let l = Arc::new(SleepLock::new(0usize, StdPark::new()));
    let inside = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let l = Arc::clone(&l);
            let inside = Arc::clone(&inside);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    let mut g = l.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    *g += 1;
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*l.lock(), threads * iters);
}

#[test]
fn lock_is_released_on_panic() {
    let l = SleepLock::new(1u8, StdPark::new());
    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let mut g = l.lock();
        *g = 2;
        panic!("boom");
    }));
    assert!(res.is_err());
    assert_eq!(*l.try_lock().expect("released by unwinding"), 2);
}

#[test]
fn unpark_after_release_is_never_lost() {
    let park = Arc::new(StdPark::new());
    for _ in 0..50 {
        let released = Arc::new(AtomicBool::new(false));
        let waker = {
            let park = Arc::clone(&park);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                while !released.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                park.unpark_all();
            })
        };
        // Waking as early as possible after `release` must still end the park.
        park.park(|| released.store(true, Ordering::SeqCst));
        waker.join().unwrap();
    }
}
