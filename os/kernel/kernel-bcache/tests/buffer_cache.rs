mod common;

use common::{RamDisk, block, cache, cache_on, pristine};
use kernel_bcache::hash::home;
use kernel_bcache::{BufferCacheError, ExhaustionPolicy, Occupancy, TransferError};

#[test]
fn miss_reads_from_disk_and_hit_does_not() {
    let cache = cache::<8>(ExhaustionPolicy::Panic);

    let buf = cache.read(block(3)).unwrap();
    assert!(buf.is_valid());
    assert_eq!(*buf, pristine(block(3)));
    cache.release(buf);

    let buf = cache.read(block(3)).unwrap();
    assert_eq!(*buf, pristine(block(3)));
    drop(buf);

    assert_eq!(cache.transport().reads_of(block(3)), 1);
    assert_eq!(cache.occupancy(block(3)), Occupancy { slots: 1, refs: 0 });
}

#[test]
fn acquire_does_not_touch_the_disk() {
    let cache = cache::<4>(ExhaustionPolicy::Panic);
    let buf = cache.acquire(block(9)).unwrap();
    assert!(!buf.is_valid());
    drop(buf);
    assert_eq!(cache.transport().total_reads(), 0);
}

#[test]
fn first_install_lands_on_home_slot() {
    let cache = cache::<30>(ExhaustionPolicy::Panic);
    let buf = cache.read(block(5)).unwrap();
    assert_eq!(buf.slot(), home(5, 30));
    assert_eq!(buf.slot(), 19);
}

#[test]
fn colliding_blocks_probe_to_the_next_slot() {
    let cache = cache::<30>(ExhaustionPolicy::Panic);
    assert_eq!(home(2, 30), home(5, 30));

    let a = cache.read(block(5)).unwrap();
    let b = cache.read(block(2)).unwrap();
    assert_eq!(a.slot(), 19);
    assert_eq!(b.slot(), 20);
    assert_ne!(*a, *b);
}

#[test]
fn probing_wraps_around_the_table() {
    let cache = cache::<30>(ExhaustionPolicy::Panic);
    // Home 28; fill 28 and 29 so the third colliding block wraps to 0.
    let same_home: Vec<u32> = (0..1000).filter(|&b| home(b, 30) == 28).take(3).collect();
    let bufs: Vec<_> = same_home.iter().map(|&b| cache.read(block(b)).unwrap()).collect();
    let slots: Vec<_> = bufs.iter().map(|b| b.slot()).collect();
    assert_eq!(slots, vec![28, 29, 0]);
}

#[test]
fn devices_are_part_of_the_identity() {
    let cache = cache::<4>(ExhaustionPolicy::Panic);
    let a = cache.acquire(kernel_bcache::BlockId::new(1, 7)).unwrap();
    let b = cache.acquire(kernel_bcache::BlockId::new(2, 7)).unwrap();
    assert_ne!(a.slot(), b.slot());
}

#[test]
fn write_persists_payload() {
    let cache = cache::<4>(ExhaustionPolicy::Panic);

    let mut buf = cache.read(block(1)).unwrap();
    buf[..4].copy_from_slice(b"root");
    cache.write(&mut buf).unwrap();
    cache.release(buf);

    assert_eq!(cache.transport().writes(), 1);
    assert_eq!(&cache.transport().stored(block(1)).unwrap()[..4], b"root");
}

#[test]
fn modified_payload_survives_release_while_cached() {
    let cache = cache::<4>(ExhaustionPolicy::Panic);

    let mut buf = cache.read(block(1)).unwrap();
    buf[0] = 0xEE;
    drop(buf);

    let buf = cache.read(block(1)).unwrap();
    assert_eq!(buf[0], 0xEE);
    assert_eq!(cache.transport().reads_of(block(1)), 1);
}

#[test]
fn recycled_slot_is_reread() {
    let cache = cache::<2>(ExhaustionPolicy::Panic);

    for n in [10, 11, 12, 10] {
        drop(cache.read(block(n)).unwrap());
    }
    // All four share home 0, and an unreferenced home slot is recycled before
    // the empty slot after it is ever probed.
    assert_eq!(cache.transport().reads_of(block(10)), 2);
    assert_eq!(cache.occupancy(block(10)).slots, 1);
}

#[test]
fn failed_read_leaves_slot_invalid_and_unreferenced() {
    let disk = RamDisk::default();
    disk.break_block(block(4));
    let cache = cache_on::<4>(disk, ExhaustionPolicy::Panic);

    let err = cache.read(block(4)).unwrap_err();
    assert_eq!(
        err,
        BufferCacheError::Transport(TransferError::Device { block: block(4), code: -5 })
    );
    assert_eq!(cache.occupancy(block(4)), Occupancy { slots: 1, refs: 0 });

    cache.transport().repair_block(block(4));
    let buf = cache.read(block(4)).unwrap();
    assert!(buf.is_valid());
    assert_eq!(*buf, pristine(block(4)));
}

#[test]
fn failed_write_is_reported_and_buffer_stays_usable() {
    let cache = cache::<4>(ExhaustionPolicy::Panic);
    let mut buf = cache.read(block(6)).unwrap();
    cache.transport().break_block(block(6));

    assert!(matches!(cache.write(&mut buf), Err(BufferCacheError::Transport(_))));
    cache.transport().repair_block(block(6));
    cache.write(&mut buf).unwrap();
}

#[test]
fn pin_keeps_identity_resident() {
    let cache = cache::<2>(ExhaustionPolicy::Fail);

    let buf = cache.read(block(1)).unwrap();
    let pinned = cache.pin(&buf);
    assert_eq!(pinned.slot(), buf.slot());
    cache.release(buf);
    assert_eq!(cache.occupancy(block(1)), Occupancy { slots: 1, refs: 1 });

    // Only the other slot can be recycled.
    let other = cache.read(block(2)).unwrap();
    assert_eq!(
        cache.acquire(block(3)).unwrap_err(),
        BufferCacheError::NoFreeSlots { block: block(3) }
    );
    drop(other);
    drop(cache.read(block(3)).unwrap());

    let buf = cache.read(block(1)).unwrap();
    assert_eq!(cache.transport().reads_of(block(1)), 1);
    drop(buf);

    cache.unpin(pinned);
    assert_eq!(cache.occupancy(block(1)).refs, 0);
}

#[test]
fn dropping_a_pin_unpins() {
    let cache = cache::<2>(ExhaustionPolicy::Fail);
    let buf = cache.read(block(1)).unwrap();
    {
        let _pinned = cache.pin(&buf);
        assert_eq!(cache.occupancy(block(1)).refs, 2);
    }
    assert_eq!(cache.occupancy(block(1)).refs, 1);
}

#[test]
fn fail_policy_reports_exhaustion() {
    let cache = cache::<3>(ExhaustionPolicy::Fail);
    let held: Vec<_> = (0..3).map(|n| cache.acquire(block(n)).unwrap()).collect();

    let err = cache.acquire(block(99)).unwrap_err();
    assert_eq!(err, BufferCacheError::NoFreeSlots { block: block(99) });
    // Held slots were not touched.
    for (n, buf) in (0..3).zip(&held) {
        assert_eq!(buf.block(), block(n));
        assert_eq!(cache.occupancy(block(n)), Occupancy { slots: 1, refs: 1 });
    }

    drop(held);
    assert!(cache.acquire(block(99)).is_ok());
}

#[test]
fn cached_block_is_found_even_when_table_is_full() {
    let cache = cache::<2>(ExhaustionPolicy::Fail);
    let a = cache.read(block(1)).unwrap();
    let b = cache.read(block(2)).unwrap();
    let pinned = cache.pin(&a);
    drop(a);
    drop(b);
    let _b_again = cache.read(block(2)).unwrap();
    // Slot of block 1 is pinned, slot of block 2 held: still a hit.
    let a_again = cache.read(block(1)).unwrap();
    assert_eq!(a_again.slot(), pinned.slot());
}

#[test]
#[should_panic(expected = "no free slots")]
fn panic_policy_treats_exhaustion_as_fatal() {
    let cache = cache::<2>(ExhaustionPolicy::Panic);
    let _a = cache.acquire(block(1)).unwrap();
    let _b = cache.acquire(block(2)).unwrap();
    let _ = cache.acquire(block(3));
}

#[test]
#[should_panic(expected = "handle from another cache")]
fn handles_are_tied_to_their_cache() {
    let one = cache::<2>(ExhaustionPolicy::Panic);
    let two = cache::<2>(ExhaustionPolicy::Panic);
    let mut buf = one.read(block(1)).unwrap();
    let _ = two.write(&mut buf);
}

#[test]
fn default_policy_is_panic() {
    assert_eq!(ExhaustionPolicy::default(), ExhaustionPolicy::Panic);
    let cache = cache::<30>(ExhaustionPolicy::default());
    assert_eq!(cache.capacity(), 30);
    assert_eq!(cache.policy(), ExhaustionPolicy::Panic);
}
