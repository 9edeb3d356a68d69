#![allow(dead_code)]

use kernel_bcache::{BlockId, BufferCache, Direction, DiskTransport, ExhaustionPolicy, TransferError};
use kernel_info::disk::BLOCK_SIZE;
use kernel_sync::StdPark;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type TestCache<const SLOTS: usize> = BufferCache<RamDisk, StdPark, SLOTS>;

pub fn cache<const SLOTS: usize>(policy: ExhaustionPolicy) -> TestCache<SLOTS> {
    cache_on(RamDisk::default(), policy)
}

pub fn cache_on<const SLOTS: usize>(disk: RamDisk, policy: ExhaustionPolicy) -> TestCache<SLOTS> {
    let _ = env_logger::builder().is_test(true).try_init();
    BufferCache::new(disk, policy)
}

pub const fn block(n: u32) -> BlockId {
    BlockId::new(1, n)
}

/// In-memory disk that counts transfers and can be told to fail or stall.
#[derive(Default)]
pub struct RamDisk {
    blocks: Mutex<HashMap<BlockId, [u8; BLOCK_SIZE]>>,
    reads: Mutex<HashMap<BlockId, usize>>,
    writes: AtomicUsize,
    broken: Mutex<HashSet<BlockId>>,
    read_delay: Option<Duration>,
}

impl RamDisk {
    /// Every read stalls for `read_delay`, widening race windows.
    pub fn slow(read_delay: Duration) -> Self {
        Self {
            read_delay: Some(read_delay),
            ..Self::default()
        }
    }

    pub fn reads_of(&self, id: BlockId) -> usize {
        self.reads.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: BlockId) -> Option<[u8; BLOCK_SIZE]> {
        self.blocks.lock().unwrap().get(&id).copied()
    }

    pub fn break_block(&self, id: BlockId) {
        self.broken.lock().unwrap().insert(id);
    }

    pub fn repair_block(&self, id: BlockId) {
        self.broken.lock().unwrap().remove(&id);
    }
}

/// What a never-written block reads back as.
#[allow(clippy::cast_possible_truncation)]
pub fn pristine(id: BlockId) -> [u8; BLOCK_SIZE] {
    [id.block as u8; BLOCK_SIZE]
}

impl DiskTransport for RamDisk {
    fn transfer(
        &self,
        block: BlockId,
        data: &mut [u8; BLOCK_SIZE],
        direction: Direction,
    ) -> Result<(), TransferError> {
        if self.broken.lock().unwrap().contains(&block) {
            return Err(TransferError::Device { block, code: -5 });
        }
        match direction {
            Direction::Read => {
                *self.reads.lock().unwrap().entry(block).or_default() += 1;
                if let Some(delay) = self.read_delay {
                    std::thread::sleep(delay);
                }
                *data = self.stored(block).unwrap_or_else(|| pristine(block));
            }
            Direction::Write => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                self.blocks.lock().unwrap().insert(block, *data);
            }
        }
        Ok(())
    }
}
