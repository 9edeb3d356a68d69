//! Which core is running right now.

/// Reports the index of the executing core.
///
/// Implementations must return a value below the allocator's core count and
/// must be called with preemption disabled if the answer is to stay true for
/// the duration of the call. A stale answer only costs locality: the frame
/// goes to (or comes from) another core's list.
pub trait CurrentCore {
    fn current_core(&self) -> usize;
}

/// Always reports core 0. For early boot, before per-CPU state exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct BootCore;

impl CurrentCore for BootCore {
    #[inline]
    fn current_core(&self) -> usize {
        0
    }
}
