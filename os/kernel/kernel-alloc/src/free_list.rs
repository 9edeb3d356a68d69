use crate::frame::Frame;
use crate::phys_mapper::PhysMapper;

/// Header stored at the beginning of every **free** frame.
///
/// ```text
/// +----------------------+--------------------------------+
/// | ListNode (next)      |  scrubbed payload (junk bytes) |
/// +----------------------+--------------------------------+
/// ^ frame base
/// ```
///
/// The list costs no memory of its own: each free frame carries the link to
/// the next one. The header is overwritten as soon as the frame is handed out.
#[repr(C)]
struct ListNode {
    next: Option<Frame>,
}

/// A LIFO stack of free frames owned by one core.
///
/// # Invariants
/// - Every frame on the list has refcount 0 and is on no other list.
/// - `len` equals the number of frames reachable from `head`.
pub(crate) struct FreeList {
    head: Option<Frame>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Push `frame` onto the list, writing the link into the frame itself.
    ///
    /// # Safety
    /// - `frame` must be unused by anyone else and reachable through `mapper`.
    /// - Must only be called while holding the list's lock.
    pub(crate) unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, frame: Frame) {
        let node: &mut ListNode = unsafe { mapper.phys_to_mut(frame.base()) };
        *node = ListNode { next: self.head };
        self.head = Some(frame);
        self.len += 1;
    }

    /// Pop the most recently pushed frame.
    ///
    /// # Safety
    /// - Every frame on the list must still be reachable through `mapper`.
    /// - Must only be called while holding the list's lock.
    pub(crate) unsafe fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<Frame> {
        let frame = self.head?;
        let node: &mut ListNode = unsafe { mapper.phys_to_mut(frame.base()) };
        self.head = node.next;
        self.len -= 1;
        Some(frame)
    }
}
