use crate::transport::{BlockId, TransferError};

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum BufferCacheError {
    #[error("no free buffer slot for block {block}")]
    NoFreeSlots { block: BlockId },
    #[error("disk transfer failed: {0}")]
    Transport(#[from] TransferError),
}
