//! Network-layer error types.

use thiserror::Error;

use crate::FrameRecord;

/// Why the pool rejected an insertion.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddReason {
    /// Every slot in the pool is occupied.
    #[error("frame buffer pool exhausted")]
    PoolExhausted,

    /// A live record already carries this handle.
    #[error("handle 0x{0:02X} already in use")]
    DuplicateHandle(u8),
}

/// A rejected pool insertion.
///
/// The rejected record rides back to the caller so that payload ownership
/// never silently transfers on failure: the caller keeps (and eventually
/// drops) the buffer it tried to enqueue.
#[derive(Debug)]
pub struct AddError {
    /// Why the insertion failed.
    pub reason: AddReason,
    /// The record the pool refused, returned intact.
    pub record: FrameRecord,
}

impl std::fmt::Display for AddError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for AddError {}
