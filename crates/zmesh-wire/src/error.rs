//! Wire protocol error types.

use thiserror::Error;

/// Errors that can occur while framing or parsing wire bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Payload exceeds the one-byte length field.
    #[error("frame too long: maximum {max} payload bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed payload length.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// Frame checksum did not match the received bytes.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },

    /// Frame did not start with the SOP marker.
    #[error("missing start-of-packet marker: got 0x{0:02X}")]
    MissingSop(u8),

    /// A payload read ran past the end of the buffer.
    #[error("unexpected end of payload: need {need} more bytes at offset {offset}")]
    UnexpectedEnd {
        /// Byte offset of the failed read.
        offset: usize,
        /// Bytes still required.
        need: usize,
    },

    /// A payload write ran past the writer's capacity.
    #[error("payload overflow: capacity {capacity} bytes, write would reach {reach}")]
    Overflow {
        /// Writer capacity.
        capacity: usize,
        /// Position the write would have reached.
        reach: usize,
    },
}
