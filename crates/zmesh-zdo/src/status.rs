//! ZDO status bytes.

use std::fmt;

/// Status byte carried by every ZDO response.
///
/// These are protocol-level outcomes, not internal errors: a request that
/// cannot be satisfied gets a response with a non-zero status, never a
/// panic or a dropped reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZdoStatus {
    /// Request satisfied.
    Success,
    /// Request type not valid for the target.
    InvalidRequestType,
    /// No device matching the request addresses.
    DeviceNotFound,
    /// No free cache slot (or response buffer) available.
    InsufficientSpace,
    /// Request violates the cache's population rules.
    NotPermitted,
    /// Bounded table (endpoint or cluster list) is full.
    TableFull,
    /// Allocation failed while building the response.
    InsufficientMemory,
    /// Unknown status byte.
    Unknown(u8),
}

impl ZdoStatus {
    /// Whether this is the success status.
    pub fn is_success(self) -> bool {
        self == ZdoStatus::Success
    }
}

impl fmt::Display for ZdoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZdoStatus::Success => write!(f, "success"),
            ZdoStatus::InvalidRequestType => write!(f, "invalid request type"),
            ZdoStatus::DeviceNotFound => write!(f, "device not found"),
            ZdoStatus::InsufficientSpace => write!(f, "insufficient space"),
            ZdoStatus::NotPermitted => write!(f, "not permitted"),
            ZdoStatus::TableFull => write!(f, "table full"),
            ZdoStatus::InsufficientMemory => write!(f, "insufficient memory"),
            ZdoStatus::Unknown(code) => write!(f, "unknown status (0x{:02X})", code),
        }
    }
}

impl From<u8> for ZdoStatus {
    fn from(code: u8) -> Self {
        match code {
            0x00 => ZdoStatus::Success,
            0x80 => ZdoStatus::InvalidRequestType,
            0x81 => ZdoStatus::DeviceNotFound,
            0x8A => ZdoStatus::InsufficientSpace,
            0x8B => ZdoStatus::NotPermitted,
            0x8C => ZdoStatus::TableFull,
            0x8D => ZdoStatus::InsufficientMemory,
            other => ZdoStatus::Unknown(other),
        }
    }
}

impl From<ZdoStatus> for u8 {
    fn from(status: ZdoStatus) -> Self {
        match status {
            ZdoStatus::Success => 0x00,
            ZdoStatus::InvalidRequestType => 0x80,
            ZdoStatus::DeviceNotFound => 0x81,
            ZdoStatus::InsufficientSpace => 0x8A,
            ZdoStatus::NotPermitted => 0x8B,
            ZdoStatus::TableFull => 0x8C,
            ZdoStatus::InsufficientMemory => 0x8D,
            ZdoStatus::Unknown(code) => code,
        }
    }
}
