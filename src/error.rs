//! Error types for the memprobe toolkit.
//!
//! Every operation reports precondition violations and bounded misses as a
//! structured `ProbeError`. Failures of the address-space collaborator itself
//! are carried through unchanged in `ProbeError::Memory`.

use thiserror::Error;

use crate::core::address::Address;
use crate::core::address_space::MemoryError;
use crate::core::profile::SegmentKind;

/// Main error type for memprobe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Invalid argument supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Instruction at `address` does not have the expected encoding
    #[error("Decode error at {address}: expected jmp qword [rip+disp32] (0x25ff), found {found:#06x}")]
    Decode { address: Address, found: u16 },

    /// Marker not present in the searched range
    #[error("Marker {marker:?} not found within {searched:#x} bytes")]
    MarkerNotFound { marker: String, searched: u64 },

    /// Bounded segment search gave up
    #[error("No {kind} segment signature within {pages} pages")]
    SegmentNotFound { kind: SegmentKind, pages: u64 },

    /// Index past the declared length of a forged view
    #[error("View index {index:#x} out of bounds (len={len:#x})")]
    ViewOutOfBounds { index: u64, len: u64 },

    /// Address space collaborator failure
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Target profile errors
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for memprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Config(err.to_string())
    }
}
