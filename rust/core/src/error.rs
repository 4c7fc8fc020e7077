//! Error types for the overlay link packet protocol

use crate::packet::PacketKind;
use thiserror::Error;

/// Errors raised while decoding framed packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Declared frame cannot exist inside the ring; the stream is desynchronised
    #[error("Malformed framing: frame of {frame_len} bytes does not fit in {limit} bytes")]
    MalformedFraming { frame_len: usize, limit: usize },

    /// Payload length disagrees with the fixed size of its kind
    #[error("Size mismatch for {kind:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        kind: PacketKind,
        expected: usize,
        actual: usize,
    },

    /// Header carries a kind this build does not know
    #[error("Unknown packet kind: {0}")]
    UnknownKind(u8),

    /// Draw command carries a shape tag this build does not know
    #[error("Unknown shape tag: {0}")]
    UnknownShape(u8),
}

/// Convenience type alias for decode results
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Whether the consumer must discard everything still pending.
    ///
    /// Only framing errors do; payload errors drop the single packet and the
    /// cursor still advances by the declared size.
    pub fn flushes_pending(&self) -> bool {
        matches!(self, DecodeError::MalformedFraming { .. })
    }

    /// Get error category for metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            DecodeError::MalformedFraming { .. } => ErrorCategory::Framing,
            DecodeError::SizeMismatch { .. } => ErrorCategory::Payload,
            DecodeError::UnknownKind(_) => ErrorCategory::Payload,
            DecodeError::UnknownShape(_) => ErrorCategory::Payload,
        }
    }
}

/// Error categories for metrics and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Recovered by flushing the unread region
    Framing,
    /// Recovered by dropping one packet
    Payload,
}
