//! Shared memory specific error types

use thiserror::Error;

/// Shared memory error types
#[derive(Error, Debug)]
pub enum SharedMemoryError {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Region not found
    #[error("Shared memory region not found: {0}")]
    RegionNotFound(String),

    /// Region already exists
    #[error("Shared memory region already exists: {0}")]
    RegionExists(String),

    /// Invalid region size
    #[error("Invalid region size: {size}, must be between {min} and {max}")]
    InvalidSize { size: usize, min: usize, max: usize },

    /// Ring capacity is not a usable power of two
    #[error("Invalid ring capacity: {0}, must be a power of two of at least 8 bytes")]
    InvalidCapacity(usize),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MappingFailed(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Cross-process signal could not be opened or used
    #[error("Signal unavailable: {0}")]
    SignalUnavailable(String),

    /// Not enough free space for a frame; the frame was dropped
    #[error("Ring buffer full: need {needed} bytes, have {available}")]
    BufferFull { needed: usize, available: usize },

    /// Frame can never fit in this ring
    #[error("Packet of {size} bytes exceeds ring capacity {capacity}")]
    PacketTooLarge { size: usize, capacity: usize },

    /// Client already has a worker running
    #[error("Client is already running")]
    AlreadyRunning,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias
pub type Result<T> = std::result::Result<T, SharedMemoryError>;

impl SharedMemoryError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SharedMemoryError::BufferFull { .. } => true,
            SharedMemoryError::Io(err) => {
                matches!(err.kind(),
                    std::io::ErrorKind::TimedOut |
                    std::io::ErrorKind::WouldBlock |
                    std::io::ErrorKind::Interrupted
                )
            }
            _ => false,
        }
    }

    /// Convert platform-specific error codes to SharedMemoryError
    pub fn from_platform_error(error: i32, message: impl Into<String>) -> Self {
        match error {
            13 => SharedMemoryError::PermissionDenied(message.into()), // EACCES
            2 => SharedMemoryError::RegionNotFound(message.into()),    // ENOENT
            17 => SharedMemoryError::RegionExists(message.into()),     // EEXIST
            _ => SharedMemoryError::Platform(format!("Error {}: {}", error, message.into())),
        }
    }
}
