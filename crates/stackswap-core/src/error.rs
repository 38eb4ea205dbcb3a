//! Error types for the stackswap engine
//!
//! The scheduling surface itself never fails: invalid requests are no-ops.
//! These errors cover engine construction and memory management.

use core::fmt;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building or running an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),

    /// Memory allocation/mapping failed
    MemoryError(MemoryError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            EngineError::MemoryError(e) => write!(f, "memory error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Memory-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    MapFailed { size: usize },

    /// mprotect failed
    ProtectionFailed,

    /// A stack image buffer could not be (re)allocated
    ImageAllocation { requested: usize },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::MapFailed { size } => write!(f, "mmap of {} bytes failed", size),
            MemoryError::ProtectionFailed => write!(f, "memory protection change failed"),
            MemoryError::ImageAllocation { requested } => {
                write!(f, "cannot allocate {} bytes for a stack image", requested)
            }
        }
    }
}

impl From<MemoryError> for EngineError {
    fn from(e: MemoryError) -> Self {
        EngineError::MemoryError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EngineError::InvalidConfig("idle_reserve too small");
        assert_eq!(format!("{}", e), "invalid config: idle_reserve too small");

        let e = EngineError::MemoryError(MemoryError::ImageAllocation { requested: 64 });
        assert_eq!(
            format!("{}", e),
            "memory error: cannot allocate 64 bytes for a stack image"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: EngineError = MemoryError::ProtectionFailed.into();
        assert!(matches!(err, EngineError::MemoryError(MemoryError::ProtectionFailed)));
    }
}
