//! Executor errors

use core::fmt;

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),

    /// The OS refused to start a worker thread
    Spawn(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            ExecutorError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl std::error::Error for ExecutorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ExecutorError::InvalidConfig("max_queue_size must be > 0");
        assert_eq!(e.to_string(), "invalid config: max_queue_size must be > 0");
    }
}
