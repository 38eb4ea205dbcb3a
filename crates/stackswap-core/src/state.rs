//! Coroutine lifecycle states

use core::fmt;

/// State of a coroutine as observed from outside the engine
///
/// `Running` is not stored anywhere; it is derived from the engine's
/// `current` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Spawned, entry callable not yet started
    Created,

    /// In the alive list, suspended with a saved stack image
    Ready,

    /// Owns the shared stack right now
    Running,

    /// Parked in the blocked list until someone calls `unblock`
    Blocked,

    /// Entry returned or the engine was torn down
    Finished,
}

impl fmt::Display for CoroutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoroutineState::Created => "created",
            CoroutineState::Ready => "ready",
            CoroutineState::Running => "running",
            CoroutineState::Blocked => "blocked",
            CoroutineState::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CoroutineState::Created.to_string(), "created");
        assert_eq!(CoroutineState::Blocked.to_string(), "blocked");
        assert_eq!(format!("{}", CoroutineState::Finished), "finished");
    }
}
