//! Coroutine handle type

use core::fmt;

/// Opaque handle to a coroutine descriptor
///
/// A slot index inside the engine's descriptor slab plus the slot
/// generation at the time the handle was issued. A handle outlives its descriptor safely: once the slot is reclaimed the
/// generation moves on and every operation on the old handle is a no-op.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoroutineId {
    index: u32,
    generation: u32,
}

impl CoroutineId {
    /// Create a handle from a slot index and generation
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        CoroutineId { index, generation }
    }

    /// Slot index
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoroutineId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "co#{}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coroutine_id_basics() {
        let id = CoroutineId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
    }

    #[test]
    fn test_coroutine_id_generations_differ() {
        let old = CoroutineId::new(3, 0);
        let new = CoroutineId::new(3, 1);
        assert_ne!(old, new);
        assert_eq!(old.index(), new.index());
    }

    #[test]
    fn test_coroutine_id_format() {
        let id = CoroutineId::new(5, 2);
        assert_eq!(format!("{}", id), "co#5");
        assert_eq!(format!("{:?}", id), "CoroutineId(5v2)");
    }
}
