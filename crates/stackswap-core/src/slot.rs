//! Generation-tracked slab
//!
//! Owns values in fixed slots addressed by `u32` index. Freed slots go onto
//! a LIFO free stack for cache-friendly reuse; every release bumps the slot's
//! generation so that stale handles can be told apart from live ones.
//!
//! Single-threaded by design: the engine owns one slab per instance.

/// A slot in the slab
#[derive(Debug)]
struct Slot<T> {
    /// Bumped each time the slot is vacated
    generation: u32,
    value: Option<T>,
}

/// Slab of `T` with stable indices and per-slot generations
#[derive(Debug)]
pub struct Slab<T> {
    slots: Vec<Slot<T>>,

    /// LIFO stack of free slot indices (for reuse)
    free: Vec<u32>,

    /// Number of occupied slots
    len: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Create an empty slab
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, returning its slot index
    ///
    /// Prefers reusing recently freed slots (LIFO).
    pub fn insert(&mut self, value: T) -> u32 {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize].value = Some(value);
            return index;
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        index
    }

    /// Remove the value in `index`, bumping the slot generation
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Current generation of a slot (0 for never-used indices)
    #[inline]
    pub fn generation(&self, index: u32) -> u32 {
        self.slots
            .get(index as usize)
            .map(|s| s.generation)
            .unwrap_or(0)
    }

    /// Check that `index` is occupied and still at `generation`
    #[inline]
    pub fn is_live(&self, index: u32, generation: u32) -> bool {
        match self.slots.get(index as usize) {
            Some(slot) => slot.value.is_some() && slot.generation == generation,
            None => false,
        }
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
