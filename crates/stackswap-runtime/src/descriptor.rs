//! Coroutine descriptor and its saved stack image
//!
//! A suspended coroutine owns no stack of its own. Its frames live in a heap
//! buffer between switches and are copied back into the shared native stack,
//! at the same addresses, right before it resumes.

use crate::scheduler::Scheduler;
use stackswap_core::error::MemoryError;
use stackswap_core::list::{Linked, Links};
use std::ptr;

/// Boxed entry callable, consumed on first run
pub(crate) type Entry = Box<dyn FnOnce(&Scheduler) + 'static>;

/// Result of one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captured {
    /// Bytes copied out of the shared stack
    pub bytes: usize,
    /// Whether the buffer had to be reallocated first
    pub reallocated: bool,
}

/// Saved copy of the shared-stack range `[low, high)`
#[derive(Default)]
pub struct StackImage {
    buffer: Box<[u8]>,
    low: usize,
    high: usize,
}

impl StackImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest saved address
    #[inline]
    pub fn low(&self) -> usize {
        self.low
    }

    /// One past the highest saved address (the engine's stack base)
    #[inline]
    pub fn high(&self) -> usize {
        self.high
    }

    /// Bytes currently covered by the image
    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.high - self.low
    }

    /// Allocated buffer size
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Copy `[sp, base)` into the buffer
    ///
    /// `low` only ever moves down: a later suspension from a shallower depth
    /// still saves the deepest range seen so far.
    ///
    /// # Safety
    ///
    /// `[min(low, sp), base)` must be readable and must not be the stack the
    /// caller is running on.
    pub unsafe fn capture(&mut self, sp: usize, base: usize) -> Result<Captured, MemoryError> {
        debug_assert!(sp < base, "suspension point above the stack base");

        // high == 0 means never captured
        self.low = if self.high == 0 { sp } else { self.low.min(sp) };
        self.high = base;

        let live = self.live_bytes();
        let reallocated = self.fit(live)?;
        ptr::copy_nonoverlapping(self.low as *const u8, self.buffer.as_mut_ptr(), live);

        Ok(Captured {
            bytes: live,
            reallocated,
        })
    }

    /// Copy the image back to `[low, high)`, returning the bytes written
    ///
    /// # Safety
    ///
    /// The target range must be writable and no live frame may occupy it.
    pub unsafe fn restore(&self) -> usize {
        let live = self.live_bytes();
        ptr::copy_nonoverlapping(self.buffer.as_ptr(), self.low as *mut u8, live);
        live
    }

    /// Resize the buffer to exactly `live` bytes when it is too small or
    /// more than twice too large
    fn fit(&mut self, live: usize) -> Result<bool, MemoryError> {
        let cap = self.capacity();
        if cap >= live && cap <= live.saturating_mul(2) {
            return Ok(false);
        }

        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(live)
            .map_err(|_| MemoryError::ImageAllocation { requested: live })?;
        fresh.resize(live, 0);
        self.buffer = fresh.into_boxed_slice();
        Ok(true)
    }
}

impl std::fmt::Debug for StackImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackImage")
            .field("low", &format_args!("{:#x}", self.low))
            .field("high", &format_args!("{:#x}", self.high))
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// One coroutine
pub(crate) struct Descriptor {
    pub image: StackImage,
    /// Saved stack pointer of the spilled register frame; `None` before the
    /// first switch away and while running
    pub continuation: Option<usize>,
    pub blocked: bool,
    pub links: Links,
    pub entry: Option<Entry>,
}

impl Descriptor {
    pub fn new(entry: Entry) -> Self {
        Self {
            image: StackImage::new(),
            continuation: None,
            blocked: false,
            links: Links::default(),
            entry: Some(entry),
        }
    }

    /// Never run yet
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.entry.is_some()
    }
}

impl Linked for Descriptor {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Heap buffer standing in for a region of the shared stack
    struct FakeStack {
        mem: Vec<u8>,
    }

    impl FakeStack {
        fn new(size: usize) -> Self {
            Self {
                mem: (0..size).map(|i| i as u8).collect(),
            }
        }

        fn base(&self) -> usize {
            self.mem.as_ptr() as usize + self.mem.len()
        }

        fn addr(&self, offset_from_base: usize) -> usize {
            self.base() - offset_from_base
        }
    }

    #[test]
    fn test_capture_restore_round_trip() {
        let mut stack = FakeStack::new(256);
        let base = stack.base();
        let sp = stack.addr(64);
        let expected = stack.mem[192..].to_vec();

        let mut image = StackImage::new();
        let captured = unsafe { image.capture(sp, base) }.unwrap();
        assert_eq!(captured.bytes, 64);
        assert!(captured.reallocated);
        assert_eq!(image.low(), sp);
        assert_eq!(image.high(), base);

        stack.mem[192..].fill(0);
        let written = unsafe { image.restore() };
        assert_eq!(written, 64);
        assert_eq!(&stack.mem[192..], &expected[..]);
    }

    #[test]
    fn test_low_only_grows() {
        let stack = FakeStack::new(512);
        let base = stack.base();
        let mut image = StackImage::new();

        unsafe { image.capture(stack.addr(200), base) }.unwrap();
        assert_eq!(image.live_bytes(), 200);

        // Shallower suspension keeps the deeper bound
        unsafe { image.capture(stack.addr(40), base) }.unwrap();
        assert_eq!(image.live_bytes(), 200);

        unsafe { image.capture(stack.addr(300), base) }.unwrap();
        assert_eq!(image.live_bytes(), 300);
    }

    #[test]
    fn test_growth_policy_hysteresis() {
        let mut image = StackImage::new();

        assert!(image.fit(100).unwrap());
        assert_eq!(image.capacity(), 100);

        // Within [live, 2 * live]: no reallocation
        assert!(!image.fit(100).unwrap());
        assert!(!image.fit(60).unwrap());
        assert!(!image.fit(50).unwrap());
        assert_eq!(image.capacity(), 100);

        // Shrink past half
        assert!(image.fit(49).unwrap());
        assert_eq!(image.capacity(), 49);

        // Growth past capacity
        assert!(image.fit(50).unwrap());
        assert_eq!(image.capacity(), 50);
    }

    #[test]
    fn test_descriptor_defaults() {
        let desc = Descriptor::new(Box::new(|_: &Scheduler| {}));
        assert!(desc.is_fresh());
        assert!(!desc.blocked);
        assert!(desc.continuation.is_none());
        assert_eq!(desc.image.capacity(), 0);
        assert_eq!(desc.links, Links::default());
    }
}
