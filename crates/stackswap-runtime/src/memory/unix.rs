//! Unix dispatch stack implementation using mmap

use super::{align_stack, align_up};
use stackswap_core::constants::GUARD_SIZE;
use stackswap_core::error::{EngineResult, MemoryError};

/// System page size, falling back to the guard size if sysconf fails
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        GUARD_SIZE
    }
}

/// A private mmap'ed stack used only while saving and restoring images
///
/// Layout (stack grows down):
///
/// ```text
/// base                base + guard                          base + total
/// | guard (PROT_NONE) | usable (PROT_READ | PROT_WRITE) ... | <- top()
/// ```
pub struct DispatchStack {
    base: *mut u8,
    total: usize,
    guard: usize,
}

impl DispatchStack {
    /// Map a dispatch stack with at least `size` usable bytes
    pub fn new(size: usize) -> EngineResult<Self> {
        let page = page_size();
        let guard = align_up(GUARD_SIZE, page);
        let total = align_up(size, page)
            .checked_add(guard)
            .ok_or(MemoryError::MapFailed { size })?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::MapFailed { size: total }.into());
        }

        // Guard page at the low end turns dispatch-stack overflow into SIGSEGV
        let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
        if ret != 0 {
            unsafe {
                libc::munmap(base, total);
            }
            return Err(MemoryError::ProtectionFailed.into());
        }

        Ok(Self {
            base: base as *mut u8,
            total,
            guard,
        })
    }

    /// Highest usable address, aligned for a call
    #[inline]
    pub fn top(&self) -> usize {
        align_stack(self.base as usize + self.total)
    }

    /// Lowest usable address (just above the guard page)
    #[inline]
    pub fn bottom(&self) -> usize {
        self.base as usize + self.guard
    }

    /// Usable bytes
    #[inline]
    pub fn usable(&self) -> usize {
        self.total - self.guard
    }
}

impl Drop for DispatchStack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total);
        }
    }
}

impl std::fmt::Debug for DispatchStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchStack")
            .field("bottom", &format_args!("{:#x}", self.bottom()))
            .field("top", &format_args!("{:#x}", self.top()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_stack_bounds() {
        let stack = DispatchStack::new(64 * 1024).unwrap();
        assert_eq!(stack.top() % 16, 0);
        assert!(stack.usable() >= 64 * 1024);
        assert_eq!(stack.top() - stack.bottom(), stack.usable());
    }

    #[test]
    fn test_dispatch_stack_is_writable() {
        let stack = DispatchStack::new(8 * 1024).unwrap();
        let lo = stack.bottom() as *mut u8;
        let hi = (stack.top() - 1) as *mut u8;
        unsafe {
            lo.write(0xAA);
            hi.write(0x55);
            assert_eq!(lo.read(), 0xAA);
            assert_eq!(hi.read(), 0x55);
        }
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(page_size().is_power_of_two());
    }
}
