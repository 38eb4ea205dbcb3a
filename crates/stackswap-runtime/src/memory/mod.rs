//! Memory for the engine's private dispatch stack
//!
//! Platform-specific implementations handle the virtual memory mapping.
//! Coroutine stacks themselves are never mapped: they live as heap images
//! and are copied in and out of the native stack.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}

use stackswap_core::constants::STACK_ALIGN;

/// Round `value` down to a multiple of `align` (a power of two)
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

/// Round `value` up to a multiple of `align` (a power of two)
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Round a stack address down to the ABI stack alignment
#[inline]
pub const fn align_stack(addr: usize) -> usize {
    align_down(addr, STACK_ALIGN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_helpers() {
        assert_eq!(align_down(0x1234, 16), 0x1230);
        assert_eq!(align_up(0x1231, 16), 0x1240);
        assert_eq!(align_up(0x1240, 16), 0x1240);
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_stack(0x7fff_0000_000f), 0x7fff_0000_0000);
    }
}
