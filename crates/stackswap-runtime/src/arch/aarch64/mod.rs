//! aarch64 context switching implementation (AAPCS64)
//!
//! Saved frame layout, from the saved stack pointer upward (160 bytes):
//!
//! ```text
//! sp + 0x00  d8,  d9
//! sp + 0x10  d10, d11
//! sp + 0x20  d12, d13
//! sp + 0x30  d14, d15
//! sp + 0x40  x19, x20
//! sp + 0x50  x21, x22
//! sp + 0x60  x23, x24
//! sp + 0x70  x25, x26
//! sp + 0x80  x27, x28
//! sp + 0x90  x29, x30 (frame pointer, return address)
//! ```

use super::{DispatchFn, EntryFn};
use std::arch::{asm, naked_asm};
use std::ffi::c_void;

/// Size of the frame written by `prepare_entry_frame`
pub const ENTRY_FRAME_SIZE: usize = 20 * 8;

/// Read the current stack pointer
#[inline(always)]
pub fn current_sp() -> usize {
    let sp: usize;
    unsafe {
        asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
    }
    sp
}

/// Suspend the current stack and run `dispatch` on `dispatch_top`
///
/// # Safety
///
/// Same contract as the x86_64 version: `dispatch_top` is the aligned top of
/// a separate mapped stack and `dispatch` returns a valid continuation.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_via(
    _arg: *mut c_void,
    _dispatch_top: usize,
    _dispatch: DispatchFn,
) {
    naked_asm!(
        "stp x29, x30, [sp, #-16]!",
        "stp x27, x28, [sp, #-16]!",
        "stp x25, x26, [sp, #-16]!",
        "stp x23, x24, [sp, #-16]!",
        "stp x21, x22, [sp, #-16]!",
        "stp x19, x20, [sp, #-16]!",
        "stp d14, d15, [sp, #-16]!",
        "stp d12, d13, [sp, #-16]!",
        "stp d10, d11, [sp, #-16]!",
        "stp d8, d9, [sp, #-16]!",
        // x0 = arg stays, x1 = saved sp, move onto the dispatch stack
        "mov x3, sp",
        "mov sp, x1",
        "mov x1, x3",
        "blr x2",
        // x0 = stack pointer to resume
        "mov sp, x0",
        "ldp d8, d9, [sp], #16",
        "ldp d10, d11, [sp], #16",
        "ldp d12, d13, [sp], #16",
        "ldp d14, d15, [sp], #16",
        "ldp x19, x20, [sp], #16",
        "ldp x21, x22, [sp], #16",
        "ldp x23, x24, [sp], #16",
        "ldp x25, x26, [sp], #16",
        "ldp x27, x28, [sp], #16",
        "ldp x29, x30, [sp], #16",
        "ret",
    );
}

/// Trampoline that calls the entry function with its argument
///
/// Entered through the `ret` of `switch_via` with x19 = entry, x20 = arg.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #0x1",
    );
}

/// Write a fresh-coroutine frame below `top`, returning its stack pointer
///
/// # Safety
///
/// `top` must be 16-byte aligned and the `ENTRY_FRAME_SIZE` bytes below it
/// must be writable and unused.
pub unsafe fn prepare_entry_frame(top: usize, entry: EntryFn, arg: usize) -> usize {
    debug_assert_eq!(top % 16, 0, "entry frame top must be 16-byte aligned");

    let sp = top - ENTRY_FRAME_SIZE;
    let frame = sp as *mut usize;
    for i in 0..20 {
        frame.add(i).write(0);
    }
    frame.add(8).write(entry as *const () as usize); // x19
    frame.add(9).write(arg); // x20
    frame.add(19).write(entry_trampoline as *const () as usize); // x30
    sp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_frame_layout() {
        extern "C" fn never(_: usize) -> ! {
            unreachable!()
        }

        let mut buf = [0usize; 32];
        let top = (buf.as_mut_ptr() as usize + buf.len() * 8) & !0xF;
        let sp = unsafe { prepare_entry_frame(top, never, 7) };

        assert_eq!(top - sp, ENTRY_FRAME_SIZE);
        assert_eq!(sp % 16, 0);
        let frame = unsafe { std::slice::from_raw_parts(sp as *const usize, 20) };
        assert_eq!(frame[8], never as *const () as usize);
        assert_eq!(frame[9], 7);
        assert_eq!(frame[18], 0);
    }
}
