//! x86_64 context switching implementation (System V AMD64 ABI)
//!
//! Saved frame layout, from the saved stack pointer upward:
//!
//! ```text
//! sp + 0x00  r15
//! sp + 0x08  r14
//! sp + 0x10  r13
//! sp + 0x18  r12
//! sp + 0x20  rbx
//! sp + 0x28  rbp
//! sp + 0x30  return address
//! ```

use super::{DispatchFn, EntryFn};
use std::arch::{asm, naked_asm};
use std::ffi::c_void;

/// Size of the frame written by `prepare_entry_frame`
pub const ENTRY_FRAME_SIZE: usize = 7 * 8;

/// Read the current stack pointer
#[inline(always)]
pub fn current_sp() -> usize {
    let sp: usize;
    unsafe {
        asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags));
    }
    sp
}

/// Suspend the current stack and run `dispatch` on `dispatch_top`
///
/// # Safety
///
/// `dispatch_top` must be the 16-byte aligned top of a mapped stack that is
/// disjoint from the current one. `dispatch` must return either a stack
/// pointer previously passed to it as `saved_sp` (with the bytes above it
/// intact) or one produced by `prepare_entry_frame`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_via(
    _arg: *mut c_void,
    _dispatch_top: usize,
    _dispatch: DispatchFn,
) {
    naked_asm!(
        // Spill callee-saved registers onto the suspended stack
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        // rdi = arg stays, rsi = saved sp, move onto the dispatch stack
        "mov rax, rsp",
        "mov rsp, rsi",
        "mov rsi, rax",
        "call rdx",
        // rax = stack pointer to resume
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

/// Trampoline that calls the entry function with its argument
///
/// Entered through the `ret` of `switch_via` with r12 = entry, r13 = arg
/// and rsp 16-byte aligned.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
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

    // After the six pops and the ret, rsp == top, as at a call site
    let sp = top - ENTRY_FRAME_SIZE;
    let frame = sp as *mut usize;
    frame.add(0).write(0); // r15
    frame.add(1).write(0); // r14
    frame.add(2).write(arg); // r13
    frame.add(3).write(entry as *const () as usize); // r12
    frame.add(4).write(0); // rbx
    frame.add(5).write(0); // rbp, terminates frame-pointer walks
    frame.add(6).write(entry_trampoline as *const () as usize);
    sp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_sp_is_on_this_stack() {
        let marker = 0u8;
        let sp = current_sp();
        let addr = &marker as *const u8 as usize;
        // Within a few pages of a local of the same frame
        assert!(sp <= addr);
        assert!(addr - sp < 64 * 1024);
    }

    #[test]
    fn test_entry_frame_layout() {
        extern "C" fn never(_: usize) -> ! {
            unreachable!()
        }

        let mut buf = [0usize; 16];
        let top = (buf.as_mut_ptr() as usize + buf.len() * 8) & !0xF;
        let sp = unsafe { prepare_entry_frame(top, never, 0xABCD) };

        assert_eq!(top - sp, ENTRY_FRAME_SIZE);
        assert_eq!(sp % 16, 8);
        let frame = unsafe { std::slice::from_raw_parts(sp as *const usize, 7) };
        assert_eq!(frame[2], 0xABCD);
        assert_eq!(frame[3], never as *const () as usize);
        assert_eq!(frame[6], entry_trampoline as *const () as usize);
    }
}
