//! System call gate (`int 0x80`).
//!
//! Register ABI: `rax` = call number, `rbx`/`rcx`/`rdx` = arguments,
//! result in `rax`. The stub saves every general-purpose register on the
//! process's kernel stack, so a call that blocks or switches away resumes
//! with the user registers intact.

use crate::config::{LARGE_PAGE_SIZE, PROGRAM_WINDOW};
use crate::syscall::{SyscallAction, SyscallContext, UserMemory};

use super::{interrupts, switch, KERNEL};

/// Registers pushed by [`entry`], lowest address first.
#[derive(Debug)]
#[repr(C)]
pub struct TrapRegisters {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
}

/// Trap stub installed at vector 0x80.
///
/// # Safety
///
/// Only reachable through the IDT.
#[unsafe(naked)]
pub unsafe extern "C" fn entry() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {dispatch}",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "iretq",
        dispatch = sym dispatch,
    );
}

/// The program window as mapped in the active page tables.
struct UserWindow;

impl UserMemory for UserWindow {
    fn bytes(&self, addr: u32, len: usize) -> &[u8] {
        debug_assert!(addr >= PROGRAM_WINDOW && addr as u64 + len as u64 <= (PROGRAM_WINDOW + LARGE_PAGE_SIZE) as u64);
        // SAFETY: the range was checked against the window, which the
        // program slot maps for the calling process.
        unsafe { core::slice::from_raw_parts(addr as usize as *const u8, len) }
    }

    fn bytes_mut(&mut self, addr: u32, len: usize) -> &mut [u8] {
        // SAFETY: as above.
        unsafe { core::slice::from_raw_parts_mut(addr as usize as *mut u8, len) }
    }
}

/// Run one system call and carry out the resulting action.
extern "C" fn dispatch(regs: &mut TrapRegisters) {
    let ctx = SyscallContext::new(regs.rax, regs.rbx, regs.rcx, regs.rdx);
    loop {
        let action = KERNEL
            .with(|kernel| kernel.dispatch(&ctx, &mut UserWindow))
            .unwrap_or(SyscallAction::Return(-1));

        match action {
            SyscallAction::Return(value) => {
                regs.rax = value as i64 as u64;
                return;
            }
            SyscallAction::Retry => {
                // Let the timer and the devices run, then ask again.
                x86_64::instructions::interrupts::enable_and_hlt();
                x86_64::instructions::interrupts::disable();
            }
            SyscallAction::Enter(launch) => {
                regs.rax = switch::run_child(&launch);
                return;
            }
            SyscallAction::Respawn(launch) => switch::enter_fresh(&launch),
            SyscallAction::Resume { context, status } => switch::resume_parent(context, status),
            SyscallAction::Abort(err) => {
                log::error!("[SYSCALL] unrecoverable: {}", err);
                interrupts::hlt_loop();
            }
        }
    }
}
