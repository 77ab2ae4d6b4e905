//! Stack switching and privilege transitions.
//!
//! The only code that moves the stack pointer between processes or drops
//! to ring 3. Everything here runs with interrupts masked and without the
//! kernel lock held.
//!
//! Three ways a process starts or continues running:
//! - [`switch_context`]: the timer hands the CPU to another process.
//! - [`enter_user`]: `execute` drops into a new program and, when that
//!   program halts, returns its status through [`resume_parent`].
//! - [`enter_on_stack`]: a replacement root shell starts on its own kernel
//!   stack, abandoning the stack of the shell it replaces.

use crate::memory::kernel_stack_top;
use crate::process::{ExitStatus, Launch};
use crate::scheduler::{ResumePoint, SwitchContext, UserFrame};

use super::{gdt, interrupts, phys_to_virt, KERNEL};

/// `iretq` frame for the first instruction of a program.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct UserEntry {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl UserEntry {
    pub fn new(frame: &UserFrame) -> Self {
        Self {
            rip: frame.entry as u64,
            cs: gdt::user_code_selector().0 as u64,
            rflags: frame.rflags,
            rsp: frame.stack_top as u64,
            ss: gdt::user_data_selector().0 as u64,
        }
    }
}

/// Save the callee-saved registers into `save` and continue from `load`.
///
/// Returns when some later switch loads `save` again.
///
/// # Safety
///
/// Both pointers must reference live contexts; `load` must have been
/// filled by this function or by the platform's initial context.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(save: *mut SwitchContext, load: *const SwitchContext) {
    core::arch::naked_asm!(
        "mov [rdi + 0x00], r15",
        "mov [rdi + 0x08], r14",
        "mov [rdi + 0x10], r13",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], rbx",
        "mov [rdi + 0x28], rbp",
        "mov [rdi + 0x30], rsp",
        "lea rax, [rip + 2f]",
        "mov [rdi + 0x38], rax",
        "mov r15, [rsi + 0x00]",
        "mov r14, [rsi + 0x08]",
        "mov r13, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov rbx, [rsi + 0x20]",
        "mov rbp, [rsi + 0x28]",
        "mov rsp, [rsi + 0x30]",
        "jmp qword ptr [rsi + 0x38]",
        "2:",
        "ret",
    );
}

/// Record the caller's stack in `resume` and drop to ring 3 at `entry`.
///
/// Returns the program's exit status once [`resume_parent`] loads `resume`.
///
/// # Safety
///
/// The program slot must be bound to the launched process and `resume`
/// must point into its record.
#[unsafe(naked)]
pub unsafe extern "C" fn enter_user(resume: *mut ResumePoint, entry: *const UserEntry) -> u64 {
    core::arch::naked_asm!(
        "push rbx",
        "push rbp",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "push qword ptr [rsi + 0x20]",
        "push qword ptr [rsi + 0x18]",
        "push qword ptr [rsi + 0x10]",
        "push qword ptr [rsi + 0x08]",
        "push qword ptr [rsi + 0x00]",
        "iretq",
    );
}

/// Unwind to a suspended [`enter_user`] and make it return `status`.
#[unsafe(naked)]
unsafe extern "C" fn resume_at(rsp: u64, rbp: u64, status: u64) -> ! {
    core::arch::naked_asm!(
        "mov rsp, rdi",
        "mov rbp, rsi",
        "mov rax, rdx",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbp",
        "pop rbx",
        "ret",
    );
}

/// Switch to `stack_top` and drop to ring 3; nothing on the old stack survives.
#[unsafe(naked)]
unsafe extern "C" fn enter_on_stack(stack_top: u64, rip: u64, cs: u64, rflags: u64, rsp: u64, ss: u64) -> ! {
    core::arch::naked_asm!(
        "mov rsp, rdi",
        "push r9",
        "push r8",
        "push rcx",
        "push rdx",
        "push rsi",
        "iretq",
    );
}

/// Return `status` from the parent's `execute`.
pub fn resume_parent(context: ResumePoint, status: ExitStatus) -> ! {
    if !context.is_captured() {
        log::error!("[PROC] parent has no resume point");
        interrupts::hlt_loop();
    }
    // SAFETY: the point was captured by enter_user on the parent's kernel
    // stack, which halt left untouched and bound.
    unsafe { resume_at(context.rsp, context.rbp, status.code() as u64) }
}

/// Start a replacement root shell on its own kernel stack.
pub fn enter_fresh(launch: &Launch) -> ! {
    let entry = UserEntry::new(&launch.frame);
    let stack = phys_to_virt(kernel_stack_top(launch.pid));
    // SAFETY: launch bound the program slot and kernel stack to this pid.
    unsafe { enter_on_stack(stack, entry.rip, entry.cs, entry.rflags, entry.rsp, entry.ss) }
}

/// Drop into a program started by `execute` and wait for its status.
pub fn run_child(launch: &Launch) -> u64 {
    let entry = UserEntry::new(&launch.frame);
    // SAFETY: launch bound the program slot; resume_ptr is in its record.
    unsafe { enter_user(launch.resume_ptr(), &entry) }
}

/// First code a spawned shell runs, reached through its initial context.
pub extern "C" fn first_run() -> ! {
    match KERNEL.with(|kernel| kernel.take_pending_entry()).flatten() {
        Some((frame, resume)) => {
            let entry = UserEntry::new(&frame);
            // SAFETY: the tick bound this process's address space and stack.
            unsafe { enter_user(resume, &entry) };
            // A root shell's resume point is never loaded.
            interrupts::hlt_loop()
        }
        None => {
            log::error!("[SCHED] first run without a pending entry");
            interrupts::hlt_loop()
        }
    }
}
