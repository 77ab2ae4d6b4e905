//! System call handling module.
//!
//! User programs trap with the call number in the first register and up to
//! three arguments. Every failure is reported to the program as `-1`.
//! Calls that transfer control (execute, halt) or must wait (terminal and
//! RTC reads) return a [`SyscallAction`] that the trap glue carries out
//! once the kernel lock is released.

pub mod handlers;

use crate::arch::Platform;
use crate::config::{LARGE_PAGE_SIZE, PROGRAM_WINDOW};
use crate::error::{KResult, KernelError};
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::process::{ExitStatus, HaltOutcome, Launch};
use crate::scheduler::context::ResumePoint;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    /// Terminate the calling process.
    Halt = 1,
    /// Run a program and wait for it.
    Execute = 2,
    /// Read from a file descriptor.
    Read = 3,
    /// Write to a file descriptor.
    Write = 4,
    /// Open a file by name.
    Open = 5,
    /// Close a file descriptor.
    Close = 6,
    /// Copy the argument tail.
    GetArgs = 7,
    /// Map the video page into user space.
    Vidmap = 8,
    /// Install a signal handler (unsupported).
    SetHandler = 9,
    /// Return from a signal handler (unsupported).
    Sigreturn = 10,
}

impl TryFrom<u64> for SyscallNumber {
    type Error = KernelError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SyscallNumber::Halt),
            2 => Ok(SyscallNumber::Execute),
            3 => Ok(SyscallNumber::Read),
            4 => Ok(SyscallNumber::Write),
            5 => Ok(SyscallNumber::Open),
            6 => Ok(SyscallNumber::Close),
            7 => Ok(SyscallNumber::GetArgs),
            8 => Ok(SyscallNumber::Vidmap),
            9 => Ok(SyscallNumber::SetHandler),
            10 => Ok(SyscallNumber::Sigreturn),
            _ => Err(KernelError::Unsupported),
        }
    }
}

/// System call context (registers at syscall time).
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SyscallContext {
    /// System call number.
    pub syscall_num: u64,
    /// First argument.
    pub arg1: u64,
    /// Second argument.
    pub arg2: u64,
    /// Third argument.
    pub arg3: u64,
}

impl SyscallContext {
    pub const fn new(syscall_num: u64, arg1: u64, arg2: u64, arg3: u64) -> Self {
        Self {
            syscall_num,
            arg1,
            arg2,
            arg3,
        }
    }
}

/// What the trap glue does after a call.
#[derive(Debug)]
pub enum SyscallAction {
    /// Return this value to the caller.
    Return(i32),
    /// Enter a freshly launched program; its exit status becomes the
    /// caller's return value.
    Enter(Launch),
    /// The calling chain root exited; enter its replacement on a fresh
    /// kernel stack.
    Respawn(Launch),
    /// Resume a parent's suspended `execute` with `status`.
    Resume {
        context: ResumePoint,
        status: ExitStatus,
    },
    /// Wait with interrupts enabled, then issue the same call again.
    Retry,
    /// The caller is gone and nothing can replace it.
    Abort(KernelError),
}

/// Is `[addr, addr + len)` inside the program window?
pub fn check_user_range(addr: u32, len: usize) -> KResult<()> {
    let window_end = PROGRAM_WINDOW as u64 + LARGE_PAGE_SIZE as u64;
    let end = addr as u64 + len as u64;
    if (addr as u64) < PROGRAM_WINDOW as u64 || end > window_end {
        return Err(KernelError::InvalidArgument);
    }
    Ok(())
}

/// Access to the calling program's memory.
///
/// Implementations only see ranges that passed [`check_user_range`].
pub trait UserMemory {
    /// Bytes at `addr`.
    fn bytes(&self, addr: u32, len: usize) -> &[u8];

    /// Bytes at `addr`, writable.
    fn bytes_mut(&mut self, addr: u32, len: usize) -> &mut [u8];

    /// Validated read-only view.
    fn slice(&self, addr: u32, len: usize) -> KResult<&[u8]> {
        check_user_range(addr, len)?;
        Ok(self.bytes(addr, len))
    }

    /// Validated writable view.
    fn slice_mut(&mut self, addr: u32, len: usize) -> KResult<&mut [u8]> {
        check_user_range(addr, len)?;
        Ok(self.bytes_mut(addr, len))
    }

    /// NUL-terminated string of at most `max` bytes, clipped to the window.
    fn c_str(&self, addr: u32, max: usize) -> KResult<&[u8]> {
        let window_end = PROGRAM_WINDOW + LARGE_PAGE_SIZE;
        if addr < PROGRAM_WINDOW || addr >= window_end {
            return Err(KernelError::InvalidArgument);
        }
        let len = max.min((window_end - addr) as usize);
        let bytes = self.slice(addr, len)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(&bytes[..end])
    }
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Decode and run one system call on behalf of the current process.
    pub fn dispatch<M: UserMemory + ?Sized>(&mut self, ctx: &SyscallContext, mem: &mut M) -> SyscallAction {
        let syscall = match SyscallNumber::try_from(ctx.syscall_num) {
            Ok(syscall) => syscall,
            Err(_) => {
                log::debug!("[SYSCALL] unknown call {}", ctx.syscall_num);
                return SyscallAction::Return(-1);
            }
        };

        #[cfg(feature = "trace-syscalls")]
        log::trace!(
            "[SYSCALL] {:?}({:#x}, {:#x}, {:#x}) from {:?}",
            syscall,
            ctx.arg1,
            ctx.arg2,
            ctx.arg3,
            self.current()
        );

        match syscall {
            SyscallNumber::Halt => self.halt_action(ExitStatus::from(ctx.arg1 as u8)),
            SyscallNumber::Execute => match self.sys_execute(ctx.arg1 as u32, mem) {
                Ok(launch) => SyscallAction::Enter(launch),
                Err(err) => {
                    log::debug!("[SYSCALL] execute failed: {}", err);
                    SyscallAction::Return(-1)
                }
            },
            _ => to_action(handlers::handle(self, syscall, ctx, mem)),
        }
    }

    /// Halt the current process and translate the outcome for the glue.
    pub fn halt_action(&mut self, status: ExitStatus) -> SyscallAction {
        match self.halt(status) {
            Ok(HaltOutcome::Resume { context, status }) => SyscallAction::Resume { context, status },
            Ok(HaltOutcome::Respawn(launch)) => SyscallAction::Respawn(launch),
            Err(err) => {
                log::error!("[PROC] halt failed: {}", err);
                SyscallAction::Abort(err)
            }
        }
    }
}

fn to_action(result: KResult<i32>) -> SyscallAction {
    match result {
        Ok(value) => SyscallAction::Return(value),
        Err(KernelError::WouldBlock) => SyscallAction::Retry,
        Err(_) => SyscallAction::Return(-1),
    }
}
