//! System call handlers.
//!
//! This module implements the handlers for each system call that returns
//! directly to its caller.

use super::{SyscallContext, SyscallNumber, UserMemory};
use crate::arch::Platform;
use crate::config::{ARGS_LEN, MAX_NAME_LEN, VIDMAP_ADDR};
use crate::error::{KResult, KernelError};
use crate::fs::ops::ops_for;
use crate::fs::{FileSystem, FileType};
use crate::kernel::Kernel;
use crate::process::{FileDescriptor, Launch};

/// Longest command line `execute` reads from user memory.
const MAX_COMMAND_LEN: usize = MAX_NAME_LEN + 1 + ARGS_LEN;

/// Handle a system call.
pub fn handle<P, F, M>(
    kernel: &mut Kernel<P, F>,
    syscall: SyscallNumber,
    ctx: &SyscallContext,
    mem: &mut M,
) -> KResult<i32>
where
    P: Platform,
    F: FileSystem,
    M: UserMemory + ?Sized,
{
    let fd = ctx.arg1 as usize;
    match syscall {
        SyscallNumber::Read => {
            let buf = mem.slice_mut(ctx.arg2 as u32, ctx.arg3 as usize)?;
            kernel.sys_read(fd, buf).map(|n| n as i32)
        }
        SyscallNumber::Write => {
            let buf = mem.slice(ctx.arg2 as u32, ctx.arg3 as usize)?;
            kernel.sys_write(fd, buf).map(|n| n as i32)
        }
        SyscallNumber::Open => {
            let name = mem.c_str(ctx.arg1 as u32, MAX_NAME_LEN + 1)?;
            kernel.sys_open(name).map(|fd| fd as i32)
        }
        SyscallNumber::Close => kernel.sys_close(fd).map(|()| 0),
        SyscallNumber::GetArgs => kernel.sys_getargs(ctx.arg1 as u32, ctx.arg2 as usize, mem).map(|()| 0),
        SyscallNumber::Vidmap => kernel.sys_vidmap(ctx.arg1 as u32, mem).map(|addr| addr as i32),
        SyscallNumber::SetHandler | SyscallNumber::Sigreturn => Err(KernelError::Unsupported),
        // Control-transfer calls are decoded by the dispatcher.
        SyscallNumber::Halt | SyscallNumber::Execute => Err(KernelError::InvalidArgument),
    }
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Launch the command at `command_addr` on the caller's terminal.
    pub fn sys_execute<M: UserMemory + ?Sized>(&mut self, command_addr: u32, mem: &M) -> KResult<Launch> {
        let terminal = self.sched.current_record()?.terminal;
        // Loading rebinds the program window, so the line must be copied out first.
        let mut line = [0u8; MAX_COMMAND_LEN];
        let command = mem.c_str(command_addr, MAX_COMMAND_LEN + 1)?;
        if command.len() > MAX_COMMAND_LEN {
            return Err(KernelError::MalformedCommand);
        }
        line[..command.len()].copy_from_slice(command);
        self.launch(&line[..command.len()], terminal)
    }

    /// Read through the descriptor's operation table.
    pub fn sys_read(&mut self, fd: usize, buf: &mut [u8]) -> KResult<usize> {
        let (terminal, mut file) = self.open_file(fd)?;
        let result = {
            let mut io = self.io_context(terminal, fd);
            file.ops().read(&mut io, &mut file, buf)
        };
        // Persist the position and wait mark even when the read must retry.
        *self.sched.current_record_mut()?.files.get_mut(fd)? = file;
        result
    }

    /// Write through the descriptor's operation table.
    pub fn sys_write(&mut self, fd: usize, buf: &[u8]) -> KResult<usize> {
        let (terminal, mut file) = self.open_file(fd)?;
        let mut io = self.io_context(terminal, fd);
        file.ops().write(&mut io, &mut file, buf)
    }

    /// Open `name` in the lowest free descriptor slot.
    pub fn sys_open(&mut self, name: &[u8]) -> KResult<usize> {
        let entry = self.fs.lookup(name)?;
        let ops = ops_for(entry.file_type);
        let inode = (entry.file_type == FileType::Regular).then_some(entry.inode);

        let record = self.sched.current_record_mut()?;
        let terminal = record.terminal;
        let fd = record.files.install(FileDescriptor::new(ops, inode))?;

        let mut io = self.io_context(terminal, fd);
        if let Err(err) = ops.open(&mut io) {
            self.sched.current_record_mut()?.files.remove(fd)?;
            return Err(err);
        }
        log::debug!("[FS] opened {:?} as fd {}", ops.kind(), fd);
        Ok(fd)
    }

    /// Close a user descriptor. Stdin and stdout cannot be closed.
    pub fn sys_close(&mut self, fd: usize) -> KResult<()> {
        let record = self.sched.current_record_mut()?;
        let terminal = record.terminal;
        let file = record.files.remove(fd)?;
        let mut io = self.io_context(terminal, fd);
        file.ops().close(&mut io)
    }

    /// Copy the argument tail and its terminator to `buf_addr`.
    ///
    /// Fails when there are no arguments or they do not fit in `n` bytes.
    pub fn sys_getargs<M: UserMemory + ?Sized>(&mut self, buf_addr: u32, n: usize, mem: &mut M) -> KResult<()> {
        let args = self.sched.current_record()?.args;
        if args.is_empty() || args.len() + 1 > n {
            return Err(KernelError::InvalidArgument);
        }
        let out = mem.slice_mut(buf_addr, args.len() + 1)?;
        out[..args.len()].copy_from_slice(args.as_bytes());
        out[args.len()] = 0;
        Ok(())
    }

    /// Expose the caller's terminal video page at [`VIDMAP_ADDR`] and
    /// store that address at `out_addr`.
    pub fn sys_vidmap<M: UserMemory + ?Sized>(&mut self, out_addr: u32, mem: &mut M) -> KResult<u32> {
        let out = mem.slice_mut(out_addr, 4)?;
        let terminal = self.sched.current_record()?.terminal;
        let live = self.terminals.is_foreground(terminal);
        self.switcher.bind_video(&mut self.platform, terminal, live);
        self.switcher.flush(&mut self.platform);
        out.copy_from_slice(&VIDMAP_ADDR.to_le_bytes());
        Ok(VIDMAP_ADDR)
    }

    /// Caller's terminal and a copy of its descriptor at `fd`.
    fn open_file(&self, fd: usize) -> KResult<(crate::terminal::TerminalId, FileDescriptor)> {
        let record = self.sched.current_record()?;
        Ok((record.terminal, *record.files.get(fd)?))
    }
}
