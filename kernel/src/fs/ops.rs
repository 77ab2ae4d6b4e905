//! File operation tables.
//!
//! Every open descriptor carries one of four static tables, chosen at
//! `open` time from the directory entry's type tag. Stdin and stdout share
//! the terminal table.

use crate::arch::Platform;
use crate::devices::RtcDevice;
use crate::error::{KResult, KernelError};
use crate::process::files::{FileDescriptor, STDIN_FD, STDOUT_FD};
use crate::terminal::{TerminalId, TerminalMux};

use super::{FileSystem, FileType};

/// Which table a descriptor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Terminal,
    Rtc,
    Directory,
    Regular,
}

/// Kernel services available to a file operation.
pub struct IoContext<'a> {
    pub platform: &'a mut dyn Platform,
    pub terminals: &'a mut TerminalMux,
    pub fs: &'a dyn FileSystem,
    pub rtc: &'a mut RtcDevice,
    /// Terminal of the calling process.
    pub terminal: TerminalId,
    /// Descriptor number the call was made on.
    pub fd: usize,
}

/// Per-file-type operations.
pub trait FileOps: Sync {
    fn kind(&self) -> FileKind;

    fn open(&self, _ctx: &mut IoContext<'_>) -> KResult<()> {
        Ok(())
    }

    fn read(&self, ctx: &mut IoContext<'_>, file: &mut FileDescriptor, buf: &mut [u8]) -> KResult<usize>;

    fn write(&self, ctx: &mut IoContext<'_>, file: &mut FileDescriptor, buf: &[u8]) -> KResult<usize>;

    fn close(&self, _ctx: &mut IoContext<'_>) -> KResult<()> {
        Ok(())
    }
}

/// Table for a directory entry type.
pub fn ops_for(file_type: FileType) -> &'static dyn FileOps {
    match file_type {
        FileType::Rtc => &RTC_OPS,
        FileType::Directory => &DIRECTORY_OPS,
        FileType::Regular => &REGULAR_OPS,
    }
}

// ========================================
// Terminal
// ========================================

/// Line-buffered keyboard input on fd 0, screen output on fd 1.
pub struct TerminalOps;

pub static TERMINAL_OPS: TerminalOps = TerminalOps;

impl FileOps for TerminalOps {
    fn kind(&self) -> FileKind {
        FileKind::Terminal
    }

    fn read(&self, ctx: &mut IoContext<'_>, _file: &mut FileDescriptor, buf: &mut [u8]) -> KResult<usize> {
        if ctx.fd != STDIN_FD {
            return Err(KernelError::InvalidDescriptor);
        }
        ctx.terminals.read_line(ctx.terminal, buf)
    }

    fn write(&self, ctx: &mut IoContext<'_>, _file: &mut FileDescriptor, buf: &[u8]) -> KResult<usize> {
        if ctx.fd != STDOUT_FD {
            return Err(KernelError::InvalidDescriptor);
        }
        Ok(ctx.terminals.write(&mut *ctx.platform, ctx.terminal, buf))
    }

    fn close(&self, _ctx: &mut IoContext<'_>) -> KResult<()> {
        Err(KernelError::InvalidDescriptor)
    }
}

// ========================================
// RTC
// ========================================

/// Periodic interrupt device.
pub struct RtcOps;

pub static RTC_OPS: RtcOps = RtcOps;

impl FileOps for RtcOps {
    fn kind(&self) -> FileKind {
        FileKind::Rtc
    }

    fn open(&self, ctx: &mut IoContext<'_>) -> KResult<()> {
        ctx.rtc.open(&mut *ctx.platform)
    }

    fn read(&self, ctx: &mut IoContext<'_>, file: &mut FileDescriptor, _buf: &mut [u8]) -> KResult<usize> {
        ctx.rtc.poll_read(&mut file.wait_mark).map(|()| 0)
    }

    /// Expects exactly a 4-byte little-endian frequency in Hz.
    fn write(&self, ctx: &mut IoContext<'_>, _file: &mut FileDescriptor, buf: &[u8]) -> KResult<usize> {
        let bytes: [u8; 4] = buf.try_into().map_err(|_| KernelError::InvalidArgument)?;
        ctx.rtc.set_frequency(&mut *ctx.platform, u32::from_le_bytes(bytes))?;
        Ok(0)
    }
}

// ========================================
// Directory
// ========================================

/// Each read yields the next file name; 0 bytes once all are listed.
pub struct DirectoryOps;

pub static DIRECTORY_OPS: DirectoryOps = DirectoryOps;

impl FileOps for DirectoryOps {
    fn kind(&self) -> FileKind {
        FileKind::Directory
    }

    fn read(&self, ctx: &mut IoContext<'_>, file: &mut FileDescriptor, buf: &mut [u8]) -> KResult<usize> {
        let Some(entry) = ctx.fs.entry_at(file.position as usize) else {
            return Ok(0);
        };
        let name = entry.name();
        let n = name.len().min(buf.len());
        buf[..n].copy_from_slice(&name[..n]);
        file.position += 1;
        Ok(n)
    }

    fn write(&self, _ctx: &mut IoContext<'_>, _file: &mut FileDescriptor, _buf: &[u8]) -> KResult<usize> {
        Err(KernelError::Unsupported)
    }
}

// ========================================
// Regular file
// ========================================

/// Sequential reads from the descriptor's position.
pub struct RegularOps;

pub static REGULAR_OPS: RegularOps = RegularOps;

impl FileOps for RegularOps {
    fn kind(&self) -> FileKind {
        FileKind::Regular
    }

    fn read(&self, ctx: &mut IoContext<'_>, file: &mut FileDescriptor, buf: &mut [u8]) -> KResult<usize> {
        let inode = file.inode.ok_or(KernelError::InvalidDescriptor)?;
        let n = ctx.fs.read(inode, file.position, buf)?;
        file.position += n as u32;
        Ok(n)
    }

    fn write(&self, _ctx: &mut IoContext<'_>, _file: &mut FileDescriptor, _buf: &[u8]) -> KResult<usize> {
        Err(KernelError::Unsupported)
    }
}
