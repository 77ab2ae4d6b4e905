//! Per-process file descriptor table.
//!
//! Eight slots per process. Slots 0 and 1 are bound to the controlling
//! terminal for the life of the process and can never be closed.

use core::fmt;

use crate::config::MAX_OPEN_FILES;
use crate::error::{KResult, KernelError};
use crate::fs::ops::{FileOps, TERMINAL_OPS};
use crate::fs::InodeId;

/// Standard input descriptor.
pub const STDIN_FD: usize = 0;

/// Standard output descriptor.
pub const STDOUT_FD: usize = 1;

/// First descriptor `open` may hand out.
pub const FIRST_USER_FD: usize = 2;

/// An open file.
#[derive(Clone, Copy)]
pub struct FileDescriptor {
    ops: &'static dyn FileOps,
    /// Backing inode for regular files.
    pub inode: Option<InodeId>,
    /// Read position: byte offset for files, entry index for the directory.
    pub position: u32,
    /// Interrupt count an RTC read is waiting past.
    pub wait_mark: Option<u64>,
}

impl FileDescriptor {
    pub fn new(ops: &'static dyn FileOps, inode: Option<InodeId>) -> Self {
        Self {
            ops,
            inode,
            position: 0,
            wait_mark: None,
        }
    }

    /// Operation table selected at open time.
    pub fn ops(&self) -> &'static dyn FileOps {
        self.ops
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("kind", &self.ops.kind())
            .field("inode", &self.inode)
            .field("position", &self.position)
            .field("wait_mark", &self.wait_mark)
            .finish()
    }
}

/// Descriptor slots of one process.
#[derive(Debug)]
pub struct FdTable {
    slots: [Option<FileDescriptor>; MAX_OPEN_FILES],
}

impl FdTable {
    /// Table with stdin and stdout bound to the terminal.
    pub fn with_stdio() -> Self {
        let mut slots = [None; MAX_OPEN_FILES];
        slots[STDIN_FD] = Some(FileDescriptor::new(&TERMINAL_OPS, None));
        slots[STDOUT_FD] = Some(FileDescriptor::new(&TERMINAL_OPS, None));
        Self { slots }
    }

    /// Place `file` in the lowest free slot.
    pub fn install(&mut self, file: FileDescriptor) -> KResult<usize> {
        let fd = (FIRST_USER_FD..MAX_OPEN_FILES)
            .find(|fd| self.slots[*fd].is_none())
            .ok_or(KernelError::ResourceExhausted)?;
        self.slots[fd] = Some(file);
        Ok(fd)
    }

    /// Open descriptor at `fd`.
    pub fn get(&self, fd: usize) -> KResult<&FileDescriptor> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(KernelError::InvalidDescriptor)
    }

    /// Open descriptor at `fd`, mutably.
    pub fn get_mut(&mut self, fd: usize) -> KResult<&mut FileDescriptor> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(KernelError::InvalidDescriptor)
    }

    /// Free a user slot. Slots 0/1 and unused slots are refused.
    pub fn remove(&mut self, fd: usize) -> KResult<FileDescriptor> {
        if fd < FIRST_USER_FD {
            return Err(KernelError::InvalidDescriptor);
        }
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(KernelError::InvalidDescriptor)
    }

    /// Empty every slot, stdio included, returning what was open.
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, FileDescriptor)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(fd, slot)| slot.take().map(|file| (fd, file)))
    }

    /// Number of open slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
