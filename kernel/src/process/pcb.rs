//! Process control blocks.
//!
//! Records live in a fixed arena indexed by pid; the run queue and the
//! parent links refer to records by pid, never by pointer.

use core::fmt;

use crate::config::{ARGS_LEN, MAX_NAME_LEN, MAX_PROCESSES};
use crate::error::{KResult, KernelError};
use crate::scheduler::context::{ResumePoint, SwitchContext, UserFrame};
use crate::terminal::TerminalId;

use super::files::FdTable;

/// Process ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u8);

impl Pid {
    /// Wrap a raw pid. Callers outside the table only use this for lookups.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Arena index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw value as used in address arithmetic.
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Eligible for the CPU
    Running,
    /// Waiting for a child to halt
    Sleeping,
    /// Blocked, wakes on signal
    Interruptible,
    /// Blocked, ignores signals
    Uninterruptible,
    /// Stopped
    Stopped,
    /// Halted, pid not yet reused
    Zombie,
}

/// Exit status delivered to the parent's `execute`.
///
/// Programs exit with an 8-bit code; the kernel reports faults with
/// [`ExitStatus::EXCEPTION`], which no program can produce itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(u32);

impl ExitStatus {
    /// Status of a process killed by a CPU fault.
    pub const EXCEPTION: ExitStatus = ExitStatus(crate::config::EXCEPTION_STATUS);

    /// Raw value placed in the parent's return register.
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl From<u8> for ExitStatus {
    fn from(code: u8) -> Self {
        ExitStatus(code as u32)
    }
}

/// Fixed-size, length-tracked byte string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedBytes<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedBytes<N> {
    /// Empty string.
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Copy `src`, failing if it does not fit.
    pub fn from_slice(src: &[u8]) -> KResult<Self> {
        if src.len() > N {
            return Err(KernelError::InvalidArgument);
        }
        let mut out = Self::new();
        out.bytes[..src.len()].copy_from_slice(src);
        out.len = src.len();
        Ok(out)
    }

    /// Stored bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// UTF-8 view for log lines.
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("?")
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Program name (at most 32 bytes).
pub type ProgramName = FixedBytes<MAX_NAME_LEN>;

/// Argument tail; one byte of the buffer is reserved for the terminator
/// user programs expect after `getargs`.
pub type ArgBuffer = FixedBytes<{ ARGS_LEN - 1 }>;

/// Process control block.
#[derive(Debug)]
pub struct ProcessRecord {
    /// Process ID
    pub pid: Pid,
    /// Terminal whose chain this process belongs to
    pub terminal: TerminalId,
    /// Scheduling state
    pub state: ProcessState,
    /// Process that executed this one on the same terminal
    pub parent: Option<Pid>,
    /// Program name
    pub name: ProgramName,
    /// Argument tail from the command line
    pub args: ArgBuffer,
    /// Where the creator's `execute` resumes once this process halts
    pub return_context: ResumePoint,
    /// Kernel stack captured by the preemption tick
    pub switch_context: SwitchContext,
    /// Open file slots (0 and 1 bound to the terminal)
    pub files: FdTable,
    /// User-mode entry not taken yet; set for shells spawned from the
    /// keyboard, which first run from the timer tick
    pub pending_entry: Option<UserFrame>,
}

impl ProcessRecord {
    /// Create a record with stdin/stdout open.
    pub fn new(
        pid: Pid,
        terminal: TerminalId,
        parent: Option<Pid>,
        name: ProgramName,
        args: ArgBuffer,
    ) -> Self {
        Self {
            pid,
            terminal,
            state: ProcessState::Running,
            parent,
            name,
            args,
            return_context: ResumePoint::empty(),
            switch_context: SwitchContext::default(),
            files: FdTable::with_stdio(),
            pending_entry: None,
        }
    }

    /// Is this record still scheduled (not yet halted)?
    pub fn is_live(&self) -> bool {
        self.state != ProcessState::Zombie
    }
}

/// Arena of process records, one slot per pid.
pub struct ProcessArena {
    slots: [Option<ProcessRecord>; MAX_PROCESSES],
}

impl ProcessArena {
    /// Empty arena.
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_PROCESSES],
        }
    }

    /// Place a record in its pid's slot, replacing any zombie left there.
    pub fn insert(&mut self, record: ProcessRecord) {
        let index = record.pid.index();
        self.slots[index] = Some(record);
    }

    /// Look up a record.
    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.slots.get(pid.index())?.as_ref()
    }

    /// Look up a record mutably.
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.slots.get_mut(pid.index())?.as_mut()
    }

    /// Look up a live (non-zombie) record.
    pub fn live(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.get(pid).filter(|r| r.is_live())
    }

    /// Set a record's state, if present.
    pub fn set_state(&mut self, pid: Pid, state: ProcessState) {
        if let Some(record) = self.get_mut(pid) {
            record.state = state;
        }
    }

    /// State of a record, if present.
    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.get(pid).map(|r| r.state)
    }

    /// Iterate over live records in pid order.
    pub fn iter_live(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.slots.iter().flatten().filter(|r| r.is_live())
    }
}

impl Default for ProcessArena {
    fn default() -> Self {
        Self::new()
    }
}
