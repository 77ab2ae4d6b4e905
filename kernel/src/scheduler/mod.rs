//! Kernel scheduler module.
//!
//! Bookkeeping for every live process: the pid table, the record arena,
//! the round-robin run queue and each terminal's frontier (the most
//! recently executed process of its chain, the only one allowed to run).
//! The preemption tick itself is in [`preempt`].

pub mod context;
pub mod preempt;

pub use context::{ResumePoint, SwitchContext, UserFrame};
pub use preempt::SwitchPlan;

use crate::config::NUM_TERMINALS;
use crate::error::{KResult, KernelError};
use crate::process::pcb::{ProcessArena, ProcessRecord};
use crate::process::{Pid, ProcessTable, RunQueue};
use crate::terminal::TerminalId;

/// Process bookkeeping shared by execute, halt and the tick.
#[derive(Default)]
pub struct Scheduler {
    pub table: ProcessTable,
    pub arena: ProcessArena,
    pub queue: RunQueue,
    /// Frontier process of each terminal.
    frontier: [Option<Pid>; NUM_TERMINALS],
    /// Processes executed and not yet halted.
    live: usize,
    /// Timer ticks seen.
    ticks: u64,
    /// Ticks that handed the CPU to a different process.
    switches: u64,
    /// The last tick found no runnable member.
    stalled: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            table: ProcessTable::new(),
            arena: ProcessArena::new(),
            queue: RunQueue::new(),
            frontier: [None; NUM_TERMINALS],
            live: 0,
            ticks: 0,
            switches: 0,
            stalled: false,
        }
    }

    /// Process owning the CPU.
    pub fn current(&self) -> Option<Pid> {
        self.queue.current()
    }

    /// Record of the process owning the CPU.
    pub fn current_record(&self) -> KResult<&ProcessRecord> {
        let pid = self.current().ok_or(KernelError::NoCurrentProcess)?;
        self.arena.live(pid).ok_or(KernelError::NoCurrentProcess)
    }

    /// Record of the process owning the CPU, mutably.
    pub fn current_record_mut(&mut self) -> KResult<&mut ProcessRecord> {
        let pid = self.current().ok_or(KernelError::NoCurrentProcess)?;
        self.arena
            .get_mut(pid)
            .filter(|r| r.is_live())
            .ok_or(KernelError::NoCurrentProcess)
    }

    /// Frontier process of a terminal.
    pub fn frontier(&self, terminal: TerminalId) -> Option<Pid> {
        self.frontier[terminal.index()]
    }

    pub(crate) fn set_frontier(&mut self, terminal: TerminalId, pid: Option<Pid>) {
        self.frontier[terminal.index()] = pid;
    }

    /// Number of live processes.
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub(crate) fn process_started(&mut self) {
        self.live += 1;
    }

    pub(crate) fn process_ended(&mut self) {
        self.live = self.live.saturating_sub(1);
    }

    /// Timer ticks seen so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks that switched to another process.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Whether the run queue currently has no runnable member.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Record the stall state; returns `true` when it changed.
    pub(crate) fn set_stalled(&mut self, stalled: bool) -> bool {
        core::mem::replace(&mut self.stalled, stalled) != stalled
    }

    pub(crate) fn count_tick(&mut self, switched: bool) {
        self.ticks += 1;
        if switched {
            self.switches += 1;
        }
    }
}
