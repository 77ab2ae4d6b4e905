//! Process Table
//!
//! Pid allocation over the fixed pool of six slots. Allocation always hands
//! out the lowest free pid.

use crate::config::MAX_PROCESSES;
use crate::error::{KResult, KernelError};

use super::Pid;

/// Pid allocator.
#[derive(Debug)]
pub struct ProcessTable {
    in_use: [bool; MAX_PROCESSES],
}

impl ProcessTable {
    /// Table with every pid free.
    pub const fn new() -> Self {
        Self {
            in_use: [false; MAX_PROCESSES],
        }
    }

    /// Claim the lowest free pid.
    pub fn allocate(&mut self) -> KResult<Pid> {
        let index = self
            .in_use
            .iter()
            .position(|used| !used)
            .ok_or(KernelError::ResourceExhausted)?;
        self.in_use[index] = true;
        Ok(Pid::new(index as u8))
    }

    /// Return a pid to the pool.
    pub fn release(&mut self, pid: Pid) -> KResult<()> {
        let slot = self
            .in_use
            .get_mut(pid.index())
            .ok_or(KernelError::InvalidArgument)?;
        if !*slot {
            return Err(KernelError::DoubleFree);
        }
        *slot = false;
        Ok(())
    }

    /// Is `pid` currently allocated?
    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.in_use.get(pid.index()).copied().unwrap_or(false)
    }

    /// Number of allocated pids.
    pub fn allocated(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }

    /// Are all pids taken?
    pub fn is_full(&self) -> bool {
        self.allocated() == MAX_PROCESSES
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
