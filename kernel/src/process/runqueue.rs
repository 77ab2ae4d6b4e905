//! Round-robin run queue.
//!
//! Holds every live process across all terminals, in enrollment order.
//! Rotation visits all members, but only records in the `Running` state
//! receive CPU time; ancestors of a terminal's frontier process stay in the
//! queue while `Sleeping`.

use crate::config::MAX_PROCESSES;
use crate::error::{KResult, KernelError};

use super::pcb::{ProcessArena, ProcessState};
use super::Pid;

/// Ordered ring of pids plus the currently scheduled one.
#[derive(Debug)]
pub struct RunQueue {
    /// Queue members, head first.
    order: [Pid; MAX_PROCESSES],
    /// Number of members.
    len: usize,
    /// Process owning the CPU.
    current: Option<Pid>,
}

impl RunQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            order: [Pid::new(0); MAX_PROCESSES],
            len: 0,
            current: None,
        }
    }

    /// Append `pid` at the tail, mark it running, put its parent to sleep
    /// and make it current.
    pub fn enroll(&mut self, pid: Pid, arena: &mut ProcessArena) -> KResult<()> {
        if self.contains(pid) {
            return Err(KernelError::InvalidArgument);
        }
        if self.len == MAX_PROCESSES {
            return Err(KernelError::ResourceExhausted);
        }
        let parent = arena
            .get(pid)
            .ok_or(KernelError::InvalidArgument)?
            .parent;

        self.order[self.len] = pid;
        self.len += 1;

        arena.set_state(pid, ProcessState::Running);
        if let Some(parent) = parent {
            arena.set_state(parent, ProcessState::Sleeping);
        }
        self.current = Some(pid);
        Ok(())
    }

    /// Unlink `pid`, mark it a zombie and pick the next current process:
    /// the parent if it has one, else the head, else nothing.
    pub fn retire(&mut self, pid: Pid, arena: &mut ProcessArena) -> KResult<()> {
        let position = self
            .position(pid)
            .ok_or(KernelError::InvalidArgument)?;

        self.order.copy_within(position + 1..self.len, position);
        self.len -= 1;

        arena.set_state(pid, ProcessState::Zombie);

        let parent = arena
            .get(pid)
            .and_then(|r| r.parent)
            .filter(|parent| arena.live(*parent).is_some());

        self.current = match parent {
            Some(parent) => {
                arena.set_state(parent, ProcessState::Running);
                Some(parent)
            }
            None => self.head(),
        };
        Ok(())
    }

    /// Move the head to the tail. No-op with fewer than two members.
    pub fn rotate(&mut self) {
        if self.len > 1 {
            self.order[..self.len].rotate_left(1);
        }
    }

    /// First member.
    pub fn head(&self) -> Option<Pid> {
        self.as_slice().first().copied()
    }

    /// Process owning the CPU.
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Designate the process owning the CPU.
    pub fn set_current(&mut self, pid: Pid) {
        self.current = Some(pid);
    }

    /// Members, head first.
    pub fn as_slice(&self) -> &[Pid] {
        &self.order[..self.len]
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.position(pid).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn position(&self, pid: Pid) -> Option<usize> {
        self.as_slice().iter().position(|p| *p == pid)
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}
