//! Preemption tick.
//!
//! Called from the timer interrupt with the kernel locked. All bookkeeping
//! and every address-space and kernel-stack rewrite happen here, before the
//! stack swap; the interrupt glue performs the swap itself once the lock is
//! released, using the context pointers in the returned [`SwitchPlan`].

use crate::arch::{Irq, Platform};
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::memory::kernel_stack_top;
use crate::process::{Pid, ProcessState};

use super::context::SwitchContext;

/// A context switch decided by the tick, to be carried out by the glue.
#[derive(Debug)]
pub struct SwitchPlan {
    /// Process losing the CPU.
    pub from: Pid,
    /// Process gaining the CPU.
    pub to: Pid,
    save: *mut SwitchContext,
    load: *const SwitchContext,
}

impl SwitchPlan {
    /// Where the outgoing stack pointer pair is saved.
    pub fn save_ptr(&self) -> *mut SwitchContext {
        self.save
    }

    /// Context the incoming process resumes from.
    pub fn load_ptr(&self) -> *const SwitchContext {
        self.load
    }
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// One timer tick: pick the next process, make its address space live
    /// and acknowledge the timer.
    ///
    /// The acknowledgement is sent before the swap; interrupts stay masked
    /// until the incoming process returns to user mode.
    pub fn tick(&mut self) -> Option<SwitchPlan> {
        let plan = self.prepare_switch();
        self.platform.end_of_interrupt(Irq::Timer);
        plan
    }

    /// Rotate the run queue to the next `Running` process and rebind the
    /// program slot, video slot and kernel stack for it.
    ///
    /// Returns `None` when nothing is scheduled, when no member is
    /// runnable, or when the current process keeps the CPU.
    pub fn prepare_switch(&mut self) -> Option<SwitchPlan> {
        let current = self.sched.current()?;
        if self.sched.queue.is_empty() {
            return None;
        }
        let next = self.next_runnable()?;

        let outgoing = self.sched.arena.get(current)?.terminal;
        let incoming = self.sched.arena.get(next)?.terminal;

        // Every table keeps its terminal's target: live for the foreground,
        // back-buffer otherwise.
        if outgoing != incoming {
            let live = self.terminals.is_foreground(outgoing);
            self.switcher.set_video_target(&mut self.platform, outgoing, live);
        }
        let live = self.terminals.is_foreground(incoming);
        self.switcher.bind_video(&mut self.platform, incoming, live);
        self.switcher.bind_program(&mut self.platform, next);
        self.platform.set_kernel_stack(kernel_stack_top(next));

        self.sched.queue.set_current(next);
        let switched = next != current;
        self.sched.count_tick(switched);
        if !switched {
            return None;
        }

        log::trace!("[SCHED] {} -> {}", current, next);
        let save = &mut self.sched.arena.get_mut(current)?.switch_context as *mut SwitchContext;
        let load = &self.sched.arena.get(next)?.switch_context as *const SwitchContext;
        Some(SwitchPlan {
            from: current,
            to: next,
            save,
            load,
        })
    }

    /// Rotate until the head is runnable, giving up after a full lap.
    fn next_runnable(&mut self) -> Option<Pid> {
        let len = self.sched.queue.len();
        for _ in 0..len {
            self.sched.queue.rotate();
            let head = self.sched.queue.head()?;
            if self.sched.arena.state(head) == Some(ProcessState::Running) {
                if self.sched.set_stalled(false) {
                    log::info!("[SCHED] runnable again: {}", head);
                }
                return Some(head);
            }
        }
        // Only the transition is logged; the state persists across ticks.
        if self.sched.set_stalled(true) {
            log::warn!("[SCHED] no runnable process among {}", len);
        }
        None
    }
}
