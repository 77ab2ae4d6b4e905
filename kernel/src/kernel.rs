//! The kernel object.
//!
//! All process-management state lives in one [`Kernel`] value: scheduler
//! bookkeeping, the address-space switcher, the terminals and the devices,
//! plus the platform and file system it drives. Every mutation goes through
//! its methods, so the whole core runs on the host against a mock platform.
//!
//! Operations are split by concern:
//! - [`crate::process::lifecycle`]: execute / halt / fault kill
//! - [`crate::scheduler::preempt`]: the timer tick
//! - [`crate::syscall::handlers`]: file and argument syscalls
//! - [`crate::terminal::input`]: line editing and terminal switching

use crate::arch::{Irq, Platform};
use crate::devices::RtcDevice;
use crate::fs::{FileSystem, IoContext};
use crate::memory::AddressSpaceSwitcher;
use crate::process::pcb::{ProcessRecord, ProcessState, ProgramName};
use crate::process::Pid;
use crate::scheduler::Scheduler;
use crate::terminal::{TerminalId, TerminalMux};

/// Process-management core bound to a platform and a file system.
pub struct Kernel<P: Platform, F: FileSystem> {
    pub(crate) platform: P,
    pub(crate) fs: F,
    pub(crate) sched: Scheduler,
    pub(crate) switcher: AddressSpaceSwitcher,
    pub(crate) terminals: TerminalMux,
    pub(crate) rtc: RtcDevice,
}

/// Summary of one live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub terminal: TerminalId,
    pub state: ProcessState,
    pub parent: Option<Pid>,
    pub name: ProgramName,
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Build the kernel and bring up the terminals. No process exists yet;
    /// the caller launches the first shell.
    pub fn new(platform: P, fs: F) -> Self {
        let mut kernel = Self {
            platform,
            fs,
            sched: Scheduler::new(),
            switcher: AddressSpaceSwitcher::new(),
            terminals: TerminalMux::new(),
            rtc: RtcDevice::new(),
        };
        kernel
            .terminals
            .init(&mut kernel.platform, &mut kernel.switcher);
        for irq in [Irq::Timer, Irq::Keyboard, Irq::Cascade, Irq::Rtc] {
            kernel.platform.enable_irq(irq);
        }
        log::info!("[KERNEL] process core initialized");
        kernel
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    pub fn switcher(&self) -> &AddressSpaceSwitcher {
        &self.switcher
    }

    pub fn terminals(&self) -> &TerminalMux {
        &self.terminals
    }

    pub fn rtc(&self) -> &RtcDevice {
        &self.rtc
    }

    /// Process owning the CPU.
    pub fn current(&self) -> Option<Pid> {
        self.sched.current()
    }

    /// Look up a process record, zombies included.
    pub fn process(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.sched.arena.get(pid)
    }

    /// Number of live processes.
    pub fn live_count(&self) -> usize {
        self.sched.live_count()
    }

    /// Snapshot of every live process, in pid order.
    pub fn processes(&self) -> impl Iterator<Item = ProcessInfo> + '_ {
        self.sched.arena.iter_live().map(|r| ProcessInfo {
            pid: r.pid,
            terminal: r.terminal,
            state: r.state,
            parent: r.parent,
            name: r.name,
        })
    }

    /// RTC periodic interrupt.
    pub fn rtc_interrupt(&mut self) {
        self.rtc.interrupt();
    }

    /// Acknowledge an interrupt line.
    pub fn end_of_interrupt(&mut self, irq: Irq) {
        self.platform.end_of_interrupt(irq);
    }

    /// Borrow the services a file operation needs.
    pub(crate) fn io_context(&mut self, terminal: TerminalId, fd: usize) -> IoContext<'_> {
        IoContext {
            platform: &mut self.platform,
            terminals: &mut self.terminals,
            fs: &self.fs,
            rtc: &mut self.rtc,
            terminal,
            fd,
        }
    }
}
