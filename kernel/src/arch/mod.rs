//! Architecture abstraction.
//!
//! The process-management core never touches hardware directly. Every
//! privileged effect (paging writes, TLB flush, kernel stack for ring
//! transitions, physical memory, VGA cursor, interrupt controller) goes
//! through [`Platform`]. The bare-metal implementation lives in
//! [`x86`]; the host test suite supplies a recording mock.

#[cfg(target_os = "none")]
pub mod x86;

use crate::memory::PageEntry;
use crate::scheduler::SwitchContext;
use crate::terminal::TerminalId;

/// Legacy interrupt lines used by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Irq {
    /// PIT channel 0
    Timer = 0,
    /// PS/2 keyboard
    Keyboard = 1,
    /// Cascade to the secondary controller
    Cascade = 2,
    /// Real-time clock
    Rtc = 8,
}

impl Irq {
    /// Interrupt line number on the chained controllers.
    pub const fn line(self) -> u8 {
        self as u8
    }
}

/// Hardware services consumed by the kernel core.
pub trait Platform {
    /// Write one entry of the active page directory.
    fn install_directory_entry(&mut self, slot: usize, entry: PageEntry);

    /// Write entry 0 of a terminal's video page table.
    fn install_video_entry(&mut self, terminal: TerminalId, entry: PageEntry);

    /// Physical address of a terminal's video page table.
    fn video_table_addr(&self, terminal: TerminalId) -> u32;

    /// Invalidate every cached translation.
    fn flush_tlb(&mut self);

    /// Stack loaded by the CPU on the next user to kernel transition.
    fn set_kernel_stack(&mut self, top: u32);

    /// Copy `bytes` into physical memory at `addr`.
    fn write_phys(&mut self, addr: u32, bytes: &[u8]);

    /// Fill `buf` from physical memory at `addr`.
    fn read_phys(&self, addr: u32, buf: &mut [u8]);

    /// Copy `len` bytes between physical ranges (ranges may overlap).
    fn copy_phys(&mut self, from: u32, to: u32, len: usize);

    /// Move the hardware text cursor.
    fn set_cursor(&mut self, row: usize, col: usize);

    /// Program the periodic RTC interrupt rate selector (3..=15).
    fn set_rtc_rate(&mut self, rate: u8);

    /// Unmask an interrupt line.
    fn enable_irq(&mut self, irq: Irq);

    /// Mask an interrupt line.
    fn disable_irq(&mut self, irq: Irq);

    /// Acknowledge an interrupt on the controller.
    fn end_of_interrupt(&mut self, irq: Irq);

    /// Context that starts a never-run process: resuming it lands in the
    /// platform's first-run trampoline on the kernel stack at `kernel_stack_top`.
    fn initial_switch_context(&self, kernel_stack_top: u32) -> SwitchContext;
}
