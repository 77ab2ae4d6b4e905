//! Address-space switcher.
//!
//! Owns the two reserved page-directory slots. The program slot always
//! names exactly one pid's frame; the video slot names one terminal's video
//! page table, whose single entry points either at the real video page (the
//! foreground terminal) or at that terminal's back-buffer.
//!
//! The switcher keeps a shadow of everything it has written so the rest of
//! the kernel (and the tests) can ask what is currently mapped.

use crate::arch::Platform;
use crate::config::{NUM_TERMINALS, PROGRAM_SLOT, TERMINAL_BACK_BUFFERS, VIDEO_MEMORY, VIDEO_SLOT};
use crate::process::Pid;
use crate::terminal::TerminalId;

use super::{program_frame, PageEntry, PageFlags};

/// Rewrites the program and video slots of the active page directory.
#[derive(Debug)]
pub struct AddressSpaceSwitcher {
    /// Pid whose frame the program slot names.
    program: Option<Pid>,
    /// Terminal whose video table the video slot names.
    video_slot: Option<TerminalId>,
    /// Shadow of entry 0 of each terminal's video table.
    video_tables: [PageEntry; NUM_TERMINALS],
}

impl AddressSpaceSwitcher {
    /// Create a switcher with nothing bound yet.
    pub const fn new() -> Self {
        Self {
            program: None,
            video_slot: None,
            video_tables: [PageEntry::empty(); NUM_TERMINALS],
        }
    }

    /// Point the program slot at `pid`'s frame and flush the TLB.
    pub fn bind_program<P: Platform + ?Sized>(&mut self, platform: &mut P, pid: Pid) {
        let entry = PageEntry::large(program_frame(pid), PageFlags::USER_RW);
        platform.install_directory_entry(PROGRAM_SLOT, entry);
        self.program = Some(pid);
        // Full reload: every translation is dropped, not just this slot.
        platform.flush_tlb();
    }

    /// Retarget a terminal's video table and select it in the video slot.
    ///
    /// With `live` set the table entry maps the real video page, otherwise
    /// the terminal's private back-buffer. The caller flushes.
    pub fn bind_video<P: Platform + ?Sized>(&mut self, platform: &mut P, terminal: TerminalId, live: bool) {
        self.set_video_target(platform, terminal, live);
        let table = PageEntry::new(platform.video_table_addr(terminal), PageFlags::USER_RW);
        platform.install_directory_entry(VIDEO_SLOT, table);
        self.video_slot = Some(terminal);
    }

    /// Retarget a terminal's video table without touching the video slot.
    pub fn set_video_target<P: Platform + ?Sized>(&mut self, platform: &mut P, terminal: TerminalId, live: bool) {
        let page = if live {
            VIDEO_MEMORY
        } else {
            TERMINAL_BACK_BUFFERS[terminal.index()]
        };
        let entry = PageEntry::new(page, PageFlags::USER_RW);
        if self.video_tables[terminal.index()] != entry {
            self.video_tables[terminal.index()] = entry;
            platform.install_video_entry(terminal, entry);
        }
    }

    /// Flush the TLB after a batch of slot writes.
    pub fn flush<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        platform.flush_tlb();
    }

    /// Pid currently named by the program slot.
    pub fn program(&self) -> Option<Pid> {
        self.program
    }

    /// Terminal currently named by the video slot.
    pub fn video_slot(&self) -> Option<TerminalId> {
        self.video_slot
    }

    /// Physical page a terminal's video table currently maps.
    pub fn video_target(&self, terminal: TerminalId) -> Option<u32> {
        self.video_tables[terminal.index()].addr()
    }
}

impl Default for AddressSpaceSwitcher {
    fn default() -> Self {
        Self::new()
    }
}
