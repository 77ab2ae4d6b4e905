//! Terminal multiplexer.
//!
//! Three virtual terminals share one VGA text page. The foreground terminal
//! draws into the live page; every other terminal draws into its private
//! back-buffer. Switching the foreground swaps page contents and retargets
//! the per-terminal video tables so user mappings follow along.

pub mod input;
pub mod line;
pub mod screen;

pub use input::KeyEvent;
pub use line::LineEditor;
pub use screen::Cursor;

use core::fmt;

use crate::arch::Platform;
use crate::config::{NUM_TERMINALS, PAGE_SIZE, TERMINAL_BACK_BUFFERS, VIDEO_MEMORY};
use crate::error::{KResult, KernelError};
use crate::memory::AddressSpaceSwitcher;

/// Terminal index (0..3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(u8);

impl TerminalId {
    /// Wrap a raw index known to be in range.
    ///
    /// Indices from outside the kernel go through `TryFrom<usize>`.
    pub const fn new(raw: u8) -> Self {
        debug_assert!((raw as usize) < NUM_TERMINALS, "terminal index out of range");
        if (raw as usize) < NUM_TERMINALS {
            Self(raw)
        } else {
            Self(NUM_TERMINALS as u8 - 1)
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every terminal, in order.
    pub fn all() -> impl Iterator<Item = TerminalId> {
        (0..NUM_TERMINALS as u8).map(TerminalId)
    }
}

impl TryFrom<usize> for TerminalId {
    type Error = KernelError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < NUM_TERMINALS {
            Ok(TerminalId(value as u8))
        } else {
            Err(KernelError::InvalidArgument)
        }
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tty{}", self.0)
    }
}

/// Per-terminal state.
#[derive(Debug)]
pub struct TerminalContext {
    id: TerminalId,
    /// Has this terminal ever been shown (and been given a shell)?
    pub active: bool,
    /// Output position inside whichever page the terminal draws into.
    pub cursor: Cursor,
    /// Keyboard line discipline.
    pub editor: LineEditor,
}

impl TerminalContext {
    const fn new(id: TerminalId) -> Self {
        Self {
            id,
            active: false,
            cursor: Cursor { row: 0, col: 0 },
            editor: LineEditor::new(),
        }
    }

    pub fn id(&self) -> TerminalId {
        self.id
    }

    /// Physical back-buffer page.
    pub fn back_buffer(&self) -> u32 {
        TERMINAL_BACK_BUFFERS[self.id.index()]
    }
}

/// Owner of the three terminal contexts and the foreground selection.
#[derive(Debug)]
pub struct TerminalMux {
    terminals: [TerminalContext; NUM_TERMINALS],
    foreground: TerminalId,
}

impl TerminalMux {
    /// Terminal 0 in the foreground and active; the others dormant.
    pub const fn new() -> Self {
        let mut terminals = [
            TerminalContext::new(TerminalId(0)),
            TerminalContext::new(TerminalId(1)),
            TerminalContext::new(TerminalId(2)),
        ];
        terminals[0].active = true;
        Self {
            terminals,
            foreground: TerminalId(0),
        }
    }

    /// Map terminal 0's table live, the others to their back-buffers, and
    /// blank every page.
    pub fn init<P: Platform + ?Sized>(&mut self, platform: &mut P, switcher: &mut AddressSpaceSwitcher) {
        for terminal in TerminalId::all() {
            let live = terminal == self.foreground;
            switcher.set_video_target(platform, terminal, live);
            let page = self.page_for(terminal);
            screen::clear(platform, page, &mut self.terminals[terminal.index()].cursor);
        }
        switcher.flush(platform);
        platform.set_cursor(0, 0);
    }

    pub fn foreground(&self) -> TerminalId {
        self.foreground
    }

    pub fn is_foreground(&self, terminal: TerminalId) -> bool {
        self.foreground == terminal
    }

    pub fn context(&self, terminal: TerminalId) -> &TerminalContext {
        &self.terminals[terminal.index()]
    }

    pub fn context_mut(&mut self, terminal: TerminalId) -> &mut TerminalContext {
        &mut self.terminals[terminal.index()]
    }

    /// Page a terminal's output currently lands in.
    pub fn page_for(&self, terminal: TerminalId) -> u32 {
        if self.is_foreground(terminal) {
            VIDEO_MEMORY
        } else {
            self.context(terminal).back_buffer()
        }
    }

    /// Draw `bytes` on `terminal`. Background terminals never touch the
    /// live page.
    pub fn write<P: Platform + ?Sized>(&mut self, platform: &mut P, terminal: TerminalId, bytes: &[u8]) -> usize {
        let page = self.page_for(terminal);
        let context = &mut self.terminals[terminal.index()];
        screen::put_bytes(platform, page, &mut context.cursor, bytes);
        if self.foreground == terminal {
            let cursor = context.cursor;
            platform.set_cursor(cursor.row, cursor.col);
        }
        bytes.len()
    }

    /// Blank a terminal's page and redraw its pending input line.
    pub fn clear<P: Platform + ?Sized>(&mut self, platform: &mut P, terminal: TerminalId) {
        let page = self.page_for(terminal);
        let context = &mut self.terminals[terminal.index()];
        screen::clear(platform, page, &mut context.cursor);
        let mut pending = [0u8; crate::config::LINE_BUFFER_LEN];
        let len = context.editor.pending().len();
        pending[..len].copy_from_slice(context.editor.pending());
        self.write(platform, terminal, &pending[..len]);
    }

    /// Copy a finished input line, blocking (`WouldBlock`) until Enter.
    pub fn read_line(&mut self, terminal: TerminalId, out: &mut [u8]) -> KResult<usize> {
        self.terminals[terminal.index()].editor.take_line(out)
    }

    /// Bring `new` to the foreground.
    ///
    /// The live page is saved into the outgoing terminal's back-buffer and
    /// its video table is pointed there; the incoming terminal's table is
    /// pointed at the live page and its back-buffer copied in. Returns
    /// `true` when `new` is shown for the first time.
    pub fn switch_foreground<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        switcher: &mut AddressSpaceSwitcher,
        new: TerminalId,
    ) -> bool {
        let old = self.foreground;
        if old == new {
            return false;
        }

        let old_buffer = self.context(old).back_buffer();
        platform.copy_phys(VIDEO_MEMORY, old_buffer, PAGE_SIZE);
        switcher.set_video_target(platform, old, false);

        self.foreground = new;
        switcher.set_video_target(platform, new, true);
        switcher.flush(platform);

        let context = &mut self.terminals[new.index()];
        platform.copy_phys(context.back_buffer(), VIDEO_MEMORY, PAGE_SIZE);
        platform.set_cursor(context.cursor.row, context.cursor.col);

        let first = !context.active;
        context.active = true;
        log::debug!("[TTY] foreground {} -> {}", old, new);
        first
    }
}

impl Default for TerminalMux {
    fn default() -> Self {
        Self::new()
    }
}
