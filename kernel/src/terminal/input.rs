//! Keyboard input.
//!
//! Decoded key events always act on the foreground terminal: they edit its
//! line, echo to its screen and may bring another terminal forward.

use crate::arch::Platform;
use crate::config::LINE_BUFFER_LEN;
use crate::fs::image::MAX_DENTRIES;
use crate::fs::{self, DirEntry, FileSystem};
use crate::kernel::Kernel;

use super::TerminalId;

/// A key press after scancode decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Printable character.
    Char(u8),
    Enter,
    Backspace,
    /// Complete the current word against file names.
    Tab,
    /// Recall the previous command.
    HistoryUp,
    /// Recall the next command (or the draft).
    HistoryDown,
    /// Ctrl+L.
    ClearScreen,
    /// Alt+F1..F3.
    SwitchTerminal(TerminalId),
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Apply one key press to the foreground terminal.
    pub fn handle_key(&mut self, event: KeyEvent) {
        let terminal = self.terminals.foreground();
        match event {
            KeyEvent::Char(byte) => {
                if self.terminals.context_mut(terminal).editor.insert(byte) {
                    self.echo(terminal, &[byte]);
                }
            }
            KeyEvent::Enter => {
                self.terminals.context_mut(terminal).editor.submit();
                self.echo(terminal, b"\n");
            }
            KeyEvent::Backspace => {
                if self.terminals.context_mut(terminal).editor.backspace() {
                    self.echo(terminal, b"\x08");
                }
            }
            KeyEvent::Tab => self.complete(terminal),
            KeyEvent::HistoryUp => {
                self.recall(terminal, |editor| editor.history_prev());
            }
            KeyEvent::HistoryDown => {
                self.recall(terminal, |editor| editor.history_next());
            }
            KeyEvent::ClearScreen => self.terminals.clear(&mut self.platform, terminal),
            KeyEvent::SwitchTerminal(target) => self.switch_terminal(target),
        }
    }

    /// Bring `target` forward, starting its shell if it has none.
    ///
    /// A terminal without processes is refused while the process table
    /// is full, since its shell could not start.
    pub fn switch_terminal(&mut self, target: TerminalId) {
        if self.terminals.is_foreground(target) {
            return;
        }
        let needs_shell = self.sched.frontier(target).is_none();
        if needs_shell && self.sched.table.is_full() {
            log::warn!("[TTY] {} not started: process table full", target);
            return;
        }

        self.terminals
            .switch_foreground(&mut self.platform, &mut self.switcher, target);
        if needs_shell {
            if let Err(err) = self.spawn_root(target) {
                log::error!("[TTY] shell for {} failed to start: {}", target, err);
            }
        }
    }

    fn echo(&mut self, terminal: TerminalId, bytes: &[u8]) {
        self.terminals.write(&mut self.platform, terminal, bytes);
    }

    fn complete(&mut self, terminal: TerminalId) {
        let mut names: [Option<DirEntry>; MAX_DENTRIES] = [None; MAX_DENTRIES];
        for (slot, entry) in names.iter_mut().zip(fs::entries(&self.fs)) {
            *slot = Some(entry);
        }

        let editor = &mut self.terminals.context_mut(terminal).editor;
        let added = editor.complete(names.iter().flatten().map(|e| e.name()));
        if added == 0 {
            return;
        }
        let pending = editor.pending();
        let mut tail = [0u8; LINE_BUFFER_LEN];
        tail[..added].copy_from_slice(&pending[pending.len() - added..]);
        self.echo(terminal, &tail[..added]);
    }

    /// Replace the displayed line with a history entry.
    fn recall(&mut self, terminal: TerminalId, step: impl FnOnce(&mut super::LineEditor) -> bool) {
        let erased = self.terminals.context(terminal).editor.pending().len();
        let editor = &mut self.terminals.context_mut(terminal).editor;
        if !step(editor) {
            return;
        }
        let mut line = [0u8; LINE_BUFFER_LEN];
        let len = editor.pending().len();
        line[..len].copy_from_slice(editor.pending());

        for _ in 0..erased {
            self.echo(terminal, b"\x08");
        }
        self.echo(terminal, &line[..len]);
    }
}
