//! Line editor.
//!
//! Collects keystrokes for one terminal until Enter, keeps the last few
//! submitted commands for Up/Down recall and completes the word under the
//! cursor against a set of candidate names.

use crate::config::{HISTORY_SIZE, LINE_BUFFER_LEN, MAX_NAME_LEN};
use crate::error::{KResult, KernelError};
use crate::process::pcb::FixedBytes;

type Line = FixedBytes<LINE_BUFFER_LEN>;

/// Edit buffer, completed line and history for one terminal.
#[derive(Debug)]
pub struct LineEditor {
    buf: [u8; LINE_BUFFER_LEN],
    len: usize,
    /// Finished line including its trailing newline.
    completed: [u8; LINE_BUFFER_LEN + 1],
    completed_len: usize,
    ready: bool,
    /// Submitted commands, newest first.
    history: [Line; HISTORY_SIZE],
    history_len: usize,
    /// Position while browsing history; `None` while editing the draft.
    browsing: Option<usize>,
    draft: Line,
}

impl LineEditor {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_BUFFER_LEN],
            len: 0,
            completed: [0; LINE_BUFFER_LEN + 1],
            completed_len: 0,
            ready: false,
            history: [Line::new(); HISTORY_SIZE],
            history_len: 0,
            browsing: None,
            draft: Line::new(),
        }
    }

    /// Bytes typed so far on the current line.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append a byte. Returns `false` when the buffer is full.
    pub fn insert(&mut self, byte: u8) -> bool {
        if self.len == LINE_BUFFER_LEN {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    /// Drop the last byte. Returns `false` on an empty line.
    pub fn backspace(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.len -= 1;
        true
    }

    /// Finish the line: it becomes readable and is pushed onto history.
    pub fn submit(&mut self) {
        self.completed[..self.len].copy_from_slice(&self.buf[..self.len]);
        self.completed[self.len] = b'\n';
        self.completed_len = self.len + 1;
        self.ready = true;

        if self.len > 0 {
            self.history.copy_within(0..HISTORY_SIZE - 1, 1);
            // Line::from_slice cannot fail: the buffer has the same capacity.
            self.history[0] = Line::from_slice(&self.buf[..self.len]).unwrap_or_default();
            self.history_len = (self.history_len + 1).min(HISTORY_SIZE);
        }
        self.len = 0;
        self.browsing = None;
    }

    /// Is a finished line waiting to be read?
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Copy the finished line into `out`, newline included, truncating to
    /// `out.len()`. Fails with `WouldBlock` until Enter has been pressed.
    pub fn take_line(&mut self, out: &mut [u8]) -> KResult<usize> {
        if !self.ready {
            return Err(KernelError::WouldBlock);
        }
        let n = self.completed_len.min(out.len());
        out[..n].copy_from_slice(&self.completed[..n]);
        self.ready = false;
        Ok(n)
    }

    /// Replace the line with the next older history entry.
    pub fn history_prev(&mut self) -> bool {
        let next = match self.browsing {
            None if self.history_len > 0 => {
                self.draft = Line::from_slice(self.pending()).unwrap_or_default();
                0
            }
            Some(i) if i + 1 < self.history_len => i + 1,
            _ => return false,
        };
        self.browsing = Some(next);
        let entry = self.history[next];
        self.load(entry.as_bytes());
        true
    }

    /// Replace the line with the next newer history entry, or the draft.
    pub fn history_next(&mut self) -> bool {
        match self.browsing {
            None => false,
            Some(0) => {
                self.browsing = None;
                let draft = self.draft;
                self.load(draft.as_bytes());
                true
            }
            Some(i) => {
                self.browsing = Some(i - 1);
                let entry = self.history[i - 1];
                self.load(entry.as_bytes());
                true
            }
        }
    }

    /// Extend the last word with the longest prefix shared by every
    /// candidate it starts. Returns the number of bytes appended.
    pub fn complete<'n>(&mut self, candidates: impl IntoIterator<Item = &'n [u8]>) -> usize {
        let start = self.pending().iter().rposition(|b| *b == b' ').map_or(0, |i| i + 1);
        let word_len = self.len - start;
        if word_len == 0 || word_len >= MAX_NAME_LEN {
            return 0;
        }

        let mut word = [0u8; MAX_NAME_LEN];
        word[..word_len].copy_from_slice(&self.buf[start..self.len]);
        let word = &word[..word_len];

        let mut common = [0u8; MAX_NAME_LEN];
        let mut common_len: Option<usize> = None;
        for name in candidates {
            if name.len() <= word_len || !name.starts_with(word) {
                continue;
            }
            let suffix = &name[word_len..];
            common_len = Some(match common_len {
                None => {
                    common[..suffix.len()].copy_from_slice(suffix);
                    suffix.len()
                }
                Some(len) => common[..len]
                    .iter()
                    .zip(suffix)
                    .take_while(|(a, b)| a == b)
                    .count(),
            });
        }

        let added = common_len.unwrap_or(0);
        if self.len + added > LINE_BUFFER_LEN {
            return 0;
        }
        self.buf[self.len..self.len + added].copy_from_slice(&common[..added]);
        self.len += added;
        added
    }

    fn load(&mut self, bytes: &[u8]) {
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &[u8]) -> LineEditor {
        let mut editor = LineEditor::new();
        for b in text {
            assert!(editor.insert(*b));
        }
        editor
    }

    #[test]
    fn test_take_line_blocks_until_enter() {
        let mut editor = typed(b"ls");
        let mut out = [0u8; 16];
        assert_eq!(editor.take_line(&mut out), Err(KernelError::WouldBlock));

        editor.submit();
        assert_eq!(editor.take_line(&mut out), Ok(3));
        assert_eq!(&out[..3], b"ls\n");
        assert_eq!(editor.take_line(&mut out), Err(KernelError::WouldBlock));
    }

    #[test]
    fn test_take_line_truncates() {
        let mut editor = typed(b"hello");
        editor.submit();
        let mut out = [0u8; 2];
        assert_eq!(editor.take_line(&mut out), Ok(2));
        assert_eq!(&out, b"he");
    }

    #[test]
    fn test_buffer_full() {
        let mut editor = typed(&[b'a'; LINE_BUFFER_LEN]);
        assert!(!editor.insert(b'b'));
        assert!(editor.backspace());
        assert!(editor.insert(b'b'));
    }

    #[test]
    fn test_history_recall_and_draft() {
        let mut editor = LineEditor::new();
        for cmd in [&b"ls"[..], b"cat frame0.txt", b"counter"] {
            for b in cmd {
                editor.insert(*b);
            }
            editor.submit();
        }
        editor.insert(b'g');

        assert!(editor.history_prev());
        assert_eq!(editor.pending(), b"counter");
        assert!(editor.history_prev());
        assert!(editor.history_prev());
        assert_eq!(editor.pending(), b"ls");
        assert!(!editor.history_prev());

        assert!(editor.history_next());
        assert!(editor.history_next());
        assert!(editor.history_next());
        assert_eq!(editor.pending(), b"g");
        assert!(!editor.history_next());
    }

    #[test]
    fn test_history_keeps_five_newest() {
        let mut editor = LineEditor::new();
        for i in 0..7u8 {
            editor.insert(b'0' + i);
            editor.submit();
        }
        let mut seen = Vec::new();
        while editor.history_prev() {
            seen.push(editor.pending().to_vec());
        }
        assert_eq!(seen, vec![b"6".to_vec(), b"5".to_vec(), b"4".to_vec(), b"3".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_complete_common_prefix() {
        let names: [&[u8]; 4] = [b"frame0.txt", b"frame1.txt", b"fish", b"shell"];

        let mut editor = typed(b"cat fr");
        assert_eq!(editor.complete(names.iter().copied()), 3);
        assert_eq!(editor.pending(), b"cat frame");

        let mut unique = typed(b"sh");
        assert_eq!(unique.complete(names.iter().copied()), 3);
        assert_eq!(unique.pending(), b"shell");

        let mut empty_word = typed(b"cat ");
        assert_eq!(empty_word.complete(names.iter().copied()), 0);
    }
}
