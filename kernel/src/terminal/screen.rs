//! Text-mode page writer.
//!
//! Renders bytes into an 80x25 VGA text page at a physical address. The
//! same code draws into the live video page and into back-buffers; which
//! page is used is decided by the caller.

use crate::arch::Platform;
use crate::config::{SCREEN_COLS, SCREEN_ROWS, TEXT_ATTRIBUTE};

const ROW_BYTES: usize = SCREEN_COLS * 2;
const BLANK: [u8; 2] = [b' ', TEXT_ATTRIBUTE];

/// Cursor position inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

impl Cursor {
    fn offset(&self) -> u32 {
        ((self.row * SCREEN_COLS + self.col) * 2) as u32
    }
}

/// Draw one byte at the cursor and advance it.
pub fn put_byte<P: Platform + ?Sized>(platform: &mut P, page: u32, cursor: &mut Cursor, byte: u8) {
    match byte {
        b'\n' | b'\r' => newline(platform, page, cursor),
        b'\x08' => erase(platform, page, cursor),
        0 => {}
        _ => {
            platform.write_phys(page + cursor.offset(), &[byte, TEXT_ATTRIBUTE]);
            cursor.col += 1;
            if cursor.col == SCREEN_COLS {
                newline(platform, page, cursor);
            }
        }
    }
}

/// Draw a run of bytes.
pub fn put_bytes<P: Platform + ?Sized>(platform: &mut P, page: u32, cursor: &mut Cursor, bytes: &[u8]) {
    for byte in bytes {
        put_byte(platform, page, cursor, *byte);
    }
}

/// Blank the whole page and home the cursor.
pub fn clear<P: Platform + ?Sized>(platform: &mut P, page: u32, cursor: &mut Cursor) {
    let mut row = [0u8; ROW_BYTES];
    for cell in row.chunks_exact_mut(2) {
        cell.copy_from_slice(&BLANK);
    }
    for r in 0..SCREEN_ROWS {
        platform.write_phys(page + (r * ROW_BYTES) as u32, &row);
    }
    *cursor = Cursor::default();
}

/// Step back one cell, wrapping to the end of the previous row, and blank it.
fn erase<P: Platform + ?Sized>(platform: &mut P, page: u32, cursor: &mut Cursor) {
    if cursor.col > 0 {
        cursor.col -= 1;
    } else if cursor.row > 0 {
        cursor.row -= 1;
        cursor.col = SCREEN_COLS - 1;
    } else {
        return;
    }
    platform.write_phys(page + cursor.offset(), &BLANK);
}

fn newline<P: Platform + ?Sized>(platform: &mut P, page: u32, cursor: &mut Cursor) {
    cursor.col = 0;
    if cursor.row + 1 < SCREEN_ROWS {
        cursor.row += 1;
        return;
    }
    scroll(platform, page);
}

fn scroll<P: Platform + ?Sized>(platform: &mut P, page: u32) {
    platform.copy_phys(page + ROW_BYTES as u32, page, (SCREEN_ROWS - 1) * ROW_BYTES);
    let last = page + ((SCREEN_ROWS - 1) * ROW_BYTES) as u32;
    for col in 0..SCREEN_COLS {
        platform.write_phys(last + (col * 2) as u32, &BLANK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VIDEO_MEMORY;
    use crate::tests::support::MockPlatform;

    #[test]
    fn test_put_bytes_writes_cells() {
        let mut platform = MockPlatform::new();
        let mut cursor = Cursor::default();
        put_bytes(&mut platform, VIDEO_MEMORY, &mut cursor, b"hi\nx");

        assert_eq!(platform.text_row(VIDEO_MEMORY, 0).trim_end(), "hi");
        assert_eq!(platform.text_row(VIDEO_MEMORY, 1).trim_end(), "x");
        assert_eq!(cursor, Cursor { row: 1, col: 1 });
    }

    #[test]
    fn test_backspace_wraps_to_previous_row() {
        let mut platform = MockPlatform::new();
        let mut cursor = Cursor { row: 1, col: 0 };
        put_byte(&mut platform, VIDEO_MEMORY, &mut cursor, b'\x08');
        assert_eq!(cursor, Cursor { row: 0, col: SCREEN_COLS - 1 });

        let mut home = Cursor::default();
        put_byte(&mut platform, VIDEO_MEMORY, &mut home, b'\x08');
        assert_eq!(home, Cursor::default());
    }

    #[test]
    fn test_scroll_at_bottom() {
        let mut platform = MockPlatform::new();
        let mut cursor = Cursor::default();
        for row in 0..SCREEN_ROWS {
            put_byte(&mut platform, VIDEO_MEMORY, &mut cursor, b'a' + row as u8);
            put_byte(&mut platform, VIDEO_MEMORY, &mut cursor, b'\n');
        }
        // The first line scrolled off; the last row is blank.
        assert!(platform.text_row(VIDEO_MEMORY, 0).starts_with('b'));
        assert_eq!(platform.text_row(VIDEO_MEMORY, SCREEN_ROWS - 1).trim_end(), "");
        assert_eq!(cursor, Cursor { row: SCREEN_ROWS - 1, col: 0 });
    }

    #[test]
    fn test_line_wrap() {
        let mut platform = MockPlatform::new();
        let mut cursor = Cursor::default();
        put_bytes(&mut platform, VIDEO_MEMORY, &mut cursor, &[b'z'; SCREEN_COLS + 1]);
        assert_eq!(cursor, Cursor { row: 1, col: 1 });
    }
}
