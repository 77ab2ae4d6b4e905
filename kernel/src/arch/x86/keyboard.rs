//! PS/2 keyboard decoding.
//!
//! Scancode set 1 bytes become [`KeyEvent`]s for the terminal layer.
//! Alt is tracked here because only Alt+F1..F3 matters to the kernel.

use core::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;
use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyState, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::terminal::{KeyEvent, TerminalId};

lazy_static! {
    static ref KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(
        Keyboard::new(
            ScancodeSet1::new(),
            layouts::Us104Key,
            HandleControl::MapLettersToUnicode,
        )
    );
}

static ALT: AtomicBool = AtomicBool::new(false);

/// Ctrl+L after control-letter mapping.
const FORM_FEED: char = '\u{000C}';

/// Feed one scancode byte; returns a key event once a key press completes.
pub fn decode(scancode: u8) -> Option<KeyEvent> {
    let mut keyboard = KEYBOARD.lock();
    let event = keyboard.add_byte(scancode).ok()??;

    if matches!(event.code, KeyCode::LAlt | KeyCode::RAltGr) {
        ALT.store(event.state != KeyState::Up, Ordering::Relaxed);
        return None;
    }
    if event.state == KeyState::Down && ALT.load(Ordering::Relaxed) {
        let index = match event.code {
            KeyCode::F1 => Some(0),
            KeyCode::F2 => Some(1),
            KeyCode::F3 => Some(2),
            _ => None,
        };
        if let Some(terminal) = index.and_then(|i: usize| TerminalId::try_from(i).ok()) {
            return Some(KeyEvent::SwitchTerminal(terminal));
        }
    }

    match keyboard.process_keyevent(event)? {
        DecodedKey::Unicode('\n') => Some(KeyEvent::Enter),
        DecodedKey::Unicode('\u{0008}') => Some(KeyEvent::Backspace),
        DecodedKey::Unicode('\t') => Some(KeyEvent::Tab),
        DecodedKey::Unicode(FORM_FEED) => Some(KeyEvent::ClearScreen),
        DecodedKey::Unicode(c) if c.is_ascii() && !c.is_ascii_control() => Some(KeyEvent::Char(c as u8)),
        DecodedKey::RawKey(KeyCode::ArrowUp) => Some(KeyEvent::HistoryUp),
        DecodedKey::RawKey(KeyCode::ArrowDown) => Some(KeyEvent::HistoryDown),
        _ => None,
    }
}
