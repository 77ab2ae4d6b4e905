//! Terminal Unit Tests
//!
//! Tests for foreground switching, background output and keyboard input.

#[cfg(test)]
mod tests {
    use crate::config::{MAX_PROCESSES, TERMINAL_BACK_BUFFERS, VIDEO_MEMORY};
    use crate::error::KernelError;
    use crate::process::files::{STDIN_FD, STDOUT_FD};
    use crate::terminal::{KeyEvent, TerminalId};
    use crate::tests::support::{booted, TestKernel};

    const T0: TerminalId = TerminalId::new(0);
    const T1: TerminalId = TerminalId::new(1);
    const T2: TerminalId = TerminalId::new(2);

    fn type_text(kernel: &mut TestKernel, text: &[u8]) {
        for byte in text {
            kernel.handle_key(KeyEvent::Char(*byte));
        }
    }

    fn live_row(kernel: &TestKernel, row: usize) -> String {
        kernel.platform().text_row(VIDEO_MEMORY, row)
    }

    // ========================================
    // Foreground switching
    // ========================================

    #[test]
    fn test_round_trip_preserves_screen() {
        let mut kernel = booted();
        kernel.sys_write(STDOUT_FD, b"391OS> ls\n.\nrtc\nshell\n").unwrap();
        let before = kernel.platform().page(VIDEO_MEMORY);

        kernel.handle_key(KeyEvent::SwitchTerminal(T1));
        assert_eq!(kernel.platform().page(TERMINAL_BACK_BUFFERS[0]), before);
        type_text(&mut kernel, b"typed on tty1");
        assert_ne!(kernel.platform().page(VIDEO_MEMORY), before);

        kernel.handle_key(KeyEvent::SwitchTerminal(T0));
        assert_eq!(kernel.platform().page(VIDEO_MEMORY), before);
        assert_eq!(kernel.platform().page(TERMINAL_BACK_BUFFERS[0]), before);
        assert!(live_row(&kernel, 1).starts_with('.'));
    }

    #[test]
    fn test_first_switch_starts_shell_once() {
        let mut kernel = booted();
        kernel.handle_key(KeyEvent::SwitchTerminal(T2));

        let shell = kernel.scheduler().frontier(T2).expect("tty2 shell");
        assert_eq!(kernel.process(shell).unwrap().name.as_bytes(), b"shell");
        assert_eq!(kernel.live_count(), 2);

        kernel.handle_key(KeyEvent::SwitchTerminal(T0));
        kernel.handle_key(KeyEvent::SwitchTerminal(T2));
        assert_eq!(kernel.live_count(), 2);
        assert_eq!(kernel.scheduler().frontier(T2), Some(shell));
    }

    #[test]
    fn test_switch_refused_when_table_full() {
        let mut kernel = booted();
        for _ in 1..MAX_PROCESSES {
            kernel.launch(b"counter", T0).unwrap();
        }

        kernel.handle_key(KeyEvent::SwitchTerminal(T1));

        assert_eq!(kernel.terminals().foreground(), T0);
        assert_eq!(kernel.scheduler().frontier(T1), None);
        assert_eq!(kernel.live_count(), MAX_PROCESSES);
    }

    #[test]
    fn test_background_output_stays_off_screen() {
        let mut kernel = booted();
        let shell_b = kernel.spawn_root(T1).unwrap();
        let before = kernel.platform().page(VIDEO_MEMORY);

        kernel.sched.queue.set_current(shell_b);
        assert_eq!(kernel.sys_write(STDOUT_FD, b"from tty1"), Ok(9));

        assert_eq!(kernel.platform().page(VIDEO_MEMORY), before);
        assert!(kernel
            .platform()
            .text_row(TERMINAL_BACK_BUFFERS[1], 0)
            .starts_with("from tty1"));

        // Bringing tty1 forward shows what it drew in the background.
        kernel.handle_key(KeyEvent::SwitchTerminal(T1));
        assert!(live_row(&kernel, 0).starts_with("from tty1"));
    }

    // ========================================
    // Keyboard input
    // ========================================

    #[test]
    fn test_read_waits_for_enter() {
        let mut kernel = booted();
        let mut buf = [0u8; 32];

        type_text(&mut kernel, b"ls");
        assert_eq!(kernel.sys_read(STDIN_FD, &mut buf), Err(KernelError::WouldBlock));
        assert!(live_row(&kernel, 0).starts_with("ls"));

        kernel.handle_key(KeyEvent::Enter);
        assert_eq!(kernel.sys_read(STDIN_FD, &mut buf), Ok(3));
        assert_eq!(&buf[..3], b"ls\n");
        assert_eq!(kernel.terminals().context(T0).cursor.row, 1);
    }

    #[test]
    fn test_keys_go_to_foreground_terminal_only() {
        let mut kernel = booted();
        kernel.handle_key(KeyEvent::SwitchTerminal(T1));
        type_text(&mut kernel, b"pwd");
        kernel.handle_key(KeyEvent::Enter);

        let mut buf = [0u8; 8];
        // The tty0 shell is still current and has no line waiting.
        assert_eq!(kernel.sys_read(STDIN_FD, &mut buf), Err(KernelError::WouldBlock));
        assert!(kernel.terminals().context(T1).editor.is_ready());
    }

    #[test]
    fn test_backspace_erases_echo() {
        let mut kernel = booted();
        type_text(&mut kernel, b"lsx");
        kernel.handle_key(KeyEvent::Backspace);
        assert_eq!(live_row(&kernel, 0).trim_end(), "ls");
        assert_eq!(kernel.terminals().context(T0).editor.pending(), b"ls");
    }

    #[test]
    fn test_tab_completes_file_names() {
        let mut kernel = booted();
        type_text(&mut kernel, b"cou");
        kernel.handle_key(KeyEvent::Tab);

        assert_eq!(kernel.terminals().context(T0).editor.pending(), b"counter");
        assert_eq!(live_row(&kernel, 0).trim_end(), "counter");
    }

    #[test]
    fn test_history_recall_redraws_line() {
        let mut kernel = booted();
        type_text(&mut kernel, b"counter");
        kernel.handle_key(KeyEvent::Enter);
        type_text(&mut kernel, b"xy");

        kernel.handle_key(KeyEvent::HistoryUp);
        assert_eq!(live_row(&kernel, 1).trim_end(), "counter");

        kernel.handle_key(KeyEvent::HistoryDown);
        assert_eq!(live_row(&kernel, 1).trim_end(), "xy");
    }

    #[test]
    fn test_clear_screen_keeps_pending_line() {
        let mut kernel = booted();
        kernel.sys_write(STDOUT_FD, b"old output\n").unwrap();
        type_text(&mut kernel, b"gr");

        kernel.handle_key(KeyEvent::ClearScreen);

        assert_eq!(live_row(&kernel, 0).trim_end(), "gr");
        assert_eq!(live_row(&kernel, 1).trim_end(), "");
        assert_eq!(kernel.platform().cursor, (0, 2));
    }
}
