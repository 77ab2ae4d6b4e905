//! System Call Unit Tests
//!
//! Tests for syscall dispatch, file descriptors and user pointers.

#[cfg(test)]
mod tests {
    use crate::config::{PROGRAM_WINDOW, VIDEO_SLOT, VIDMAP_ADDR};
    use crate::error::KernelError;
    use crate::fs::FileKind;
    use crate::process::Pid;
    use crate::syscall::{SyscallAction, SyscallContext, SyscallNumber};
    use crate::terminal::TerminalId;
    use crate::tests::support::{booted, PlatformEvent, TestKernel, TestUserMemory, LS_ENTRY};

    const NAME: u32 = PROGRAM_WINDOW + 0x10_0000;
    const BUF: u32 = PROGRAM_WINDOW + 0x20_0000;

    fn call(kernel: &mut TestKernel, mem: &mut TestUserMemory, number: SyscallNumber, a: u64, b: u64, c: u64) -> SyscallAction {
        kernel.dispatch(&SyscallContext::new(number as u64, a, b, c), mem)
    }

    fn value(action: SyscallAction) -> i32 {
        match action {
            SyscallAction::Return(value) => value,
            other => panic!("expected a plain return, got {:?}", other),
        }
    }

    fn open(kernel: &mut TestKernel, mem: &mut TestUserMemory, name: &[u8]) -> i32 {
        let mut c_name = name.to_vec();
        c_name.push(0);
        mem.put(NAME, &c_name);
        value(call(kernel, mem, SyscallNumber::Open, NAME as u64, 0, 0))
    }

    fn read(kernel: &mut TestKernel, mem: &mut TestUserMemory, fd: i32, n: usize) -> (i32, Vec<u8>) {
        let got = value(call(kernel, mem, SyscallNumber::Read, fd as u64, BUF as u64, n as u64));
        let len = got.max(0) as usize;
        (got, mem.get(BUF, len).to_vec())
    }

    fn fd_kind(kernel: &TestKernel, fd: i32) -> FileKind {
        let record = kernel.scheduler().current_record().unwrap();
        record.files.get(fd as usize).unwrap().ops().kind()
    }

    // ========================================
    // Open / close
    // ========================================

    #[test]
    fn test_open_selects_table_by_type() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();

        let dir = open(&mut kernel, &mut mem, b".");
        let rtc = open(&mut kernel, &mut mem, b"rtc");
        let file = open(&mut kernel, &mut mem, b"frame0.txt");

        assert_eq!((dir, rtc, file), (2, 3, 4));
        assert_eq!(fd_kind(&kernel, dir), FileKind::Directory);
        assert_eq!(fd_kind(&kernel, rtc), FileKind::Rtc);
        assert_eq!(fd_kind(&kernel, file), FileKind::Regular);
        assert_eq!(open(&mut kernel, &mut mem, b"missing"), -1);
        assert_eq!(kernel.sys_open(b"missing"), Err(KernelError::FileNotFound));
    }

    #[test]
    fn test_open_fails_when_slots_full() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        for expected in 2..8 {
            assert_eq!(open(&mut kernel, &mut mem, b"frame0.txt"), expected);
        }
        assert_eq!(open(&mut kernel, &mut mem, b"frame0.txt"), -1);
        assert_eq!(kernel.sys_open(b"rtc"), Err(KernelError::ResourceExhausted));
    }

    #[test]
    fn test_close_rules() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();

        for fd in [0u64, 1, 5, 8, u64::MAX] {
            assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Close, fd, 0, 0)), -1);
        }
        assert_eq!(kernel.sys_close(0), Err(KernelError::InvalidDescriptor));
        assert_eq!(kernel.sys_close(1), Err(KernelError::InvalidDescriptor));
        assert_eq!(kernel.sys_close(6), Err(KernelError::InvalidDescriptor));

        let fd = open(&mut kernel, &mut mem, b"frame0.txt");
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Close, fd as u64, 0, 0)), 0);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Close, fd as u64, 0, 0)), -1);
        // The freed slot is handed out again.
        assert_eq!(open(&mut kernel, &mut mem, b"rtc"), fd);
    }

    // ========================================
    // Read / write
    // ========================================

    #[test]
    fn test_regular_file_reads_sequentially() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let fd = open(&mut kernel, &mut mem, b"frame0.txt");

        assert_eq!(read(&mut kernel, &mut mem, fd, 6), (6, b"/\\/\\/\\".to_vec()));
        assert_eq!(read(&mut kernel, &mut mem, fd, 100), (5, b" fish".to_vec()));
        assert_eq!(read(&mut kernel, &mut mem, fd, 100).0, 0);
    }

    #[test]
    fn test_directory_read_lists_names() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let fd = open(&mut kernel, &mut mem, b".");

        let mut names = Vec::new();
        loop {
            let (n, name) = read(&mut kernel, &mut mem, fd, 32);
            if n == 0 {
                break;
            }
            names.push(name);
        }
        assert_eq!(names.len(), 7);
        assert_eq!(names[0], b".".to_vec());
        assert_eq!(names[4], b"counter".to_vec());
    }

    #[test]
    fn test_writes_to_read_only_files_fail() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let dir = open(&mut kernel, &mut mem, b".");
        let file = open(&mut kernel, &mut mem, b"frame0.txt");
        mem.put(BUF, b"data");

        for fd in [dir, file, 0] {
            assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Write, fd as u64, BUF as u64, 4)), -1);
        }
        // Reading stdout is refused too.
        assert_eq!(read(&mut kernel, &mut mem, 1, 4).0, -1);
    }

    #[test]
    fn test_stdout_write_reaches_screen() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        mem.put(BUF, b"hello");

        let n = value(call(&mut kernel, &mut mem, SyscallNumber::Write, 1, BUF as u64, 5));

        assert_eq!(n, 5);
        assert!(kernel
            .platform()
            .text_row(crate::config::VIDEO_MEMORY, 0)
            .starts_with("hello"));
    }

    #[test]
    fn test_rtc_frequency_and_wait() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let fd = open(&mut kernel, &mut mem, b"rtc");
        assert_eq!(kernel.platform().events.last(), Some(&PlatformEvent::RtcRate(15)));

        mem.put(BUF, &32u32.to_le_bytes());
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Write, fd as u64, BUF as u64, 4)), 0);
        assert_eq!(kernel.rtc().frequency(), 32);
        assert_eq!(kernel.platform().events.last(), Some(&PlatformEvent::RtcRate(11)));

        mem.put(BUF, &33u32.to_le_bytes());
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Write, fd as u64, BUF as u64, 4)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Write, fd as u64, BUF as u64, 2)), -1);

        let ctx = SyscallContext::new(SyscallNumber::Read as u64, fd as u64, BUF as u64, 4);
        assert!(matches!(kernel.dispatch(&ctx, &mut mem), SyscallAction::Retry));
        assert!(matches!(kernel.dispatch(&ctx, &mut mem), SyscallAction::Retry));
        kernel.rtc_interrupt();
        assert_eq!(value(kernel.dispatch(&ctx, &mut mem)), 0);
    }

    #[test]
    fn test_rtc_readers_wait_independently() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let first = open(&mut kernel, &mut mem, b"rtc");
        let second = open(&mut kernel, &mut mem, b"rtc");
        let read_first = SyscallContext::new(SyscallNumber::Read as u64, first as u64, BUF as u64, 4);
        let read_second = SyscallContext::new(SyscallNumber::Read as u64, second as u64, BUF as u64, 4);

        assert!(matches!(kernel.dispatch(&read_first, &mut mem), SyscallAction::Retry));
        kernel.rtc_interrupt();
        assert!(matches!(kernel.dispatch(&read_second, &mut mem), SyscallAction::Retry));
        assert_eq!(value(kernel.dispatch(&read_first, &mut mem)), 0);
        assert!(matches!(kernel.dispatch(&read_second, &mut mem), SyscallAction::Retry));

        kernel.rtc_interrupt();
        assert_eq!(value(kernel.dispatch(&read_second, &mut mem)), 0);
    }

    #[test]
    fn test_terminal_read_retries_until_line() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let ctx = SyscallContext::new(SyscallNumber::Read as u64, 0, BUF as u64, 16);

        assert!(matches!(kernel.dispatch(&ctx, &mut mem), SyscallAction::Retry));
        kernel.handle_key(crate::terminal::KeyEvent::Char(b'l'));
        kernel.handle_key(crate::terminal::KeyEvent::Char(b's'));
        kernel.handle_key(crate::terminal::KeyEvent::Enter);

        assert_eq!(value(kernel.dispatch(&ctx, &mut mem)), 3);
        assert_eq!(mem.get(BUF, 3), b"ls\n");
    }

    #[test]
    fn test_user_pointers_are_checked() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let fd = open(&mut kernel, &mut mem, b"frame0.txt");

        let outside = (PROGRAM_WINDOW - 16) as u64;
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Read, fd as u64, outside, 8)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Write, 1, 0, 8)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Open, 0x1000, 0, 0)), -1);
        let straddle = (VIDMAP_ADDR - 2) as u64;
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Read, fd as u64, straddle, 8)), -1);
    }

    // ========================================
    // Arguments and video
    // ========================================

    #[test]
    fn test_getargs_copies_tail_with_terminator() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        kernel.launch(b"ls frame0.txt", TerminalId::new(0)).unwrap();

        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::GetArgs, BUF as u64, 11, 0)), 0);
        assert_eq!(mem.get(BUF, 11), b"frame0.txt\0");
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::GetArgs, BUF as u64, 10, 0)), -1);
    }

    #[test]
    fn test_getargs_without_args_fails() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::GetArgs, BUF as u64, 128, 0)), -1);
    }

    #[test]
    fn test_vidmap_exposes_terminal_page() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();

        let addr = value(call(&mut kernel, &mut mem, SyscallNumber::Vidmap, BUF as u64, 0, 0));

        assert_eq!(addr as u32, VIDMAP_ADDR);
        assert_eq!(mem.get(BUF, 4), &VIDMAP_ADDR.to_le_bytes());
        let table = crate::arch::Platform::video_table_addr(kernel.platform(), TerminalId::new(0));
        assert_eq!(kernel.platform().directory[VIDEO_SLOT].addr(), Some(table));
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Vidmap, 0x40_0000, 0, 0)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Vidmap, VIDMAP_ADDR as u64, 0, 0)), -1);
    }

    #[test]
    fn test_signal_calls_unsupported() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::SetHandler, 0, BUF as u64, 0)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Sigreturn, 0, 0, 0)), -1);
        let unknown = SyscallContext::new(42, 0, 0, 0);
        assert_eq!(value(kernel.dispatch(&unknown, &mut mem)), -1);
    }

    // ========================================
    // Execute / halt
    // ========================================

    #[test]
    fn test_execute_then_halt_round_trip() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        mem.put(NAME, b"ls frame0.txt\0");

        let launch = match call(&mut kernel, &mut mem, SyscallNumber::Execute, NAME as u64, 0, 0) {
            SyscallAction::Enter(launch) => launch,
            other => panic!("expected Enter, got {:?}", other),
        };
        assert_eq!(launch.frame.entry, LS_ENTRY);
        assert_eq!(kernel.current(), Some(launch.pid));

        match call(&mut kernel, &mut mem, SyscallNumber::Halt, 5, 0, 0) {
            SyscallAction::Resume { status, .. } => assert_eq!(status.code(), 5),
            other => panic!("expected Resume, got {:?}", other),
        }
        assert_eq!(kernel.current(), Some(Pid::new(0)));
    }

    #[test]
    fn test_halt_status_truncated_to_byte() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        kernel.launch(b"ls", TerminalId::new(0)).unwrap();
        match call(&mut kernel, &mut mem, SyscallNumber::Halt, 0x1FF, 0, 0) {
            SyscallAction::Resume { status, .. } => assert_eq!(status.code(), 0xFF),
            other => panic!("expected Resume, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_failure_returns_minus_one() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        mem.put(NAME, b"frame0.txt\0");
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Execute, NAME as u64, 0, 0)), -1);
        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Execute, 0, 0, 0)), -1);
        assert_eq!(kernel.live_count(), 1);
    }

    #[test]
    fn test_execute_rejects_unterminated_long_command() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        let mut command = b"ls".to_vec();
        command.extend(core::iter::repeat(b' ').take(40));
        command.extend(core::iter::repeat(b'x').take(127));
        command.extend_from_slice(b"TAIL\0");
        mem.put(NAME, &command);

        assert_eq!(value(call(&mut kernel, &mut mem, SyscallNumber::Execute, NAME as u64, 0, 0)), -1);
        assert_eq!(kernel.live_count(), 1);
        assert_eq!(kernel.current(), Some(Pid::new(0)));
    }

    #[test]
    fn test_root_halt_respawns() {
        let mut kernel = booted();
        let mut mem = TestUserMemory::new();
        match call(&mut kernel, &mut mem, SyscallNumber::Halt, 0, 0, 0) {
            SyscallAction::Respawn(launch) => {
                assert_eq!(kernel.scheduler().frontier(TerminalId::new(0)), Some(launch.pid));
            }
            other => panic!("expected Respawn, got {:?}", other),
        }
    }
}
