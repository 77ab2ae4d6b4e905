//! Process lifecycle: execute and halt.
//!
//! # Execute
//!
//! 1. Split the command line into a program name and an argument tail
//! 2. Resolve the name and check the executable magic
//! 3. Allocate a pid and bind the program slot to its frame
//! 4. Copy the image to the load address, read the entry point
//! 5. Build the record, chain it under the terminal's frontier, enroll it
//! 6. Hand back a [`Launch`]; the platform enters user mode from it
//!
//! Nothing is registered until every check has passed: a failure after
//! the pid is claimed releases it and rebinds the program slot to the
//! process that is still running.
//!
//! # Halt
//!
//! Closes every descriptor, unlinks the terminal's frontier process and
//! frees its pid. A process with a parent resumes the parent's `execute`
//! through the [`ResumePoint`] captured at launch; a chain root is
//! replaced by a fresh shell so no active terminal is ever left empty.

use crate::arch::Platform;
use crate::config::{
    ENTRY_POINT_OFFSET, EXECUTABLE_MAGIC, IMAGE_LOAD_ADDR, INIT_PROGRAM, MAX_IMAGE_SIZE,
    MAX_NAME_LEN, MAX_OPEN_FILES, USER_STACK_TOP,
};
use crate::error::{KResult, KernelError};
use crate::fs::{FileSystem, FileType, InodeId};
use crate::kernel::Kernel;
use crate::memory::{kernel_stack_top, program_phys};
use crate::scheduler::context::{ResumePoint, UserFrame};
use crate::terminal::TerminalId;

use super::files::FileDescriptor;
use super::pcb::{ArgBuffer, ExitStatus, Pid, ProcessRecord, ProcessState, ProgramName};

/// Bytes copied per chunk while loading an image.
const LOAD_CHUNK: usize = 1024;

/// A parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Program name.
    pub name: &'a [u8],
    /// Everything after the name, leading spaces removed.
    pub args: &'a [u8],
}

impl<'a> Command<'a> {
    /// Split `line` at the first space after the program name.
    ///
    /// The line ends at the first NUL or newline. The name must be
    /// 1..=32 bytes and the tail must fit the argument buffer.
    pub fn parse(line: &'a [u8]) -> KResult<Self> {
        let end = line
            .iter()
            .position(|b| *b == 0 || *b == b'\n')
            .unwrap_or(line.len());
        let line = &line[..end];

        let start = line
            .iter()
            .position(|b| *b != b' ')
            .ok_or(KernelError::MalformedCommand)?;
        let rest = &line[start..];
        let name_len = rest.iter().position(|b| *b == b' ').unwrap_or(rest.len());
        if name_len > MAX_NAME_LEN {
            return Err(KernelError::MalformedCommand);
        }

        let (name, tail) = rest.split_at(name_len);
        let args_start = tail.iter().position(|b| *b != b' ').unwrap_or(tail.len());
        let args = &tail[args_start..];
        if args.len() >= crate::config::ARGS_LEN {
            return Err(KernelError::MalformedCommand);
        }
        Ok(Self { name, args })
    }
}

/// A loaded, enrolled process waiting to enter user mode.
#[derive(Debug)]
pub struct Launch {
    pub pid: Pid,
    /// Privilege-transition frame for the first user instruction.
    pub frame: UserFrame,
    resume: *mut ResumePoint,
}

impl Launch {
    /// Where the platform records the creator's stack before entering
    /// user mode; `halt` of this process resumes from it.
    pub fn resume_ptr(&self) -> *mut ResumePoint {
        self.resume
    }
}

/// What the platform does after a successful halt.
#[derive(Debug)]
pub enum HaltOutcome {
    /// Return `status` from the parent's suspended `execute`.
    Resume {
        context: ResumePoint,
        status: ExitStatus,
    },
    /// The chain root exited; enter the replacement shell.
    Respawn(Launch),
}

/// CPU exceptions that kill the process taking them in user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    DivideError,
    Debug,
    Breakpoint,
    Overflow,
    BoundRange,
    InvalidOpcode,
    DeviceNotAvailable,
    InvalidTss,
    SegmentNotPresent,
    StackSegment,
    GeneralProtection,
    PageFault { address: u64 },
    FloatingPoint,
    AlignmentCheck,
    Simd,
}

/// Validated executable, not yet committed to a pid.
struct Image {
    inode: InodeId,
    len: u32,
}

impl<P: Platform, F: FileSystem> Kernel<P, F> {
    /// Load `command` as a new process on `terminal`.
    ///
    /// The new process becomes current and the terminal's frontier; its
    /// parent (the previous frontier) goes to sleep.
    pub fn launch(&mut self, command: &[u8], terminal: TerminalId) -> KResult<Launch> {
        let command = Command::parse(command)?;
        let image = self.validate_image(command.name)?;

        let pid = self.sched.table.allocate()?;
        let entry = match self.load_image(pid, &image) {
            Ok(entry) => entry,
            Err(err) => {
                self.abandon(pid);
                return Err(err);
            }
        };

        let parent = self.sched.frontier(terminal);
        let name = ProgramName::from_slice(command.name)?;
        let args = ArgBuffer::from_slice(command.args)?;
        self.sched
            .arena
            .insert(ProcessRecord::new(pid, terminal, parent, name, args));
        if let Err(err) = self.sched.queue.enroll(pid, &mut self.sched.arena) {
            self.sched.arena.set_state(pid, ProcessState::Zombie);
            self.abandon(pid);
            return Err(err);
        }

        self.sched.set_frontier(terminal, Some(pid));
        self.sched.process_started();
        self.platform.set_kernel_stack(kernel_stack_top(pid));

        log::info!(
            "[PROC] started {} as pid {} on {} (parent {:?})",
            name.as_str(),
            pid,
            terminal,
            parent.map(|p| p.as_u32())
        );

        let record = self
            .sched
            .arena
            .get_mut(pid)
            .ok_or(KernelError::NoCurrentProcess)?;
        Ok(Launch {
            pid,
            frame: UserFrame::new(entry, USER_STACK_TOP),
            resume: &mut record.return_context as *mut ResumePoint,
        })
    }

    /// Start the root shell of a terminal that has never been shown,
    /// without taking the CPU from the interrupted process.
    ///
    /// The shell first runs when a tick selects it: its switch context
    /// lands in the platform trampoline, which collects the pending entry
    /// through [`Kernel::take_pending_entry`].
    pub fn spawn_root(&mut self, terminal: TerminalId) -> KResult<Pid> {
        if self.sched.frontier(terminal).is_some() {
            return Err(KernelError::InvalidArgument);
        }
        let previous = self.sched.current();
        let launch = self.launch(INIT_PROGRAM, terminal)?;
        let context = self.platform.initial_switch_context(kernel_stack_top(launch.pid));
        if let Some(record) = self.sched.arena.get_mut(launch.pid) {
            record.pending_entry = Some(launch.frame);
            record.switch_context = context;
        }

        if let Some(previous) = previous {
            self.sched.queue.set_current(previous);
            self.switcher.bind_program(&mut self.platform, previous);
            self.platform.set_kernel_stack(kernel_stack_top(previous));
        }
        Ok(launch.pid)
    }

    /// Entry frame of the current process if it has never run yet.
    pub fn take_pending_entry(&mut self) -> Option<(UserFrame, *mut ResumePoint)> {
        let record = self.sched.current_record_mut().ok()?;
        let frame = record.pending_entry.take()?;
        Some((frame, &mut record.return_context as *mut ResumePoint))
    }

    /// Terminate the current terminal's frontier process with `status`.
    pub fn halt(&mut self, status: ExitStatus) -> KResult<HaltOutcome> {
        let current = self.sched.current().ok_or(KernelError::NoCurrentProcess)?;
        let terminal = self.sched.current_record()?.terminal;
        let finished = self.sched.frontier(terminal).unwrap_or(current);

        self.close_files(finished);

        let record = self
            .sched
            .arena
            .get(finished)
            .ok_or(KernelError::NoCurrentProcess)?;
        let (parent, context, name) = (record.parent, record.return_context, record.name);

        self.sched.set_frontier(terminal, parent);
        self.sched.table.release(finished)?;
        self.sched.queue.retire(finished, &mut self.sched.arena)?;
        self.sched.process_ended();

        log::info!(
            "[PROC] pid {} ({}) halted with status {}",
            finished,
            name.as_str(),
            status.code()
        );

        let Some(parent) = parent else {
            log::info!("[PROC] respawning shell on {}", terminal);
            return self.launch(INIT_PROGRAM, terminal).map(HaltOutcome::Respawn);
        };

        self.switcher.bind_program(&mut self.platform, parent);
        if finished == current {
            self.platform.set_kernel_stack(kernel_stack_top(parent));
        }
        Ok(HaltOutcome::Resume { context, status })
    }

    /// Halt the current process after a CPU fault in user mode.
    ///
    /// The parent's `execute` returns [`ExitStatus::EXCEPTION`].
    pub fn kill_current(&mut self, fault: Fault) -> KResult<HaltOutcome> {
        let current = self.sched.current().ok_or(KernelError::NoCurrentProcess)?;
        log::error!("[FAULT] pid {} killed by {:?}", current, fault);
        self.halt(ExitStatus::EXCEPTION)
    }

    /// Resolve `name` and check it is a loadable executable.
    fn validate_image(&self, name: &[u8]) -> KResult<Image> {
        let entry = self.fs.lookup(name)?;
        if entry.file_type != FileType::Regular {
            return Err(KernelError::NotExecutable);
        }

        let mut magic = [0u8; EXECUTABLE_MAGIC.len()];
        let n = self.fs.read(entry.inode, 0, &mut magic)?;
        if n != magic.len() || magic != EXECUTABLE_MAGIC {
            return Err(KernelError::NotExecutable);
        }

        let len = self.fs.file_len(entry.inode)?;
        if len > MAX_IMAGE_SIZE {
            return Err(KernelError::NotExecutable);
        }
        Ok(Image {
            inode: entry.inode,
            len,
        })
    }

    /// Copy the image into `pid`'s frame and return its entry point.
    fn load_image(&mut self, pid: Pid, image: &Image) -> KResult<u32> {
        self.switcher.bind_program(&mut self.platform, pid);

        let mut header = [0u8; 4];
        let n = self
            .fs
            .read(image.inode, ENTRY_POINT_OFFSET as u32, &mut header)?;
        if n != header.len() {
            return Err(KernelError::NotExecutable);
        }

        let mut chunk = [0u8; LOAD_CHUNK];
        let mut offset = 0u32;
        while offset < image.len {
            let n = self.fs.read(image.inode, offset, &mut chunk)?;
            if n == 0 {
                break;
            }
            let dest = program_phys(pid, IMAGE_LOAD_ADDR + offset)
                .ok_or(KernelError::NotExecutable)?;
            self.platform.write_phys(dest, &chunk[..n]);
            offset += n as u32;
        }
        Ok(u32::from_le_bytes(header))
    }

    /// Undo a launch that failed after claiming `pid`.
    fn abandon(&mut self, pid: Pid) {
        if let Err(err) = self.sched.table.release(pid) {
            log::warn!("[PROC] releasing pid {} after failed launch: {}", pid, err);
        }
        if let Some(current) = self.sched.current() {
            self.switcher.bind_program(&mut self.platform, current);
        }
    }

    /// Run every open descriptor's close operation and empty the table.
    fn close_files(&mut self, pid: Pid) {
        let Some(record) = self.sched.arena.get_mut(pid) else {
            return;
        };
        let terminal = record.terminal;
        let mut open: [Option<FileDescriptor>; MAX_OPEN_FILES] = [None; MAX_OPEN_FILES];
        for (fd, file) in record.files.drain() {
            open[fd] = Some(file);
        }

        for (fd, file) in open.iter().enumerate() {
            if let Some(file) = file {
                let mut ctx = self.io_context(terminal, fd);
                // Stdio refuses to close; nothing to report for it.
                let _ = file.ops().close(&mut ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_args() {
        let command = Command::parse(b"  cat   frame0.txt").unwrap();
        assert_eq!(command.name, b"cat");
        assert_eq!(command.args, b"frame0.txt");
    }

    #[test]
    fn test_parse_stops_at_nul_and_newline() {
        let command = Command::parse(b"ls\0garbage").unwrap();
        assert_eq!(command.name, b"ls");
        assert!(command.args.is_empty());

        let command = Command::parse(b"grep very\n").unwrap();
        assert_eq!(command.args, b"very");
    }

    #[test]
    fn test_parse_rejects_blank_and_long_names() {
        assert_eq!(Command::parse(b""), Err(KernelError::MalformedCommand));
        assert_eq!(Command::parse(b"    "), Err(KernelError::MalformedCommand));
        let long = [b'a'; MAX_NAME_LEN + 1];
        assert_eq!(Command::parse(&long), Err(KernelError::MalformedCommand));
        let exact = [b'a'; MAX_NAME_LEN];
        assert!(Command::parse(&exact).is_ok());
    }

    #[test]
    fn test_parse_rejects_oversized_args() {
        let mut line = b"cat ".to_vec();
        line.extend_from_slice(&[b'x'; crate::config::ARGS_LEN]);
        assert_eq!(Command::parse(&line), Err(KernelError::MalformedCommand));
    }
}
