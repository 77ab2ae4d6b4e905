//! Kernel configuration constants.
//!
//! This module contains compile-time configuration for the kernel.
//! Values here fix the memory layout of user programs, the size of the
//! process pool and the terminal geometry.

/// Maximum number of simultaneously live processes.
pub const MAX_PROCESSES: usize = 6;

/// Number of virtual terminals.
pub const NUM_TERMINALS: usize = 3;

/// File descriptor slots per process (0 and 1 are stdin/stdout).
pub const MAX_OPEN_FILES: usize = 8;

/// Maximum length of a program or file name in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Size of the per-process argument buffer (one byte kept for the NUL).
pub const ARGS_LEN: usize = 128;

/// Page size (4 KB).
pub const PAGE_SIZE: usize = 4096;

/// Large page size (4 MB), the granularity of the program slot.
pub const LARGE_PAGE_SIZE: u32 = 4 * 1024 * 1024;

/// Entries in one page directory / page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Page-directory index of the program slot (virtual 128 MB).
pub const PROGRAM_SLOT: usize = 32;

/// Page-directory index of the video window slot (virtual 132 MB).
pub const VIDEO_SLOT: usize = 33;

/// Physical address of the first program frame (pid 0).
pub const PROGRAM_FRAME_BASE: u32 = 8 * 1024 * 1024;

/// Size of one program frame.
pub const PROGRAM_FRAME_SIZE: u32 = LARGE_PAGE_SIZE;

/// Virtual base of the program window.
pub const PROGRAM_WINDOW: u32 = 128 * 1024 * 1024;

/// Virtual address every executable image is loaded at.
pub const IMAGE_LOAD_ADDR: u32 = 0x0804_8000;

/// Byte offset of the entry-point field inside the image header.
pub const ENTRY_POINT_OFFSET: usize = 24;

/// Magic bytes that open every executable image.
pub const EXECUTABLE_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Largest image that fits between the load address and the end of the frame.
pub const MAX_IMAGE_SIZE: u32 = PROGRAM_WINDOW + LARGE_PAGE_SIZE - IMAGE_LOAD_ADDR;

/// Initial user stack pointer (last word of the program window).
pub const USER_STACK_TOP: u32 = PROGRAM_WINDOW + LARGE_PAGE_SIZE - 4;

/// User virtual address the video window is exposed at.
pub const VIDMAP_ADDR: u32 = PROGRAM_WINDOW + LARGE_PAGE_SIZE;

/// Top of the kernel's 4 MB region; per-process kernel stacks grow down from here.
pub const KERNEL_REGION_TOP: u32 = 8 * 1024 * 1024;

/// Kernel stack (and control block area) per process (8 KB).
pub const KERNEL_STACK_SIZE: u32 = 8 * 1024;

/// Bytes kept free above each kernel stack top.
pub const KERNEL_STACK_GUARD: u32 = 16;

/// Physical address of the VGA text page.
pub const VIDEO_MEMORY: u32 = 0xB8000;

/// Physical back-buffer page of each terminal.
pub const TERMINAL_BACK_BUFFERS: [u32; NUM_TERMINALS] = [0xB9000, 0xBA000, 0xBB000];

/// Text mode columns.
pub const SCREEN_COLS: usize = 80;

/// Text mode rows.
pub const SCREEN_ROWS: usize = 25;

/// Attribute byte written with every character (light grey on black).
pub const TEXT_ATTRIBUTE: u8 = 0x07;

/// Line-editor buffer size per terminal.
pub const LINE_BUFFER_LEN: usize = 128;

/// Command-history entries kept per terminal.
pub const HISTORY_SIZE: usize = 5;

/// Timer interrupt frequency in Hz (one scheduling quantum per tick).
pub const TIMER_HZ: u32 = 50;

/// PIT input clock in Hz.
pub const PIT_BASE_HZ: u32 = 1_193_182;

/// Lowest RTC frequency a process may request.
pub const RTC_MIN_HZ: u32 = 2;

/// Highest RTC frequency a process may request.
pub const RTC_MAX_HZ: u32 = 1024;

/// Program launched as the root of every terminal's chain.
pub const INIT_PROGRAM: &[u8] = b"shell";

/// Exit status reported to the parent when a process is killed by a CPU fault.
pub const EXCEPTION_STATUS: u32 = 256;
