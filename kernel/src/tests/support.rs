//! Shared test fixtures.
//!
//! A recording [`MockPlatform`], an in-memory boot image builder and a
//! flat user window standing in for a program's memory.

use std::collections::HashMap;

use crate::arch::{Irq, Platform};
use crate::config::{
    ENTRIES_PER_TABLE, LARGE_PAGE_SIZE, NUM_TERMINALS, PAGE_SIZE, PROGRAM_WINDOW, SCREEN_COLS,
};
use crate::fs::ImageFs;
use crate::kernel::Kernel;
use crate::memory::PageEntry;
use crate::scheduler::SwitchContext;
use crate::syscall::UserMemory;
use crate::terminal::TerminalId;

/// Instruction pointer the mock reports for its first-run trampoline.
pub const MOCK_TRAMPOLINE: u64 = 0xFFFF_8000_0010_0000;

/// Physical address of the mock's per-terminal video page tables.
const VIDEO_TABLE_BASE: u32 = 0x0010_0000;

/// Side effects the kernel asked the platform for, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    DirectoryEntry(usize, PageEntry),
    VideoEntry(TerminalId, PageEntry),
    FlushTlb,
    KernelStack(u32),
    RtcRate(u8),
    EnableIrq(Irq),
    DisableIrq(Irq),
    EndOfInterrupt(Irq),
}

/// Host stand-in for the machine.
pub struct MockPlatform {
    /// Shadow of the active page directory.
    pub directory: [PageEntry; ENTRIES_PER_TABLE],
    /// Entry 0 of each terminal's video page table.
    pub video_entries: [PageEntry; NUM_TERMINALS],
    /// Sparse physical memory; unwritten bytes read as zero.
    pub memory: HashMap<u32, u8>,
    pub events: Vec<PlatformEvent>,
    /// Hardware cursor as (row, col).
    pub cursor: (usize, usize),
    /// Last kernel stack top handed to the CPU.
    pub kernel_stack: Option<u32>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            directory: [PageEntry::empty(); ENTRIES_PER_TABLE],
            video_entries: [PageEntry::empty(); NUM_TERMINALS],
            memory: HashMap::new(),
            events: Vec::new(),
            cursor: (0, 0),
            kernel_stack: None,
        }
    }

    /// Copy of the 4 KB page at `addr`.
    pub fn page(&self, addr: u32) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.read_phys(addr, &mut buf);
        buf
    }

    /// Characters of one text row in the page at `page`.
    pub fn text_row(&self, page: u32, row: usize) -> String {
        let mut cells = vec![0u8; SCREEN_COLS * 2];
        self.read_phys(page + (row * SCREEN_COLS * 2) as u32, &mut cells);
        cells
            .chunks_exact(2)
            .map(|cell| if cell[0] == 0 { ' ' } else { cell[0] as char })
            .collect()
    }

    /// Count recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&PlatformEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    fn install_directory_entry(&mut self, slot: usize, entry: PageEntry) {
        self.directory[slot] = entry;
        self.events.push(PlatformEvent::DirectoryEntry(slot, entry));
    }

    fn install_video_entry(&mut self, terminal: TerminalId, entry: PageEntry) {
        self.video_entries[terminal.index()] = entry;
        self.events.push(PlatformEvent::VideoEntry(terminal, entry));
    }

    fn video_table_addr(&self, terminal: TerminalId) -> u32 {
        VIDEO_TABLE_BASE + (terminal.index() * PAGE_SIZE) as u32
    }

    fn flush_tlb(&mut self) {
        self.events.push(PlatformEvent::FlushTlb);
    }

    fn set_kernel_stack(&mut self, top: u32) {
        self.kernel_stack = Some(top);
        self.events.push(PlatformEvent::KernelStack(top));
    }

    fn write_phys(&mut self, addr: u32, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.memory.insert(addr + i as u32, *byte);
        }
    }

    fn read_phys(&self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.memory.get(&(addr + i as u32)).copied().unwrap_or(0);
        }
    }

    fn copy_phys(&mut self, from: u32, to: u32, len: usize) {
        let mut tmp = vec![0u8; len];
        self.read_phys(from, &mut tmp);
        self.write_phys(to, &tmp);
    }

    fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor = (row, col);
    }

    fn set_rtc_rate(&mut self, rate: u8) {
        self.events.push(PlatformEvent::RtcRate(rate));
    }

    fn enable_irq(&mut self, irq: Irq) {
        self.events.push(PlatformEvent::EnableIrq(irq));
    }

    fn disable_irq(&mut self, irq: Irq) {
        self.events.push(PlatformEvent::DisableIrq(irq));
    }

    fn end_of_interrupt(&mut self, irq: Irq) {
        self.events.push(PlatformEvent::EndOfInterrupt(irq));
    }

    fn initial_switch_context(&self, kernel_stack_top: u32) -> SwitchContext {
        SwitchContext {
            rsp: kernel_stack_top as u64,
            rip: MOCK_TRAMPOLINE,
            ..SwitchContext::default()
        }
    }
}

// ========================================
// Boot image
// ========================================

const BLOCK: usize = 4096;

enum Entry {
    Directory,
    Device,
    File(Vec<u8>),
}

/// Builds boot-module images in the on-disk layout `ImageFs` parses.
#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<(Vec<u8>, Entry)>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(mut self, name: &[u8]) -> Self {
        self.entries.push((name.to_vec(), Entry::Directory));
        self
    }

    pub fn device(mut self, name: &[u8]) -> Self {
        self.entries.push((name.to_vec(), Entry::Device));
        self
    }

    pub fn file(mut self, name: &[u8], contents: &[u8]) -> Self {
        self.entries.push((name.to_vec(), Entry::File(contents.to_vec())));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let files: Vec<&Vec<u8>> = self
            .entries
            .iter()
            .filter_map(|(_, e)| match e {
                Entry::File(data) => Some(data),
                _ => None,
            })
            .collect();
        let inode_count = files.len();
        let data_blocks: usize = files.iter().map(|f| f.len().div_ceil(BLOCK)).sum();

        let mut image = vec![0u8; (1 + inode_count + data_blocks) * BLOCK];
        put_u32(&mut image, 0, self.entries.len() as u32);
        put_u32(&mut image, 4, inode_count as u32);
        put_u32(&mut image, 8, data_blocks as u32);

        let mut next_inode = 0usize;
        let mut next_block = 0usize;
        for (index, (name, entry)) in self.entries.iter().enumerate() {
            let base = 64 + index * 64;
            image[base..base + name.len()].copy_from_slice(name);
            let (tag, inode) = match entry {
                Entry::Device => (0, 0),
                Entry::Directory => (1, 0),
                Entry::File(data) => {
                    let inode = next_inode;
                    next_inode += 1;
                    let inode_base = (1 + inode) * BLOCK;
                    put_u32(&mut image, inode_base, data.len() as u32);
                    for (i, chunk) in data.chunks(BLOCK).enumerate() {
                        put_u32(&mut image, inode_base + 4 + i * 4, next_block as u32);
                        let at = (1 + inode_count + next_block) * BLOCK;
                        image[at..at + chunk.len()].copy_from_slice(chunk);
                        next_block += 1;
                    }
                    (2, inode as u32)
                }
            };
            put_u32(&mut image, base + 32, tag);
            put_u32(&mut image, base + 36, inode);
        }
        image
    }
}

fn put_u32(image: &mut [u8], at: usize, value: u32) {
    image[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// An executable image: magic, entry point at offset 24, then `body`.
pub fn executable(entry: u32, body: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; 40];
    image[..4].copy_from_slice(&crate::config::EXECUTABLE_MAGIC);
    image[24..28].copy_from_slice(&entry.to_le_bytes());
    image.extend_from_slice(body);
    image
}

/// Entry points of the fixture programs.
pub const SHELL_ENTRY: u32 = 0x0804_8100;
pub const LS_ENTRY: u32 = 0x0804_8200;
pub const COUNTER_ENTRY: u32 = 0x0804_8300;

/// The file set the scenario tests boot with.
pub fn fixture_image() -> Vec<u8> {
    ImageBuilder::new()
        .directory(b".")
        .device(b"rtc")
        .file(b"shell", &executable(SHELL_ENTRY, b"shell body"))
        .file(b"ls", &executable(LS_ENTRY, b"ls body"))
        .file(b"counter", &executable(COUNTER_ENTRY, &[0xCC; 5000]))
        .file(b"frame0.txt", b"/\\/\\/\\ fish")
        .file(b"short", b"\x7fEL")
        .build()
}

pub type TestKernel = Kernel<MockPlatform, ImageFs<'static>>;

/// Kernel over the fixture image with no process started.
pub fn kernel() -> TestKernel {
    let image: &'static [u8] = Box::leak(fixture_image().into_boxed_slice());
    let fs = ImageFs::new(image).expect("fixture image parses");
    Kernel::new(MockPlatform::new(), fs)
}

/// Kernel with terminal 0's root shell running.
pub fn booted() -> TestKernel {
    let mut kernel = kernel();
    kernel
        .launch(b"shell", TerminalId::new(0))
        .expect("root shell launches");
    kernel
}

// ========================================
// User memory
// ========================================

/// Flat copy of the 4 MB program window.
pub struct TestUserMemory {
    window: Vec<u8>,
}

impl TestUserMemory {
    pub fn new() -> Self {
        Self {
            window: vec![0u8; LARGE_PAGE_SIZE as usize],
        }
    }

    /// Store `bytes` at user address `addr`.
    pub fn put(&mut self, addr: u32, bytes: &[u8]) {
        let at = (addr - PROGRAM_WINDOW) as usize;
        self.window[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Read `len` bytes at user address `addr`.
    pub fn get(&self, addr: u32, len: usize) -> &[u8] {
        let at = (addr - PROGRAM_WINDOW) as usize;
        &self.window[at..at + len]
    }
}

impl UserMemory for TestUserMemory {
    fn bytes(&self, addr: u32, len: usize) -> &[u8] {
        self.get(addr, len)
    }

    fn bytes_mut(&mut self, addr: u32, len: usize) -> &mut [u8] {
        let at = (addr - PROGRAM_WINDOW) as usize;
        &mut self.window[at..at + len]
    }
}
