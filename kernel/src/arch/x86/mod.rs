//! Bare-metal x86_64 platform.
//!
//! Physical memory is reached through the bootloader's offset mapping.
//! The 4 MB slots of the process model are emulated with pairs of 2 MB
//! entries in the page directory covering the first GiB of user space;
//! each terminal's video window is a static 4 KB page table.

pub mod gdt;
pub mod interrupts;
pub mod keyboard;
pub mod serial;
pub mod switch;
pub mod syscall;

use core::ptr::{addr_of, addr_of_mut};
use core::sync::atomic::{AtomicU64, Ordering};

use bootloader_api::info::{MemoryRegionKind, MemoryRegions};
use x86_64::instructions::port::Port;
use x86_64::registers::control::Cr3;
use x86_64::structures::paging::{OffsetPageTable, PageTable, PageTableFlags, Translate};
use x86_64::{PhysAddr, VirtAddr};

use crate::arch::{Irq, Platform};
use crate::config::{
    INIT_PROGRAM, KERNEL_REGION_TOP, KERNEL_STACK_SIZE, LARGE_PAGE_SIZE, MAX_PROCESSES,
    NUM_TERMINALS, PAGE_SIZE, PROGRAM_FRAME_BASE, PROGRAM_FRAME_SIZE, SCREEN_COLS,
};
use crate::fs::ImageFs;
use crate::kernel::Kernel;
use crate::memory::{PageEntry, PageFlags};
use crate::scheduler::SwitchContext;
use crate::sync::KernelCell;
use crate::terminal::TerminalId;

/// The kernel, shared by the syscall gate and the interrupt handlers.
pub static KERNEL: KernelCell<Kernel<BareMetal, ImageFs<'static>>> = KernelCell::new();

/// Virtual base of the bootloader's physical memory mapping.
static PHYS_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Half of a 4 MB slot: the size of one x86_64 huge page.
const HUGE_PAGE_SIZE: u64 = LARGE_PAGE_SIZE as u64 / 2;

const VGA_INDEX: u16 = 0x3D4;
const VGA_DATA: u16 = 0x3D5;

static mut USER_PDPT: PageTable = PageTable::new();
static mut USER_DIRECTORY: PageTable = PageTable::new();
static mut VIDEO_TABLES: [PageTable; NUM_TERMINALS] = [const { PageTable::new() }; NUM_TERMINALS];

/// Kernel-visible address of a physical address.
pub fn phys_to_virt(addr: u32) -> u64 {
    PHYS_OFFSET.load(Ordering::Relaxed) + addr as u64
}

/// Boot-time failures before the kernel can run a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// Kernel stacks or program frames overlap memory the firmware uses.
    ReservedRegionUnavailable,
    /// A static paging structure has no physical address below 4 GiB.
    Untranslatable,
    /// The lower half is mapped with huge pages by the bootloader.
    LowerHalfInUse,
}

/// Machine implementation of [`Platform`].
pub struct BareMetal {
    /// Level-2 table for virtual `[0, 1 GiB)`.
    directory: *mut PageTable,
    video_tables: [*mut PageTable; NUM_TERMINALS],
    video_table_phys: [u32; NUM_TERMINALS],
}

// SAFETY: single core; the tables are only touched under the kernel lock
// with interrupts masked.
unsafe impl Send for BareMetal {}

impl BareMetal {
    /// Take over the lower half of the active address space.
    ///
    /// # Safety
    ///
    /// `phys_offset` must be the bootloader's physical memory mapping and
    /// the active page tables must be the bootloader's.
    pub unsafe fn new(phys_offset: u64, regions: &MemoryRegions) -> Result<Self, BootError> {
        PHYS_OFFSET.store(phys_offset, Ordering::Relaxed);
        if !reserved_region_usable(regions) {
            return Err(BootError::ReservedRegionUnavailable);
        }

        let (level_4_frame, _) = Cr3::read();
        let level_4 = (phys_offset + level_4_frame.start_address().as_u64()) as *mut PageTable;

        let (pdpt_phys, directory_phys, video_phys) = {
            // SAFETY: guaranteed by the caller.
            let mapper = unsafe { OffsetPageTable::new(&mut *level_4, VirtAddr::new(phys_offset)) };
            let phys = |table: *const PageTable| {
                mapper
                    .translate_addr(VirtAddr::from_ptr(table))
                    .map(|addr| addr.as_u64())
                    .ok_or(BootError::Untranslatable)
            };
            let mut video = [0u32; NUM_TERMINALS];
            for (i, slot) in video.iter_mut().enumerate() {
                // SAFETY: only the address is taken.
                let table = unsafe { addr_of!(VIDEO_TABLES[i]) };
                *slot = u32::try_from(phys(table)?).map_err(|_| BootError::Untranslatable)?;
            }
            // SAFETY: only the addresses are taken.
            let (pdpt, directory) = unsafe { (addr_of!(USER_PDPT), addr_of!(USER_DIRECTORY)) };
            (phys(pdpt)?, phys(directory)?, video)
        };

        let table_flags =
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE;
        // SAFETY: boot is single-threaded and the statics are ours alone.
        let directory = unsafe {
            let level_4 = &mut *level_4;
            let pdpt = descend(&mut level_4[0], addr_of_mut!(USER_PDPT), pdpt_phys, phys_offset, table_flags)?;
            descend(&mut (*pdpt)[0], addr_of_mut!(USER_DIRECTORY), directory_phys, phys_offset, table_flags)?
        };

        let mut video_tables = [core::ptr::null_mut(); NUM_TERMINALS];
        for (i, slot) in video_tables.iter_mut().enumerate() {
            // SAFETY: as above.
            *slot = unsafe { addr_of_mut!(VIDEO_TABLES[i]) };
        }

        log::info!("[BOOT] user page directory at {:#x}", directory as u64);
        Ok(Self {
            directory,
            video_tables,
            video_table_phys: video_phys,
        })
    }
}

/// Follow `entry` to the next-level table, installing `ours` when unused.
unsafe fn descend(
    entry: &mut x86_64::structures::paging::PageTableEntry,
    ours: *mut PageTable,
    ours_phys: u64,
    phys_offset: u64,
    flags: PageTableFlags,
) -> Result<*mut PageTable, BootError> {
    if entry.is_unused() {
        entry.set_addr(PhysAddr::new(ours_phys), flags);
        return Ok(ours);
    }
    if entry.flags().contains(PageTableFlags::HUGE_PAGE) {
        return Err(BootError::LowerHalfInUse);
    }
    entry.set_flags(entry.flags() | flags);
    Ok((phys_offset + entry.addr().as_u64()) as *mut PageTable)
}

/// Are the kernel stacks and every program frame in usable RAM?
fn reserved_region_usable(regions: &MemoryRegions) -> bool {
    let low = (KERNEL_REGION_TOP - MAX_PROCESSES as u32 * KERNEL_STACK_SIZE) as u64;
    let high = (PROGRAM_FRAME_BASE + MAX_PROCESSES as u32 * PROGRAM_FRAME_SIZE) as u64;
    (low..high).step_by(PAGE_SIZE).all(|addr| {
        regions
            .iter()
            .any(|r| r.kind == MemoryRegionKind::Usable && r.start <= addr && addr + PAGE_SIZE as u64 <= r.end)
    })
}

fn table_flags(flags: PageFlags) -> PageTableFlags {
    let mut out = PageTableFlags::empty();
    if flags.contains(PageFlags::PRESENT) {
        out |= PageTableFlags::PRESENT;
    }
    if flags.contains(PageFlags::WRITABLE) {
        out |= PageTableFlags::WRITABLE;
    }
    if flags.contains(PageFlags::USER) {
        out |= PageTableFlags::USER_ACCESSIBLE;
    }
    out
}

impl Platform for BareMetal {
    fn install_directory_entry(&mut self, slot: usize, entry: PageEntry) {
        // SAFETY: the directory is ours for the kernel's lifetime.
        let directory = unsafe { &mut *self.directory };
        let (low, high) = (slot * 2, slot * 2 + 1);
        if high >= 512 {
            log::error!("[MEM] directory slot {} outside the user directory", slot);
            return;
        }
        let Some(addr) = entry.addr() else {
            directory[low].set_unused();
            directory[high].set_unused();
            return;
        };
        let flags = table_flags(entry.flags());
        if entry.flags().contains(PageFlags::LARGE) {
            let huge = flags | PageTableFlags::HUGE_PAGE;
            directory[low].set_addr(PhysAddr::new(addr as u64), huge);
            directory[high].set_addr(PhysAddr::new(addr as u64 + HUGE_PAGE_SIZE), huge);
        } else {
            directory[low].set_addr(PhysAddr::new(addr as u64), flags);
            directory[high].set_unused();
        }
    }

    fn install_video_entry(&mut self, terminal: TerminalId, entry: PageEntry) {
        // SAFETY: one static table per terminal.
        let table = unsafe { &mut *self.video_tables[terminal.index()] };
        match entry.addr() {
            Some(addr) => table[0].set_addr(PhysAddr::new(addr as u64), table_flags(entry.flags())),
            None => table[0].set_unused(),
        }
    }

    fn video_table_addr(&self, terminal: TerminalId) -> u32 {
        self.video_table_phys[terminal.index()]
    }

    fn flush_tlb(&mut self) {
        x86_64::instructions::tlb::flush_all();
    }

    fn set_kernel_stack(&mut self, top: u32) {
        gdt::set_kernel_stack(VirtAddr::new(phys_to_virt(top)));
    }

    fn write_phys(&mut self, addr: u32, bytes: &[u8]) {
        // SAFETY: the offset mapping covers all physical memory.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), phys_to_virt(addr) as *mut u8, bytes.len());
        }
    }

    fn read_phys(&self, addr: u32, buf: &mut [u8]) {
        // SAFETY: as above.
        unsafe {
            core::ptr::copy_nonoverlapping(phys_to_virt(addr) as *const u8, buf.as_mut_ptr(), buf.len());
        }
    }

    fn copy_phys(&mut self, from: u32, to: u32, len: usize) {
        // SAFETY: as above; `copy` tolerates overlap.
        unsafe {
            core::ptr::copy(phys_to_virt(from) as *const u8, phys_to_virt(to) as *mut u8, len);
        }
    }

    fn set_cursor(&mut self, row: usize, col: usize) {
        let position = (row * SCREEN_COLS + col) as u16;
        // SAFETY: VGA CRT controller ports.
        unsafe {
            let mut index = Port::<u8>::new(VGA_INDEX);
            let mut data = Port::<u8>::new(VGA_DATA);
            index.write(0x0F);
            data.write((position & 0xFF) as u8);
            index.write(0x0E);
            data.write((position >> 8) as u8);
        }
    }

    fn set_rtc_rate(&mut self, rate: u8) {
        interrupts::set_rtc_rate(rate);
    }

    fn enable_irq(&mut self, irq: Irq) {
        interrupts::enable_irq(irq);
    }

    fn disable_irq(&mut self, irq: Irq) {
        interrupts::disable_irq(irq);
    }

    fn end_of_interrupt(&mut self, irq: Irq) {
        interrupts::end_of_interrupt(irq);
    }

    fn initial_switch_context(&self, kernel_stack_top: u32) -> SwitchContext {
        SwitchContext {
            // Entered by jump: leave the slot a call would have pushed.
            rsp: phys_to_virt(kernel_stack_top) - 8,
            rip: switch::first_run as usize as u64,
            ..SwitchContext::default()
        }
    }
}

/// Bring up descriptor tables, interrupts and the kernel, then run the
/// first shell on terminal 0. Never returns.
///
/// # Safety
///
/// Called once from the boot entry with the bootloader's page tables active.
pub unsafe fn start(phys_offset: u64, regions: &MemoryRegions, image: &'static [u8]) -> ! {
    gdt::init();
    interrupts::init();

    // SAFETY: guaranteed by the caller.
    let platform = match unsafe { BareMetal::new(phys_offset, regions) } {
        Ok(platform) => platform,
        Err(err) => {
            log::error!("[BOOT] platform setup failed: {:?}", err);
            interrupts::hlt_loop();
        }
    };
    let fs = match ImageFs::new(image) {
        Ok(fs) => fs,
        Err(err) => {
            log::error!("[BOOT] file system image rejected: {}", err);
            interrupts::hlt_loop();
        }
    };
    KERNEL.init(Kernel::new(platform, fs));

    match KERNEL.with(|kernel| kernel.launch(INIT_PROGRAM, TerminalId::new(0))) {
        Some(Ok(launch)) => switch::enter_fresh(&launch),
        Some(Err(err)) => log::error!("[BOOT] first shell failed: {}", err),
        None => log::error!("[BOOT] kernel missing"),
    }
    interrupts::hlt_loop()
}
