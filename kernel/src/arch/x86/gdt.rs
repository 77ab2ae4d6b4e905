//! Global Descriptor Table (GDT) setup.
//!
//! Kernel and user segments plus the TSS. The TSS privilege stack 0 is
//! rewritten on every switch so a trap from user mode lands on the running
//! process's own kernel stack.

use core::ptr::{addr_of, addr_of_mut};

use lazy_static::lazy_static;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

/// Stack size for the double fault handler.
pub const INTERRUPT_STACK_SIZE: usize = 4096 * 5;

/// Double fault stack index in TSS.
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

/// Stack for double fault handler.
static mut DOUBLE_FAULT_STACK: [u8; INTERRUPT_STACK_SIZE] = [0; INTERRUPT_STACK_SIZE];

/// The Task State Segment. Mutable: `rsp0` follows the running process.
static mut TSS: TaskStateSegment = TaskStateSegment::new();

lazy_static! {
    /// GDT with segment selectors.
    static ref GDT: (GlobalDescriptorTable, Selectors) = {
        let mut gdt = GlobalDescriptorTable::new();

        // Kernel code segment (selector 0x08)
        let kernel_code = gdt.append(Descriptor::kernel_code_segment());

        // Kernel data segment (selector 0x10)
        let kernel_data = gdt.append(Descriptor::kernel_data_segment());

        // User data segment (selector 0x18, with ring 3 RPL = 0x1B)
        let user_data = gdt.append(Descriptor::user_data_segment());

        // User code segment (selector 0x20, with ring 3 RPL = 0x23)
        let user_code = gdt.append(Descriptor::user_code_segment());

        // SAFETY: TSS is a static that outlives the GDT; only rsp0 changes later.
        let tss = gdt.append(unsafe { Descriptor::tss_segment_unchecked(addr_of!(TSS)) });

        (gdt, Selectors {
            kernel_code,
            kernel_data,
            user_code,
            user_data,
            tss,
        })
    };
}

/// Segment selectors.
pub struct Selectors {
    pub kernel_code: SegmentSelector,
    pub kernel_data: SegmentSelector,
    pub user_code: SegmentSelector,
    pub user_data: SegmentSelector,
    pub tss: SegmentSelector,
}

/// Initialize the GDT.
///
/// Must run once, before the IDT is loaded.
pub fn init() {
    use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
    use x86_64::instructions::tables::load_tss;

    // SAFETY: single-threaded boot; nothing reads the TSS before load_tss.
    unsafe {
        let tss = &mut *addr_of_mut!(TSS);
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
            VirtAddr::from_ptr(addr_of!(DOUBLE_FAULT_STACK)) + INTERRUPT_STACK_SIZE as u64;
    }

    GDT.0.load();

    unsafe {
        // Reload code segment
        CS::set_reg(GDT.1.kernel_code);

        // Load data segments
        DS::set_reg(GDT.1.kernel_data);
        ES::set_reg(GDT.1.kernel_data);
        SS::set_reg(GDT.1.kernel_data);

        // Load TSS
        load_tss(GDT.1.tss);
    }
}

/// Stack the CPU switches to on a trap from user mode.
pub fn set_kernel_stack(top: VirtAddr) {
    // SAFETY: called with interrupts masked; the CPU only reads rsp0 on a
    // ring transition, which cannot happen concurrently.
    unsafe {
        (*addr_of_mut!(TSS)).privilege_stack_table[0] = top;
    }
}

/// Get the user code selector.
pub fn user_code_selector() -> SegmentSelector {
    GDT.1.user_code
}

/// Get the user data selector.
pub fn user_data_selector() -> SegmentSelector {
    GDT.1.user_data
}
