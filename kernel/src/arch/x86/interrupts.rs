//! Interrupt handling.
//!
//! IDT, the chained 8259 PICs, the PIT and the RTC periodic interrupt.
//!
//! # Vectors
//!
//! - 0..=31: CPU exceptions. Taken in user mode they kill the process.
//! - 32 (IRQ 0): timer, drives preemption.
//! - 33 (IRQ 1): keyboard.
//! - 40 (IRQ 8): RTC.
//! - 0x80: system call gate, callable from ring 3.

use lazy_static::lazy_static;
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::port::Port;
use x86_64::registers::control::Cr2;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::arch::Irq;
use crate::config::{PIT_BASE_HZ, TIMER_HZ};
use crate::process::{Fault, HaltOutcome};

use super::{gdt, keyboard, switch, syscall, KERNEL};

/// PIC1 offset (IRQ 0-7 mapped to interrupts 32-39).
pub const PIC1_OFFSET: u8 = 32;

/// PIC2 offset (IRQ 8-15 mapped to interrupts 40-47).
pub const PIC2_OFFSET: u8 = 40;

/// Software interrupt used for system calls.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// The chained PICs (master and slave).
static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC1_OFFSET, PIC2_OFFSET) });

const PIC1_DATA: u16 = 0x21;
const PIC2_DATA: u16 = 0xA1;
const PIT_COMMAND: u16 = 0x43;
const PIT_CHANNEL0: u16 = 0x40;
const CMOS_SELECT: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;
const KEYBOARD_DATA: u16 = 0x60;

/// CMOS register select with NMI disabled.
const RTC_REG_A: u8 = 0x8A;
const RTC_REG_B: u8 = 0x8B;
const RTC_REG_C: u8 = 0x0C;

lazy_static! {
    /// The interrupt descriptor table.
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        // CPU exceptions
        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.debug.set_handler_fn(debug_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.bound_range_exceeded.set_handler_fn(bound_range_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.device_not_available.set_handler_fn(device_not_available_handler);
        idt.invalid_tss.set_handler_fn(invalid_tss_handler);
        idt.segment_not_present.set_handler_fn(segment_not_present_handler);
        idt.stack_segment_fault.set_handler_fn(stack_segment_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.x87_floating_point.set_handler_fn(floating_point_handler);
        idt.alignment_check.set_handler_fn(alignment_check_handler);
        idt.simd_floating_point.set_handler_fn(simd_handler);

        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        }

        // Hardware interrupts
        idt[PIC1_OFFSET + Irq::Timer.line()].set_handler_fn(timer_interrupt_handler);
        idt[PIC1_OFFSET + Irq::Keyboard.line()].set_handler_fn(keyboard_interrupt_handler);
        idt[PIC1_OFFSET + Irq::Rtc.line()].set_handler_fn(rtc_interrupt_handler);

        // SAFETY: syscall::entry is a naked trap stub ending in iretq.
        unsafe {
            idt[SYSCALL_VECTOR]
                .set_handler_addr(VirtAddr::new(syscall::entry as usize as u64))
                .set_privilege_level(PrivilegeLevel::Ring3);
        }

        idt
    };
}

/// Load the IDT, remap the PICs with every line masked, and start the
/// PIT and the RTC periodic interrupt. Lines are unmasked by the kernel.
pub fn init() {
    IDT.load();

    // SAFETY: boot-time port I/O with interrupts disabled.
    unsafe {
        PICS.lock().initialize();
        Port::<u8>::new(PIC1_DATA).write(0xFF);
        Port::<u8>::new(PIC2_DATA).write(0xFF);
    }
    start_pit(TIMER_HZ);
    enable_rtc_periodic();
    log::info!("[INT] IDT loaded, PIT at {} Hz", TIMER_HZ);
}

/// Program PIT channel 0 as a rate generator.
fn start_pit(hz: u32) {
    let divisor = (PIT_BASE_HZ / hz) as u16;
    // SAFETY: standard PIT ports.
    unsafe {
        Port::<u8>::new(PIT_COMMAND).write(0x36);
        let mut channel0 = Port::<u8>::new(PIT_CHANNEL0);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }
}

/// Set the periodic interrupt enable bit in RTC register B.
fn enable_rtc_periodic() {
    // SAFETY: standard CMOS ports, interrupts disabled.
    unsafe {
        let mut select = Port::<u8>::new(CMOS_SELECT);
        let mut data = Port::<u8>::new(CMOS_DATA);
        select.write(RTC_REG_B);
        let prev = data.read();
        select.write(RTC_REG_B);
        data.write(prev | 0x40);
    }
}

/// Write the rate selector into RTC register A.
pub fn set_rtc_rate(rate: u8) {
    x86_64::instructions::interrupts::without_interrupts(|| {
        // SAFETY: standard CMOS ports.
        unsafe {
            let mut select = Port::<u8>::new(CMOS_SELECT);
            let mut data = Port::<u8>::new(CMOS_DATA);
            select.write(RTC_REG_A);
            let prev = data.read();
            select.write(RTC_REG_A);
            data.write((prev & 0xF0) | (rate & 0x0F));
        }
    });
}

/// Unmask an IRQ line.
pub fn enable_irq(irq: Irq) {
    update_mask(irq, |mask, bit| mask & !bit);
}

/// Mask an IRQ line.
pub fn disable_irq(irq: Irq) {
    update_mask(irq, |mask, bit| mask | bit);
}

fn update_mask(irq: Irq, f: impl FnOnce(u8, u8) -> u8) {
    let line = irq.line();
    let (port, bit) = if line < 8 {
        (PIC1_DATA, 1 << line)
    } else {
        (PIC2_DATA, 1 << (line - 8))
    };
    let _pics = PICS.lock();
    // SAFETY: PIC data ports, serialized by the PICS lock.
    unsafe {
        let mut data = Port::<u8>::new(port);
        let mask = data.read();
        data.write(f(mask, bit));
    }
}

/// Send end-of-interrupt for an IRQ line.
pub fn end_of_interrupt(irq: Irq) {
    // SAFETY: the vector belongs to the remapped PIC range.
    unsafe {
        PICS.lock().notify_end_of_interrupt(PIC1_OFFSET + irq.line());
    }
}

/// Halt loop.
pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

// Exception Handlers

/// Kill the faulting process, or stop the machine if the kernel faulted.
fn user_fault(stack_frame: &InterruptStackFrame, fault: Fault) -> ! {
    if stack_frame.code_segment.rpl() != PrivilegeLevel::Ring3 {
        panic!("EXCEPTION in kernel mode: {:?}\n{:#?}", fault, stack_frame);
    }
    match KERNEL.with(|kernel| kernel.kill_current(fault)) {
        Some(Ok(HaltOutcome::Resume { context, status })) => switch::resume_parent(context, status),
        Some(Ok(HaltOutcome::Respawn(launch))) => switch::enter_fresh(&launch),
        Some(Err(err)) => panic!("[FAULT] cannot recover from {:?}: {}", fault, err),
        None => panic!("[FAULT] {:?} before the kernel was initialized", fault),
    }
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::DivideError);
}

extern "x86-interrupt" fn debug_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::Debug);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::Breakpoint);
}

extern "x86-interrupt" fn overflow_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::Overflow);
}

extern "x86-interrupt" fn bound_range_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::BoundRange);
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::InvalidOpcode);
}

extern "x86-interrupt" fn device_not_available_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::DeviceNotAvailable);
}

extern "x86-interrupt" fn invalid_tss_handler(stack_frame: InterruptStackFrame, _error_code: u64) {
    user_fault(&stack_frame, Fault::InvalidTss);
}

extern "x86-interrupt" fn segment_not_present_handler(stack_frame: InterruptStackFrame, _error_code: u64) {
    user_fault(&stack_frame, Fault::SegmentNotPresent);
}

extern "x86-interrupt" fn stack_segment_handler(stack_frame: InterruptStackFrame, _error_code: u64) {
    user_fault(&stack_frame, Fault::StackSegment);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    user_fault(&stack_frame, Fault::GeneralProtection);
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: PageFaultErrorCode,
) {
    let address = Cr2::read_raw();
    user_fault(&stack_frame, Fault::PageFault { address });
}

extern "x86-interrupt" fn floating_point_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::FloatingPoint);
}

extern "x86-interrupt" fn alignment_check_handler(stack_frame: InterruptStackFrame, _error_code: u64) {
    user_fault(&stack_frame, Fault::AlignmentCheck);
}

extern "x86-interrupt" fn simd_handler(stack_frame: InterruptStackFrame) {
    user_fault(&stack_frame, Fault::Simd);
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

// Hardware Interrupt Handlers

extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    match KERNEL.try_with(|kernel| kernel.tick()) {
        Some(Some(plan)) => {
            // SAFETY: both contexts live in the kernel's process arena, and
            // the tick already rebound the address space and kernel stack.
            unsafe { switch::switch_context(plan.save_ptr(), plan.load_ptr()) };
        }
        Some(None) => {}
        // Lock held or kernel not up yet: skip this quantum.
        None => end_of_interrupt(Irq::Timer),
    }
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    // SAFETY: reading the PS/2 data port acknowledges the byte.
    let scancode = unsafe { Port::<u8>::new(KEYBOARD_DATA).read() };
    if let Some(event) = keyboard::decode(scancode) {
        if KERNEL.try_with(|kernel| kernel.handle_key(event)).is_none() {
            log::warn!("[TTY] key {:?} dropped", event);
        }
    }
    end_of_interrupt(Irq::Keyboard);
}

extern "x86-interrupt" fn rtc_interrupt_handler(_stack_frame: InterruptStackFrame) {
    // Register C must be read or the RTC stops interrupting.
    // SAFETY: standard CMOS ports.
    unsafe {
        Port::<u8>::new(CMOS_SELECT).write(RTC_REG_C);
        let _ = Port::<u8>::new(CMOS_DATA).read();
    }
    KERNEL.try_with(|kernel| kernel.rtc_interrupt());
    end_of_interrupt(Irq::Rtc);
}
