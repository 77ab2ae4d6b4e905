//! ttyos kernel binary
//!
//! Boot entry for the multi-terminal process kernel.
//!
//! # Boot Process
//!
//! 1. bootloader loads the kernel ELF and the file-system image (ramdisk)
//! 2. bootloader maps all physical memory at a dynamic offset
//! 3. Kernel initializes serial logging, GDT, IDT, PICs, PIT and RTC
//! 4. Kernel parses the file-system image and builds the process core
//! 5. The shell on terminal 0 is entered in user mode; the other
//!    terminals start their shells on first Alt+F2 / Alt+F3
//!
//! On the host this binary only prints a note: the kernel core is
//! exercised by the library's test suite instead.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use bootloader_api::{entry_point, BootInfo, BootloaderConfig};

#[cfg(target_os = "none")]
use ttyos_kernel::arch::x86::{self, interrupts, serial};
#[cfg(target_os = "none")]
use ttyos_kernel::serial_println;

/// Bootloader configuration.
///
/// - Physical memory mapping: Dynamic (bootloader chooses offset)
#[cfg(target_os = "none")]
pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(bootloader_api::config::Mapping::Dynamic);
    config
};

#[cfg(target_os = "none")]
entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

/// Kernel entry point after bootloader handoff.
#[cfg(target_os = "none")]
fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    serial::init();
    #[cfg(feature = "serial-console")]
    serial::init_logger(log::LevelFilter::Debug);
    #[cfg(not(feature = "serial-console"))]
    serial::init_logger(log::LevelFilter::Warn);
    serial_println!("[BOOT] ttyos kernel starting");

    let Some(phys_offset) = boot_info.physical_memory_offset.into_option() else {
        serial_println!("[BOOT] physical memory offset not provided by bootloader");
        interrupts::hlt_loop();
    };
    let Some(ramdisk) = boot_info.ramdisk_addr.into_option() else {
        serial_println!("[BOOT] no file-system image (ramdisk) loaded");
        interrupts::hlt_loop();
    };

    // SAFETY: the bootloader maps the ramdisk for the kernel's lifetime.
    let image: &'static [u8] =
        unsafe { core::slice::from_raw_parts(ramdisk as *const u8, boot_info.ramdisk_len as usize) };

    // SAFETY: called once, on the bootloader's page tables.
    unsafe { x86::start(phys_offset, &boot_info.memory_regions, image) }
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    serial_println!("[PANIC] {}", info);
    interrupts::hlt_loop()
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("ttyos-kernel runs on bare metal only; `cargo test` exercises the kernel core.");
}
