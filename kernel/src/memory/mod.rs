//! Memory layout and address-space switching.
//!
//! Paging here is a fixed set of slots, not a general allocator. Each pid
//! owns one 4 MB physical frame; the program slot of the page directory is
//! rebound to the running process's frame on every switch. A second slot
//! exposes a terminal's video page (live or back-buffer) to user space.

pub mod page_table;
pub mod switcher;

pub use page_table::{PageEntry, PageFlags};
pub use switcher::AddressSpaceSwitcher;

use crate::config::{
    KERNEL_REGION_TOP, KERNEL_STACK_GUARD, KERNEL_STACK_SIZE, PROGRAM_FRAME_BASE,
    PROGRAM_FRAME_SIZE, PROGRAM_WINDOW,
};
use crate::process::Pid;

/// Physical frame holding a pid's program image.
pub const fn program_frame(pid: Pid) -> u32 {
    PROGRAM_FRAME_BASE + pid.as_u32() * PROGRAM_FRAME_SIZE
}

/// Physical address backing `vaddr` for a program bound to `pid`'s frame.
///
/// Returns `None` when `vaddr` lies outside the program window.
pub const fn program_phys(pid: Pid, vaddr: u32) -> Option<u32> {
    if vaddr < PROGRAM_WINDOW || vaddr - PROGRAM_WINDOW >= PROGRAM_FRAME_SIZE {
        return None;
    }
    Some(program_frame(pid) + (vaddr - PROGRAM_WINDOW))
}

/// Base of the 8 KB kernel block owned by `pid`.
pub const fn kernel_block(pid: Pid) -> u32 {
    KERNEL_REGION_TOP - (pid.as_u32() + 1) * KERNEL_STACK_SIZE
}

/// Initial kernel stack pointer for `pid`, loaded on ring transitions.
pub const fn kernel_stack_top(pid: Pid) -> u32 {
    KERNEL_REGION_TOP - pid.as_u32() * KERNEL_STACK_SIZE - KERNEL_STACK_GUARD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_frames_are_disjoint() {
        assert_eq!(program_frame(Pid::new(0)), 0x0080_0000);
        assert_eq!(program_frame(Pid::new(1)), 0x00C0_0000);
        assert_eq!(program_frame(Pid::new(5)), 0x01C0_0000);
    }

    #[test]
    fn test_program_phys_window_bounds() {
        let pid = Pid::new(2);
        assert_eq!(program_phys(pid, PROGRAM_WINDOW), Some(program_frame(pid)));
        assert_eq!(
            program_phys(pid, 0x0804_8000),
            Some(program_frame(pid) + 0x48000)
        );
        assert_eq!(program_phys(pid, PROGRAM_WINDOW - 1), None);
        assert_eq!(program_phys(pid, PROGRAM_WINDOW + PROGRAM_FRAME_SIZE), None);
    }

    #[test]
    fn test_kernel_stack_inside_own_block() {
        for raw in 0..6 {
            let pid = Pid::new(raw);
            let block = kernel_block(pid);
            let top = kernel_stack_top(pid);
            assert!(top > block);
            assert!(top < block + KERNEL_STACK_SIZE);
        }
    }
}
