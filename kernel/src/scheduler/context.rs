//! Saved execution contexts.
//!
//! Two kinds of saved state exist per process. A [`SwitchContext`] is
//! written and read only by the preemption tick. A [`ResumePoint`] is
//! captured when a process is launched and consumed exactly once, when it
//! halts, to resume its creator's `execute` with the exit status.
//! The assembly that fills and consumes both lives in the platform layer.

/// Minimal CPU context for context switching.
///
/// Only callee-saved registers need to be explicitly saved.
/// The calling convention already handles caller-saved registers.
#[derive(Debug, Default, Clone)]
#[repr(C)]
pub struct SwitchContext {
    /// Callee-saved registers (must be preserved across function calls).
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
    /// Stack pointer.
    pub rsp: u64,
    /// Return address (pushed by call instruction).
    pub rip: u64,
}

impl SwitchContext {
    /// Has a tick ever saved into this context?
    pub fn is_saved(&self) -> bool {
        self.rsp != 0
    }
}

/// Continuation of an `execute` call, parked while the child runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct ResumePoint {
    /// Kernel stack pointer of the suspended `execute`.
    pub rsp: u64,
    /// Frame pointer of the suspended `execute`.
    pub rbp: u64,
}

impl ResumePoint {
    /// A resume point that has not been captured yet.
    pub const fn empty() -> Self {
        Self { rsp: 0, rbp: 0 }
    }

    pub const fn new(rsp: u64, rbp: u64) -> Self {
        Self { rsp, rbp }
    }

    /// Was this point filled in by a user-mode entry?
    pub fn is_captured(&self) -> bool {
        self.rsp != 0
    }
}

/// RFLAGS for a fresh user program: interrupts enabled, reserved bit 1 set.
pub const USER_RFLAGS: u64 = 0x202;

/// Privilege-transition frame for entering a freshly loaded program.
///
/// Segment selectors are supplied by the platform's descriptor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFrame {
    /// Entry point read from the image header.
    pub entry: u32,
    /// Initial user stack pointer.
    pub stack_top: u32,
    /// Initial flags register.
    pub rflags: u64,
}

impl UserFrame {
    pub const fn new(entry: u32, stack_top: u32) -> Self {
        Self {
            entry,
            stack_top,
            rflags: USER_RFLAGS,
        }
    }

    /// Are interrupts enabled on entry?
    pub fn interrupts_enabled(&self) -> bool {
        self.rflags & (1 << 9) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_frame_enables_interrupts() {
        let frame = UserFrame::new(0x0804_8100, 0x083F_FFFC);
        assert!(frame.interrupts_enabled());
    }

    #[test]
    fn test_fresh_contexts_are_not_captured() {
        assert!(!ResumePoint::empty().is_captured());
        assert!(ResumePoint::new(0x7F_E000, 0x7F_E010).is_captured());
        assert!(!SwitchContext::default().is_saved());
    }
}
