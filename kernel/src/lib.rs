//! ttyos Kernel Library
//!
//! Process-management core of a single-core, three-terminal teaching
//! kernel: pid table, run queue, execute/halt lifecycle, preemption tick,
//! address-space slots and terminal multiplexing.
//!
//! # Layout
//!
//! - Everything outside [`arch::x86`] is hardware independent and talks to
//!   the machine through [`arch::Platform`], so the core builds and is
//!   tested on the host.
//! - [`arch::x86`] is built only for the bare-metal target and provides
//!   the descriptor tables, interrupt handlers, context-switch assembly
//!   and the serial logger.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod arch;
pub mod config;
pub mod devices;
pub mod error;
pub mod fs;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod sync;
pub mod syscall;
pub mod terminal;

#[cfg(test)]
mod tests;

pub use error::{KResult, KernelError};
pub use kernel::Kernel;
