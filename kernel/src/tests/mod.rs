//! Kernel Unit Tests Module
//!
//! Scenario tests that drive the whole process core through a mock
//! platform, plus the shared fixtures they use.

pub mod support;

mod syscall_tests;
mod terminal_tests;
