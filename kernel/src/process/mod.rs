//! Process Management
//!
//! This module provides pid allocation, process control blocks, the run
//! queue and the execute/halt lifecycle for user programs.

pub mod files;
pub mod lifecycle;
pub mod pcb;
pub mod runqueue;
pub mod table;

pub use files::{FdTable, FileDescriptor};
pub use lifecycle::{Command, Fault, HaltOutcome, Launch};
pub use pcb::{ExitStatus, Pid, ProcessRecord, ProcessState};
pub use runqueue::RunQueue;
pub use table::ProcessTable;
