//! Character devices reachable through the file system.

pub mod rtc;

pub use rtc::RtcDevice;
