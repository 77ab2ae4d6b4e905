//! Real-time clock device file.
//!
//! Reading blocks until the next periodic RTC interrupt; writing a 4-byte
//! frequency reprograms the interrupt rate. Frequencies must be powers of
//! two between 2 and 1024 Hz.

use crate::arch::Platform;
use crate::config::{RTC_MAX_HZ, RTC_MIN_HZ};
use crate::error::{KResult, KernelError};

/// Frequency programmed when the device is opened.
pub const DEFAULT_HZ: u32 = RTC_MIN_HZ;

/// Rate selector for a frequency: `hz = 32768 >> (rate - 1)`.
pub fn rate_for(hz: u32) -> KResult<u8> {
    if !(RTC_MIN_HZ..=RTC_MAX_HZ).contains(&hz) || !hz.is_power_of_two() {
        return Err(KernelError::InvalidArgument);
    }
    Ok((16 - hz.trailing_zeros()) as u8)
}

/// Periodic interrupt state shared by every open RTC descriptor.
///
/// Each reader keeps its own wait mark (the interrupt count it started
/// waiting at), so one reader's wake-up never consumes another's.
#[derive(Debug)]
pub struct RtcDevice {
    hz: u32,
    interrupts: u64,
}

impl RtcDevice {
    pub const fn new() -> Self {
        Self {
            hz: DEFAULT_HZ,
            interrupts: 0,
        }
    }

    /// Reset to the default rate.
    pub fn open<P: Platform + ?Sized>(&mut self, platform: &mut P) -> KResult<()> {
        self.set_frequency(platform, DEFAULT_HZ)
    }

    /// Program a new interrupt frequency.
    pub fn set_frequency<P: Platform + ?Sized>(&mut self, platform: &mut P, hz: u32) -> KResult<()> {
        let rate = rate_for(hz)?;
        platform.set_rtc_rate(rate);
        self.hz = hz;
        log::debug!("[RTC] frequency {} Hz (rate {})", hz, rate);
        Ok(())
    }

    /// Wait for the next interrupt on behalf of one reader.
    ///
    /// The first call records the current interrupt count in `mark` and
    /// reports `WouldBlock`; the caller retries with interrupts enabled
    /// until an interrupt arrives after that point, which clears `mark`.
    pub fn poll_read(&self, mark: &mut Option<u64>) -> KResult<()> {
        match *mark {
            Some(seen) if seen != self.interrupts => {
                *mark = None;
                Ok(())
            }
            Some(_) => Err(KernelError::WouldBlock),
            None => {
                *mark = Some(self.interrupts);
                Err(KernelError::WouldBlock)
            }
        }
    }

    /// Record a periodic interrupt.
    pub fn interrupt(&mut self) {
        self.interrupts = self.interrupts.wrapping_add(1);
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.hz
    }

    /// Interrupts observed since boot.
    pub fn interrupt_count(&self) -> u64 {
        self.interrupts
    }
}

impl Default for RtcDevice {
    fn default() -> Self {
        Self::new()
    }
}
