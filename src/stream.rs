use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadReady};
use log::{debug, warn};

use crate::config::Config;
use crate::constants::HEAD;
use crate::error::SyncError;

/// Locates frame boundaries on the raw byte stream coming from the sensor.
///
/// The wire carries no recovery protocol of its own, so after a partial or
/// garbled frame the only way back into alignment is to scan byte by byte
/// for the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReader {
    max_attempts: usize,
    backoff_ms: u32,
}

impl StreamReader {
    pub fn new(max_attempts: usize, backoff_ms: u32) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resync_attempts, config.resync_backoff_ms)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff_ms(&self) -> u32 {
        self.backoff_ms
    }

    /// Reads one byte at a time until the frame header shows up.
    ///
    /// Every read counts against the attempt budget. A poll that finds no
    /// byte waiting is followed by the backoff delay, so the search is bounded
    /// by `max_attempts * backoff_ms` even on a silent line. `stop` is checked
    /// before each attempt.
    ///
    /// Returns the header byte, or `SyncError::Timeout` once the budget is
    /// spent.
    pub async fn find_frame_start<S, D>(
        &self,
        serial: &mut S,
        delay: &mut D,
        stop: Option<&AtomicBool>,
    ) -> Result<u8, SyncError<S::Error>>
    where
        S: Read + ReadReady,
        D: DelayNs,
    {
        let mut attempts = 0;
        while attempts < self.max_attempts {
            if is_stopped(stop) {
                debug!("Header search cancelled after {} attempts", attempts);
                return Err(SyncError::Cancelled);
            }
            attempts += 1;

            let mut byte = [0u8; 1];
            let received = if serial.read_ready().map_err(SyncError::Io)? {
                serial.read(&mut byte).await.map_err(SyncError::Io)?
            } else {
                0
            };

            if received == 0 {
                debug!("No data received from sensor (attempt {})", attempts);
                delay.delay_ms(self.backoff_ms).await;
                continue;
            }

            if byte[0] == HEAD {
                debug!("Frame header found after {} attempts", attempts);
                return Ok(byte[0]);
            }
        }

        warn!(
            "Failed to find frame header after {} attempts",
            self.max_attempts
        );
        Err(SyncError::Timeout { attempts })
    }
}

impl Default for StreamReader {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub(crate) fn is_stopped(stop: Option<&AtomicBool>) -> bool {
    stop.is_some_and(|flag| flag.load(Ordering::Acquire))
}
