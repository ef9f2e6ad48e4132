#![cfg_attr(not(test), no_std)]

use core::sync::atomic::AtomicBool;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadReady, Write};
use log::{debug, warn};

mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod codec;
pub use codec::*;

mod stream;
pub use stream::StreamReader;

mod response;
pub use response::*;

mod monitor;
pub use monitor::*;

#[cfg(test)]
mod mock;

/// What the session last told the sensor to do.
///
/// Only changed by the explicit command methods on [`Sds011`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorState {
    pub mode: ReportingMode,
    pub sleeping: bool,
    pub working_period: u8,
}

impl Default for SensorState {
    /// Factory state: active reporting, awake, continuous measurement.
    fn default() -> Self {
        SensorState {
            mode: ReportingMode::Active,
            sleeping: false,
            working_period: PERIOD_CONTINUOUS,
        }
    }
}

/// Represents an SDS011 air quality sensor.
///
/// The session owns the serial port for its whole lifetime and runs one
/// command at a time: each operation writes exactly one frame and then reads
/// exactly one response. A response that never arrives, arrives truncated or
/// does not carry what was asked for is logged and reported as "nothing this
/// time" rather than as an error; only transport failures are surfaced.
///
/// # Type Parameters
///
/// * `Serial`: The serial interface used to communicate with the sensor.
///   It must implement `embedded_io_async::{Read, ReadReady, Write}`.
/// * `Delay`: Source of the resync backoff and of cancellable pauses.
pub struct Sds011<Serial, Delay> {
    serial: Serial,
    delay: Delay,
    config: Config,
    decoder: ResponseDecoder,
    state: SensorState,
    stop: Option<&'static AtomicBool>,
}

impl<S, D> Sds011<S, D>
where
    S: Read + ReadReady + Write,
    D: DelayNs,
{
    /// Creates a new `Sds011` sensor session.
    ///
    /// # Arguments
    ///
    /// * `serial`: The serial interface for communication with the sensor.
    /// * `delay`: Delay provider used for resync backoff and pauses.
    /// * `config`: The configuration for the sensor.
    pub fn new(serial: S, delay: D, config: Config) -> Self {
        Self {
            serial,
            delay,
            decoder: ResponseDecoder::from_config(&config),
            config,
            state: SensorState::default(),
            stop: None,
        }
    }

    /// Installs a stop flag, checked on every resync attempt and during
    /// pauses. Once raised, operations return `Error::Cancelled`.
    pub fn with_stop_flag(mut self, stop: &'static AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        stream::is_stopped(self.stop)
    }

    /// Gives the serial port back so the caller can close it.
    pub fn release(self) -> S {
        debug!("Releasing serial port");
        self.serial
    }

    /// Brings the sensor into a known state.
    ///
    /// This involves:
    /// - Discarding any bytes already waiting on the serial port.
    /// - Waking the sensor up.
    /// - Setting the working period to continuous.
    /// - Setting the configured reporting mode.
    pub async fn init(&mut self) -> Result<(), Error<S::Error>> {
        self.drain_input().await?;

        self.set_sleep(false).await.map_err(|e| {
            log::error!("Failed to wake sensor during init: {:?}", e);
            e
        })?;

        self.set_working_period(PERIOD_CONTINUOUS)
            .await
            .map_err(|e| {
                log::error!(
                    "Failed to set working period to continuous during init: {:?}",
                    e
                );
                e
            })?;

        let mode = self.config.mode;
        self.set_reporting_mode(mode).await.map_err(|e| {
            log::error!(
                "Failed to set reporting mode to {:?} during init: {:?}",
                mode,
                e
            );
            e
        })?;

        debug!("SDS011 init sequence complete.");
        Ok(())
    }

    /// Sets the sensor's reporting mode (Active or Query).
    ///
    /// The acknowledgement is read and discarded.
    pub async fn set_reporting_mode(
        &mut self,
        mode: ReportingMode,
    ) -> Result<(), Error<S::Error>> {
        debug!("Setting reporting mode to: {:?}", mode);
        let reply = self
            .transact(Command::Mode, &[0x01, mode.as_byte()])
            .await?;
        log_ack(Command::Mode, reply);
        self.state.mode = mode;
        Ok(())
    }

    /// Puts the sensor to sleep (`true`) or wakes it up (`false`).
    pub async fn set_sleep(&mut self, sleep: bool) -> Result<(), Error<S::Error>> {
        debug!("Setting sleep to: {}", sleep);
        // Firmware encoding: 0 = sleep, 1 = work. The payload byte is the
        // inverse of `sleep`.
        let work = if sleep { 0x00 } else { 0x01 };
        let reply = self.transact(Command::Sleep, &[0x01, work]).await?;
        log_ack(Command::Sleep, reply);
        self.state.sleeping = sleep;
        Ok(())
    }

    /// Sets the sensor's working period.
    ///
    /// - A value of `0` sets the sensor to continuous working mode.
    /// - Values from `1` to `30` make the sensor work for 30 seconds and then
    ///   sleep for the rest of each `period` minutes.
    ///
    /// # Returns
    ///
    /// * `Err(Error::InvalidWorkingPeriod)` if `period` is greater than 30.
    /// * `Err(Error::Io)` for serial communication issues.
    pub async fn set_working_period(&mut self, period: u8) -> Result<(), Error<S::Error>> {
        if period > MAX_WORKING_PERIOD {
            log::error!("Working period {} out of range (0-30)", period);
            return Err(Error::InvalidWorkingPeriod(period));
        }
        debug!("Setting working period to: {} minutes", period);
        let reply = self
            .transact(Command::WorkingPeriod, &[0x01, period])
            .await?;
        log_ack(Command::WorkingPeriod, reply);
        self.state.working_period = period;
        Ok(())
    }

    /// Requests one measurement.
    ///
    /// Returns `Ok(None)` when no usable measurement frame came back.
    pub async fn query_data(&mut self) -> Result<Option<Reading>, Error<S::Error>> {
        debug!("Querying sensor data");
        let reply = self.transact(Command::QueryData, &[]).await?;
        Ok(reply.as_ref().and_then(decode_query_response))
    }

    /// Retrieves the firmware build date of the sensor.
    pub async fn firmware_version(
        &mut self,
    ) -> Result<Option<FirmwareVersion>, Error<S::Error>> {
        debug!("Getting firmware version");
        let reply = self.transact(Command::Firmware, &[]).await?;
        let version = reply.as_ref().and_then(decode_firmware_reply);
        if let Some(v) = version {
            debug!("Firmware version: 20{}-{}-{}", v.year, v.month, v.day);
        }
        Ok(version)
    }

    /// Waits for `ms` milliseconds, in slices of the resync backoff so a
    /// raised stop flag cuts the wait short.
    pub async fn pause(&mut self, ms: u32) -> Result<(), Error<S::Error>> {
        let slice = self.config.resync_backoff_ms.max(1);
        let mut remaining = ms;
        while remaining > 0 {
            if self.is_stopped() {
                return Err(Error::Cancelled);
            }
            let step = remaining.min(slice);
            self.delay.delay_ms(step).await;
            remaining -= step;
        }
        Ok(())
    }

    // Writes one command frame and reads back one response frame. Frame-level
    // failures are absorbed into `None`.
    async fn transact(
        &mut self,
        command: Command,
        payload: &[u8],
    ) -> Result<Option<ResponseFrame>, Error<S::Error>> {
        let frame = encode_addressed(command, payload, self.config.id)?;
        self.write(&frame).await?;

        match self
            .decoder
            .read_frame(&mut self.serial, &mut self.delay, self.stop)
            .await
        {
            Ok(reply) => Ok(Some(reply)),
            Err(FrameError::Io(e)) => Err(Error::Io(e)),
            Err(FrameError::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!("No valid response to {:?}: {}", command, e);
                Ok(None)
            }
        }
    }

    async fn write(&mut self, frame: &[u8; COMMAND_FRAME_LEN]) -> Result<(), Error<S::Error>> {
        self.serial.flush().await.map_err(Error::Io)?;
        self.serial.write_all(frame).await.map_err(Error::Io)?;
        self.serial.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    // Discards whatever the sensor sent before we started talking to it.
    async fn drain_input(&mut self) -> Result<usize, Error<S::Error>> {
        let mut scratch = [0u8; 32];
        let mut drained = 0;
        while self.serial.read_ready().map_err(Error::Io)? {
            let n = self.serial.read(&mut scratch).await.map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            drained += n;
        }
        if drained > 0 {
            debug!("Discarded {} stale bytes from serial input", drained);
        }
        Ok(drained)
    }

    #[cfg(test)]
    pub(crate) fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}

fn log_ack(command: Command, reply: Option<ResponseFrame>) {
    match reply {
        Some(frame) if frame.command == REPLY_ID && frame.data[0] == command.as_byte() => {
            debug!("{:?} acknowledged: {:02X?}", command, frame.to_bytes());
        }
        Some(frame) => {
            debug!(
                "{:?} answered with unexpected frame: {:02X?}",
                command,
                frame.to_bytes()
            );
        }
        None => {}
    }
}
