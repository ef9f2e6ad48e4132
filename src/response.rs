use core::sync::atomic::AtomicBool;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadReady};
use log::{debug, error, warn};

use crate::config::{Config, DeviceID};
use crate::constants::{DATA_REPORT_ID, HEAD, REPLY_ID, RESPONSE_FRAME_LEN, TAIL};
use crate::error::FrameError;
use crate::stream::StreamReader;
use crate::Command;

/// A 10-byte frame received from the sensor.
///
/// Wire layout: `AA <command> <data:6> <checksum> AB`. The last two data
/// bytes carry the device ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    pub command: u8,
    pub data: [u8; 6],
    pub checksum: u8,
    pub tail: u8,
}

impl ResponseFrame {
    pub fn from_bytes(bytes: &[u8; RESPONSE_FRAME_LEN]) -> Self {
        let mut data = [0u8; 6];
        data.copy_from_slice(&bytes[2..8]);
        ResponseFrame {
            command: bytes[1],
            data,
            checksum: bytes[8],
            tail: bytes[9],
        }
    }

    /// Builds a frame from the first ten bytes of `bytes`.
    ///
    /// Returns `None` when fewer than ten bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..RESPONSE_FRAME_LEN) {
            Some(head) => {
                let mut frame = [0u8; RESPONSE_FRAME_LEN];
                frame.copy_from_slice(head);
                Some(Self::from_bytes(&frame))
            }
            None => {
                warn!(
                    "Expected {} bytes for a frame, got {}: {:02X?}",
                    RESPONSE_FRAME_LEN,
                    bytes.len(),
                    bytes
                );
                None
            }
        }
    }

    pub fn to_bytes(&self) -> [u8; RESPONSE_FRAME_LEN] {
        let mut bytes = [0u8; RESPONSE_FRAME_LEN];
        bytes[0] = HEAD;
        bytes[1] = self.command;
        bytes[2..8].copy_from_slice(&self.data);
        bytes[8] = self.checksum;
        bytes[9] = self.tail;
        bytes
    }

    pub fn device_id(&self) -> DeviceID {
        DeviceID {
            id1: self.data[4],
            id2: self.data[5],
        }
    }

    /// Sum of the six data bytes, modulo 256.
    ///
    /// The command byte is not part of the sum; the sensor checksums only
    /// the data and device ID bytes.
    pub fn computed_checksum(&self) -> u8 {
        self.data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    }
}

/// A single particulate matter sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// PM2.5 concentration in µg/m³.
    pub pm2_5: f32,
    /// PM10 concentration in µg/m³.
    pub pm10: f32,
}

/// Firmware build date reported by the sensor, as `YY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub year: u8,
    pub month: u8,
    pub day: u8,
}

/// Reads complete response frames off the serial stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseDecoder {
    reader: StreamReader,
    verify_checksum: bool,
}

impl ResponseDecoder {
    pub fn new(reader: StreamReader, verify_checksum: bool) -> Self {
        Self {
            reader,
            verify_checksum,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(StreamReader::from_config(config), config.verify_checksum)
    }

    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }

    /// Resynchronises on the header byte and reads the nine bytes after it.
    ///
    /// A short body is not retried here; the caller skips the cycle instead.
    /// Unless strict validation is enabled the checksum and tail bytes are
    /// not checked.
    pub async fn read_frame<S, D>(
        &self,
        serial: &mut S,
        delay: &mut D,
        stop: Option<&AtomicBool>,
    ) -> Result<ResponseFrame, FrameError<S::Error>>
    where
        S: Read + ReadReady,
        D: DelayNs,
    {
        let header = self.reader.find_frame_start(serial, delay, stop).await?;

        let mut bytes = [0u8; RESPONSE_FRAME_LEN];
        bytes[0] = header;
        let mut received = 0;
        while received < RESPONSE_FRAME_LEN - 1 {
            let n = serial
                .read(&mut bytes[1 + received..])
                .await
                .map_err(FrameError::Io)?;
            if n == 0 {
                break;
            }
            received += n;
        }

        if received < RESPONSE_FRAME_LEN - 1 {
            warn!(
                "Expected 9 bytes after header, got {}: {:02X?}",
                received,
                &bytes[..1 + received]
            );
            return Err(FrameError::ShortRead { received });
        }

        debug!("< {:02X?}", bytes);
        let frame = ResponseFrame::from_bytes(&bytes);

        if self.verify_checksum {
            if frame.tail != TAIL {
                error!("Bad frame tail {:02X}. Frame: {:02X?}", frame.tail, bytes);
                return Err(FrameError::BadTail(frame.tail));
            }
            let calculated = frame.computed_checksum();
            if calculated != frame.checksum {
                error!(
                    "Bad checksum: Calculated {:02X}, Received {:02X}. Frame: {:02X?}",
                    calculated, frame.checksum, bytes
                );
                return Err(FrameError::BadChecksum {
                    expected: frame.checksum,
                    calculated,
                });
            }
        }

        Ok(frame)
    }
}

/// Extracts PM2.5 and PM10 from a measurement frame.
///
/// Only frames with command byte `0xC0` carry a measurement; anything else
/// (a command reply, for instance) yields `None`.
pub fn decode_query_response(frame: &ResponseFrame) -> Option<Reading> {
    if frame.command != DATA_REPORT_ID {
        debug!(
            "Frame {:02X} is not a data report, ignoring",
            frame.command
        );
        return None;
    }

    let pm2_5 = concentration(frame.data[0], frame.data[1]);
    let pm10 = concentration(frame.data[2], frame.data[3]);
    debug!(
        "PM2.5: {},{} -> {:.1} µg/m³, PM10: {},{} -> {:.1} µg/m³",
        frame.data[0], frame.data[1], pm2_5, frame.data[2], frame.data[3], pm10
    );
    Some(Reading { pm2_5, pm10 })
}

/// Extracts the firmware date from a reply to the firmware command.
// Reply: AA C5 07 YEAR MONTH DAY ID1 ID2 CS AB
pub fn decode_firmware_reply(frame: &ResponseFrame) -> Option<FirmwareVersion> {
    if frame.command != REPLY_ID || frame.data[0] != Command::Firmware.as_byte() {
        debug!("Frame {:02X?} is not a firmware reply", frame.to_bytes());
        return None;
    }
    Some(FirmwareVersion {
        year: frame.data[1],
        month: frame.data[2],
        day: frame.data[3],
    })
}

// Values are sent little-endian in units of 0.1 µg/m³.
fn concentration(low: u8, high: u8) -> f32 {
    (u16::from(low) | (u16::from(high) << 8)) as f32 / 10.0
}
