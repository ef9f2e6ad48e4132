use log::debug;

use crate::config::DeviceID;
use crate::constants::{COMMAND_FRAME_LEN, COMMAND_ID, HEAD, PAYLOAD_LEN, TAIL};
use crate::error::InvalidPayload;

/// Command identifiers understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Set or query the reporting mode.
    Mode = 2,
    /// Request a measurement.
    QueryData = 4,
    /// Set the device ID.
    DeviceId = 5,
    /// Put the sensor to sleep or wake it up.
    Sleep = 6,
    /// Read the firmware version.
    Firmware = 7,
    /// Set or query the working period.
    WorkingPeriod = 8,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Checksum of a command frame addressed to `id`.
///
/// Sums the command byte, the 12 payload bytes and both device ID bytes,
/// modulo 256.
pub fn command_checksum(command: u8, payload: &[u8; PAYLOAD_LEN], id: DeviceID) -> u8 {
    payload
        .iter()
        .fold(command, |sum, &b| sum.wrapping_add(b))
        .wrapping_add(id.id1)
        .wrapping_add(id.id2)
}

/// Builds the 19-byte frame for `command` with the broadcast device ID.
///
/// With `FF FF` as the address the checksum reduces to
/// `(sum(payload) + command - 2) mod 256`.
///
/// Returns `InvalidPayload` when `payload` is longer than 12 bytes.
pub fn encode(
    command: Command,
    payload: &[u8],
) -> Result<[u8; COMMAND_FRAME_LEN], InvalidPayload> {
    encode_addressed(command, payload, DeviceID::default())
}

/// Builds the 19-byte frame for `command` addressed to a specific device.
///
/// Layout: `AA B4 <cmd> <12 payload bytes> <id1> <id2> <checksum> AB`, the
/// payload right-padded with zeros.
pub fn encode_addressed(
    command: Command,
    payload: &[u8],
    id: DeviceID,
) -> Result<[u8; COMMAND_FRAME_LEN], InvalidPayload> {
    if payload.len() > PAYLOAD_LEN {
        return Err(InvalidPayload { len: payload.len() });
    }

    let mut data = [0u8; PAYLOAD_LEN];
    data[..payload.len()].copy_from_slice(payload);

    let mut frame = [0u8; COMMAND_FRAME_LEN];
    frame[0] = HEAD;
    frame[1] = COMMAND_ID;
    frame[2] = command.as_byte();
    frame[3..15].copy_from_slice(&data);
    frame[15] = id.id1;
    frame[16] = id.id2;
    frame[17] = command_checksum(command.as_byte(), &data, id);
    frame[18] = TAIL;

    debug!("> {:02X?}", frame);
    Ok(frame)
}
