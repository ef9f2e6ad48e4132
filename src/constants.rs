// HEAD is the byte that marks the beginning of any frame (command or data).
pub const HEAD: u8 = 0xAA;

// TAIL is the byte that marks the end of any frame (command or data).
pub const TAIL: u8 = 0xAB;

// COMMAND_ID is the byte that identifies a command frame sent to the sensor.
pub const COMMAND_ID: u8 = 0xB4;

// DATA_REPORT_ID is the command byte of a measurement frame (query-ack).
pub const DATA_REPORT_ID: u8 = 0xC0;

// REPLY_ID is the command byte of a reply frame acknowledging a command.
pub const REPLY_ID: u8 = 0xC5;

// Total length of an outbound command frame.
pub const COMMAND_FRAME_LEN: usize = 19;

// Total length of an inbound response frame.
pub const RESPONSE_FRAME_LEN: usize = 10;

// Maximum number of payload bytes carried by a command frame.
pub const PAYLOAD_LEN: usize = 12;

// Working period value that makes the sensor measure continuously.
pub const PERIOD_CONTINUOUS: u8 = 0;

// Largest working period (in minutes) accepted by the sensor.
pub const MAX_WORKING_PERIOD: u8 = 30;

// Default resync budget: number of single-byte reads while hunting for HEAD.
pub const DEFAULT_RESYNC_ATTEMPTS: usize = 100;

// Default backoff after a read that returned no byte.
pub const DEFAULT_RESYNC_BACKOFF_MS: u32 = 100;
