//! THZ wire constants

use std::time::Duration;

/// Greeting and closing byte
pub const STX: u8 = 0x02;
/// End of text, second byte of the frame footer
pub const ETX: u8 = 0x03;
/// Data link escape: acknowledge byte and first byte of the footer
pub const DLE: u8 = 0x10;

/// Escaped on the wire as `2B 18`
pub const ESCAPED_PLUS: u8 = 0x2B;
pub const PLUS_STUFFING: u8 = 0x18;

pub const FOOTER: [u8; 2] = [DLE, ETX];

/// Request header for reads, also the success status of a read response
pub const HEADER_GET: [u8; 2] = [0x01, 0x00];
/// Request header for writes, also the success status of a write response
pub const HEADER_SET: [u8; 2] = [0x01, 0x80];

pub const STATUS_TIMING: [u8; 2] = [0x01, 0x01];
pub const STATUS_REQUEST_CHECKSUM: [u8; 2] = [0x01, 0x02];
pub const STATUS_UNKNOWN_COMMAND: [u8; 2] = [0x01, 0x03];
pub const STATUS_UNKNOWN_REGISTER: [u8; 2] = [0x01, 0x04];

/// Index of the checksum byte in telegrams and responses
pub const CHECKSUM_INDEX: usize = 2;

/// Shortest raw frame `decode_response` accepts
pub const MIN_FRAME_LEN: usize = 6;
/// Shortest data frame the receive loop treats as complete
pub const MIN_DATA_FRAME_LEN: usize = 8;

/// Wait between polls when the link reports nothing to read
pub const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Register holding the firmware version
pub const FIRMWARE_REGISTER: u8 = 0xFD;
/// Byte offset and length of the version inside the firmware block
pub const FIRMWARE_OFFSET: usize = 2;
pub const FIRMWARE_LENGTH: usize = 2;
