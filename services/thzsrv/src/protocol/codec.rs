//! Telegram framing
//!
//! Request telegram: `header(2) checksum(1) address(n) 10 03`.
//! Response frame:   `status(2) checksum(1) payload(n) 10 03`, with `10`
//! doubled and `2B` followed by `18` inside the escaped part.

use bytes::{BufMut, Bytes, BytesMut};
use common::hex::format_hex_pretty;
use std::fmt;

use super::constants::*;
use crate::error::{DeviceError, ProtocolError, Result};

/// Sum of all bytes except the checksum slot at index 2, mod 256
pub fn checksum(data: &[u8]) -> u8 {
    data.iter()
        .enumerate()
        .filter(|(i, _)| *i != CHECKSUM_INDEX)
        .fold(0u8, |acc, (_, b)| acc.wrapping_add(*b))
}

/// Immutable request telegram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    bytes: Bytes,
}

impl Telegram {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address part between checksum and footer
    pub fn address(&self) -> &[u8] {
        &self.bytes[CHECKSUM_INDEX + 1..self.bytes.len() - FOOTER.len()]
    }

    pub fn is_write(&self) -> bool {
        self.bytes[..2] == HEADER_SET
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex_pretty(&self.bytes))
    }
}

/// Build a request telegram for `address`
///
/// Reads use header `01 00`, writes `01 80`. For a write, `address` already
/// carries the value bytes after the register address.
pub fn build_telegram(address: &[u8], is_write: bool) -> Telegram {
    let header = if is_write { HEADER_SET } else { HEADER_GET };

    let mut buf = BytesMut::with_capacity(address.len() + 5);
    buf.put_slice(&header);
    buf.put_u8(0x00);
    buf.put_slice(address);
    buf[CHECKSUM_INDEX] = checksum(&buf);
    buf.put_slice(&FOOTER);

    Telegram {
        bytes: buf.freeze(),
    }
}

/// Byte-stuff data the way the controller sends it
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    for &b in data {
        out.push(b);
        match b {
            DLE => out.push(DLE),
            ESCAPED_PLUS => out.push(PLUS_STUFFING),
            _ => {},
        }
    }
    out
}

/// Undo receive-side byte stuffing: `10 10 -> 10`, then `2B 18 -> 2B`
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let pass = collapse(data, DLE, DLE);
    collapse(&pass, ESCAPED_PLUS, PLUS_STUFFING)
}

// Non-overlapping, left to right
fn collapse(data: &[u8], lead: u8, stuffing: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == lead && data.get(i + 1) == Some(&stuffing) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// True once `buf` ends with an unescaped `10 03` and is long enough
pub fn is_frame_complete(buf: &[u8]) -> bool {
    if buf.len() < MIN_DATA_FRAME_LEN || buf.last() != Some(&ETX) {
        return false;
    }
    let dle_run = buf[..buf.len() - 1]
        .iter()
        .rev()
        .take_while(|&&b| b == DLE)
        .count();
    dle_run % 2 == 1
}

/// Successful, checksum-verified response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: [u8; 2],
    pub checksum: u8,
    pub payload: Bytes,
}

impl Response {
    pub fn is_write_ack(&self) -> bool {
        self.status == HEADER_SET
    }

    /// `checksum ++ payload`, the layout register offsets index into
    pub fn block_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 1);
        buf.put_u8(self.checksum);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Unescape and verify a raw data frame
pub fn decode_response(raw: &[u8]) -> Result<Response> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::Malformed(format!(
            "frame too short ({} bytes): [{}]",
            raw.len(),
            format_hex_pretty(raw)
        ))
        .into());
    }

    let data = unescape(raw);
    if data.len() < CHECKSUM_INDEX + 1 + FOOTER.len() {
        return Err(ProtocolError::Malformed(format!(
            "frame too short after unescaping: [{}]",
            format_hex_pretty(&data)
        ))
        .into());
    }

    let status = [data[0], data[1]];
    match status {
        HEADER_GET | HEADER_SET => {
            let received = data[CHECKSUM_INDEX];
            let payload = &data[CHECKSUM_INDEX + 1..data.len() - FOOTER.len()];

            let mut check = Vec::with_capacity(payload.len() + 3);
            check.extend_from_slice(&status);
            check.push(0x00);
            check.extend_from_slice(payload);
            let calculated = checksum(&check);

            if calculated != received {
                return Err(ProtocolError::ChecksumMismatch {
                    received,
                    calculated,
                }
                .into());
            }

            Ok(Response {
                status,
                checksum: calculated,
                payload: Bytes::copy_from_slice(payload),
            })
        },
        STATUS_TIMING => Err(DeviceError::Timing.into()),
        STATUS_REQUEST_CHECKSUM => Err(DeviceError::RequestChecksum.into()),
        STATUS_UNKNOWN_COMMAND => Err(DeviceError::UnknownCommand.into()),
        STATUS_UNKNOWN_REGISTER => Err(DeviceError::UnknownRegister.into()),
        _ => Err(ProtocolError::UnknownResponse(format_hex_pretty(&data)).into()),
    }
}

/// Frame a response the way the controller does
///
/// Used by the mock transport to play the device side of the exchange.
pub fn build_response(status: [u8; 2], payload: &[u8]) -> Bytes {
    let mut body = Vec::with_capacity(payload.len() + 3);
    body.extend_from_slice(&status);
    body.push(0x00);
    body.extend_from_slice(payload);
    body[CHECKSUM_INDEX] = checksum(&body);

    let mut frame = escape(&body);
    frame.extend_from_slice(&FOOTER);
    Bytes::from(frame)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::ThzError;

    #[test]
    fn test_read_telegram_layout() {
        let telegram = build_telegram(&[0xFB], false);
        assert_eq!(telegram.as_bytes(), &[0x01, 0x00, 0xFC, 0xFB, 0x10, 0x03]);
        assert_eq!(telegram.address(), &[0xFB]);
        assert!(!telegram.is_write());
        assert_eq!(telegram.to_string(), "01 00 FC FB 10 03");
    }

    #[test]
    fn test_write_telegram_carries_value() {
        // Set pOpMode (0A 01 12) to automatic (0x0B, little endian)
        let telegram = build_telegram(&[0x0A, 0x01, 0x12, 0x0B, 0x00], true);
        let expected_crc = (0x01u32 + 0x80 + 0x0A + 0x01 + 0x12 + 0x0B) as u8;
        assert_eq!(
            telegram.as_bytes(),
            &[0x01, 0x80, expected_crc, 0x0A, 0x01, 0x12, 0x0B, 0x00, 0x10, 0x03]
        );
        assert!(telegram.is_write());
    }

    #[test]
    fn test_checksum_skips_its_own_slot() {
        let payload = [0xFD, 0x00, 0xCE];
        let mut frame = vec![0x01, 0x00, 0x00];
        frame.extend_from_slice(&payload);
        let crc = checksum(&frame);

        // Writing the checksum into its slot does not change the sum
        frame[CHECKSUM_INDEX] = crc;
        assert_eq!(checksum(&frame), crc);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0xFF, 0x00, 0x03]), 0x01);
    }

    #[test]
    fn test_unescape_rules() {
        assert_eq!(unescape(&[0x01, 0x10, 0x10, 0x02]), vec![0x01, 0x10, 0x02]);
        assert_eq!(unescape(&[0x2B, 0x18, 0x05]), vec![0x2B, 0x05]);
        // Lone escape leads stay untouched
        assert_eq!(unescape(&[0x10, 0x03]), vec![0x10, 0x03]);
        assert_eq!(unescape(&[0x2B, 0x05]), vec![0x2B, 0x05]);
    }

    #[test]
    fn test_unescape_leaves_clean_data_alone() {
        let clean = [0x01, 0x00, 0x42, 0xFB, 0x00, 0xD2, 0x10, 0x03];
        let once = unescape(&clean);
        assert_eq!(once, clean.to_vec());
        assert_eq!(unescape(&once), once);
    }

    #[test]
    fn test_escape_is_undone_by_unescape() {
        let payloads: [&[u8]; 4] = [
            &[0x10, 0x2B],
            &[0x2B, 0x10],
            &[0x10, 0x18, 0x2B, 0x18],
            &[0x10, 0x10, 0x00],
        ];
        for payload in payloads {
            assert_eq!(unescape(&escape(payload)), payload.to_vec());
        }
    }

    #[test]
    fn test_frame_completion_needs_unescaped_footer() {
        // Too short
        assert!(!is_frame_complete(&[0x01, 0x00, 0x10, 0x03]));
        assert!(is_frame_complete(&[0x01, 0x00, 0xFE, 0xFD, 0x00, 0xCE, 0x10, 0x03]));
        // 0x10 in the payload followed by 0x03 in the payload: `10 10 03`
        assert!(!is_frame_complete(&[0x01, 0x00, 0x20, 0xFB, 0x00, 0x10, 0x10, 0x03]));
        // Escaped 0x10 right before the real footer
        assert!(is_frame_complete(&[0x01, 0x00, 0x20, 0xFB, 0x10, 0x10, 0x10, 0x03]));
    }

    #[test]
    fn test_decode_response_returns_payload() {
        let frame = build_response(HEADER_GET, &[0xFD, 0x00, 0xCE]);
        let response = decode_response(&frame).unwrap();

        assert_eq!(response.status, HEADER_GET);
        assert_eq!(response.payload.as_ref(), &[0xFD, 0x00, 0xCE]);
        assert_eq!(
            response.block_bytes().as_ref(),
            &[response.checksum, 0xFD, 0x00, 0xCE]
        );
    }

    #[test]
    fn test_decode_response_unescapes_payload() {
        let payload = [0xFB, 0x10, 0x2B, 0x00];
        let frame = build_response(HEADER_GET, &payload);
        assert!(frame.len() > payload.len() + 5);

        let response = decode_response(&frame).unwrap();
        assert_eq!(response.payload.as_ref(), &payload);
    }

    #[test]
    fn test_decode_response_rejects_bad_checksum() {
        let mut frame = build_response(HEADER_GET, &[0xFB, 0x01, 0x02]).to_vec();
        frame[CHECKSUM_INDEX] = frame[CHECKSUM_INDEX].wrapping_add(1);

        let err = decode_response(&frame).unwrap_err();
        assert!(matches!(
            err,
            ThzError::Protocol(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_response_write_ack() {
        let frame = build_response(HEADER_SET, &[0x0A, 0x01, 0x12]);
        let response = decode_response(&frame).unwrap();
        assert!(response.is_write_ack());
    }

    #[test]
    fn test_decode_response_device_errors() {
        let cases = [
            (STATUS_TIMING, DeviceError::Timing),
            (STATUS_REQUEST_CHECKSUM, DeviceError::RequestChecksum),
            (STATUS_UNKNOWN_COMMAND, DeviceError::UnknownCommand),
            (STATUS_UNKNOWN_REGISTER, DeviceError::UnknownRegister),
        ];
        for (status, expected) in cases {
            let frame = [status[0], status[1], 0x00, 0x00, 0x10, 0x03];
            match decode_response(&frame) {
                Err(ThzError::Device(err)) => assert_eq!(err, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_response_unknown_status() {
        let frame = [0x02, 0x00, 0x00, 0xFB, 0x10, 0x03];
        assert!(matches!(
            decode_response(&frame),
            Err(ThzError::Protocol(ProtocolError::UnknownResponse(_)))
        ));
    }

    #[test]
    fn test_decode_response_too_short() {
        assert!(matches!(
            decode_response(&[0x01, 0x00, 0x01, 0x10, 0x03]),
            Err(ThzError::Protocol(ProtocolError::Malformed(_)))
        ));
    }
}
