//! Register value decoding
//!
//! Decode tags from the register schemas are resolved to [`DecodeType`] when
//! a schema is loaded. Decoding itself never fails: a tag without a rule
//! renders the raw bytes as hex.

pub mod code_table;
pub mod time;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::ProtocolError;
use code_table::{CodeTable, OP_MODE_HC, SOM_WIN_MODE, WEEKDAY};

/// Decode tag of a register entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DecodeType {
    /// Signed big-endian integer divided by the factor
    Hex2Int,
    /// Unsigned big-endian integer, divided by the factor when it is not 1
    Hex,
    /// Bit N of the first byte
    Bit(u8),
    /// Inverted bit N of the first byte
    NBit(u8),
    /// 4-byte mantissa times two to the power of the trailing bytes
    EspMant,
    Raw,
    Weekday,
    /// Two-digit year
    Year,
    HexDate,
    /// Software version in hundredths
    SwVer,
    Hex2Ascii,
    OpModeHc,
    SomWinMode,
    /// Tag without a decoding rule
    Unknown(String),
}

impl DecodeType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "hex2int" => DecodeType::Hex2Int,
            "hex" => DecodeType::Hex,
            "esp_mant" => DecodeType::EspMant,
            "raw" => DecodeType::Raw,
            "weekday" => DecodeType::Weekday,
            "year" => DecodeType::Year,
            "hexdate" => DecodeType::HexDate,
            "swver" => DecodeType::SwVer,
            "hex2ascii" => DecodeType::Hex2Ascii,
            "opmodehc" => DecodeType::OpModeHc,
            "somwinmode" => DecodeType::SomWinMode,
            _ => {
                let bit = |prefix: &str| {
                    tag.strip_prefix(prefix)
                        .and_then(|n| n.parse::<u8>().ok())
                        .filter(|n| *n < 8)
                };
                if let Some(n) = bit("nbit") {
                    DecodeType::NBit(n)
                } else if let Some(n) = bit("bit") {
                    DecodeType::Bit(n)
                } else {
                    DecodeType::Unknown(tag.to_string())
                }
            },
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DecodeType::Unknown(_))
    }
}

impl From<String> for DecodeType {
    fn from(tag: String) -> Self {
        DecodeType::parse(&tag)
    }
}

impl From<DecodeType> for String {
    fn from(decode: DecodeType) -> Self {
        decode.to_string()
    }
}

impl fmt::Display for DecodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeType::Hex2Int => f.write_str("hex2int"),
            DecodeType::Hex => f.write_str("hex"),
            DecodeType::Bit(n) => write!(f, "bit{n}"),
            DecodeType::NBit(n) => write!(f, "nbit{n}"),
            DecodeType::EspMant => f.write_str("esp_mant"),
            DecodeType::Raw => f.write_str("raw"),
            DecodeType::Weekday => f.write_str("weekday"),
            DecodeType::Year => f.write_str("year"),
            DecodeType::HexDate => f.write_str("hexdate"),
            DecodeType::SwVer => f.write_str("swver"),
            DecodeType::Hex2Ascii => f.write_str("hex2ascii"),
            DecodeType::OpModeHc => f.write_str("opmodehc"),
            DecodeType::SomWinMode => f.write_str("somwinmode"),
            DecodeType::Unknown(tag) => f.write_str(tag),
        }
    }
}

/// Decoded register value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DecodedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Integer(v) => Some(*v as f64),
            DecodedValue::Float(v) => Some(*v),
            DecodedValue::Text(_) => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Integer(v) => write!(f, "{v}"),
            DecodedValue::Float(v) => write!(f, "{v}"),
            DecodedValue::Text(v) => f.write_str(v),
        }
    }
}

/// Cut a field out of block bytes
///
/// `offset` and `length` count hex characters. Single-character fields
/// address one nibble (even offset: high, odd offset: low), returned in the
/// low four bits of a single byte.
pub fn extract_field(
    block: &[u8],
    offset: usize,
    length: usize,
) -> Result<Cow<'_, [u8]>, ProtocolError> {
    let byte_offset = offset / 2;
    let byte_length = length.div_ceil(2);

    if byte_offset + byte_length > block.len() {
        return Err(ProtocolError::Truncated {
            offset: byte_offset,
            length: byte_length,
            available: block.len(),
        });
    }

    let slice = &block[byte_offset..byte_offset + byte_length];
    if length == 1 {
        let byte = slice[0];
        let nibble = if offset % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        return Ok(Cow::Owned(vec![nibble]));
    }
    Ok(Cow::Borrowed(slice))
}

fn be_unsigned(raw: &[u8]) -> u64 {
    raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn be_signed(raw: &[u8]) -> i64 {
    let negative = raw.first().is_some_and(|b| b & 0x80 != 0);
    let seed: i64 = if negative { -1 } else { 0 };
    raw.iter().fold(seed, |acc, b| (acc << 8) | i64::from(*b))
}

fn scaled(value: f64, factor: f64, integral: i64) -> DecodedValue {
    if factor == 1.0 || factor == 0.0 {
        DecodedValue::Integer(integral)
    } else {
        DecodedValue::Float(value / factor)
    }
}

fn bit(raw: &[u8], n: u8) -> i64 {
    raw.first().map(|b| i64::from((b >> n) & 0x01)).unwrap_or(0)
}

fn lookup(table: &CodeTable, code: u64) -> DecodedValue {
    match table.label(code) {
        Some(label) => DecodedValue::Text(label.to_string()),
        None => DecodedValue::Integer(code as i64),
    }
}

/// Interpret raw field bytes according to a decode tag
pub fn decode_value(raw: &[u8], decode: &DecodeType, factor: f64) -> DecodedValue {
    match decode {
        DecodeType::Hex2Int => {
            let v = be_signed(raw);
            scaled(v as f64, factor, v)
        },
        DecodeType::Hex => {
            let v = be_unsigned(raw);
            scaled(v as f64, factor, v as i64)
        },
        DecodeType::Bit(n) => DecodedValue::Integer(bit(raw, *n)),
        DecodeType::NBit(n) => DecodedValue::Integer(1 - bit(raw, *n)),
        DecodeType::EspMant => {
            let split = raw.len().min(4);
            let mantissa = be_unsigned(&raw[..split]) as f64;
            let exponent = i32::try_from(be_unsigned(&raw[split..])).unwrap_or(i32::MAX);
            DecodedValue::Float(mantissa * 2f64.powi(exponent))
        },
        DecodeType::Weekday => lookup(&WEEKDAY, be_unsigned(raw)),
        DecodeType::Year => DecodedValue::Integer(be_unsigned(raw) as i64 + 2000),
        DecodeType::HexDate => DecodedValue::Text(be_unsigned(raw).to_string()),
        DecodeType::SwVer => DecodedValue::Text(format!("{:.2}", be_unsigned(raw) as f64 / 100.0)),
        DecodeType::Hex2Ascii => {
            let text: String = raw
                .iter()
                .filter(|b| (0x20..=0x7E).contains(*b))
                .map(|b| char::from(*b))
                .collect();
            DecodedValue::Text(text.trim().to_string())
        },
        DecodeType::OpModeHc => lookup(&OP_MODE_HC, be_unsigned(raw)),
        DecodeType::SomWinMode => lookup(&SOM_WIN_MODE, be_unsigned(raw)),
        DecodeType::Raw | DecodeType::Unknown(_) => DecodedValue::Text(hex::encode(raw)),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(DecodeType::parse("hex2int"), DecodeType::Hex2Int);
        assert_eq!(DecodeType::parse("bit3"), DecodeType::Bit(3));
        assert_eq!(DecodeType::parse("nbit0"), DecodeType::NBit(0));
        assert_eq!(DecodeType::parse("somwinmode"), DecodeType::SomWinMode);
        assert_eq!(
            DecodeType::parse("bit9"),
            DecodeType::Unknown("bit9".to_string())
        );
        assert!(DecodeType::parse("1clean").is_unknown());
        assert_eq!(DecodeType::parse("nbit2").to_string(), "nbit2");
    }

    #[test]
    fn test_hex2int_is_signed_and_scaled() {
        let v = decode_value(&[0xFF, 0x9C], &DecodeType::Hex2Int, 10.0);
        assert_eq!(v, DecodedValue::Float(-10.0));

        let v = decode_value(&[0x00, 0xD2], &DecodeType::Hex2Int, 10.0);
        assert_eq!(v, DecodedValue::Float(21.0));

        let v = decode_value(&[0xFF, 0xFE], &DecodeType::Hex2Int, 1.0);
        assert_eq!(v, DecodedValue::Integer(-2));
    }

    #[test]
    fn test_hex_is_unsigned() {
        assert_eq!(
            decode_value(&[0xFF, 0xFE], &DecodeType::Hex, 1.0),
            DecodedValue::Integer(65534)
        );
        assert_eq!(
            decode_value(&[0x01, 0x2C], &DecodeType::Hex, 100.0),
            DecodedValue::Float(3.0)
        );
    }

    #[test]
    fn test_bits() {
        let raw = [0b0000_0100];
        assert_eq!(decode_value(&raw, &DecodeType::Bit(2), 1.0), DecodedValue::Integer(1));
        assert_eq!(decode_value(&raw, &DecodeType::NBit(2), 1.0), DecodedValue::Integer(0));
        assert_eq!(decode_value(&raw, &DecodeType::Bit(0), 1.0), DecodedValue::Integer(0));
        assert_eq!(decode_value(&raw, &DecodeType::NBit(0), 1.0), DecodedValue::Integer(1));
    }

    #[test]
    fn test_esp_mant() {
        let raw = [0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02];
        assert_eq!(
            decode_value(&raw, &DecodeType::EspMant, 1.0),
            DecodedValue::Float(12.0)
        );
    }

    #[test]
    fn test_unknown_falls_back_to_hex() {
        let decode = DecodeType::Unknown("1clean".to_string());
        assert_eq!(
            decode_value(&[0xAB, 0x01], &decode, 1.0),
            DecodedValue::Text("ab01".to_string())
        );
        assert_eq!(
            decode_value(&[0x0A], &DecodeType::Raw, 1.0),
            DecodedValue::Text("0a".to_string())
        );
    }

    #[test]
    fn test_calendar_and_version_tags() {
        assert_eq!(
            decode_value(&[0x03], &DecodeType::Weekday, 1.0),
            DecodedValue::Text("Thursday".to_string())
        );
        assert_eq!(
            decode_value(&[0x09], &DecodeType::Weekday, 1.0),
            DecodedValue::Integer(9)
        );
        assert_eq!(decode_value(&[0x19], &DecodeType::Year, 1.0), DecodedValue::Integer(2025));
        assert_eq!(
            decode_value(&[0x01, 0xC3], &DecodeType::SwVer, 1.0),
            DecodedValue::Text("4.51".to_string())
        );
        assert_eq!(
            decode_value(&[0x01, 0xC3], &DecodeType::HexDate, 1.0),
            DecodedValue::Text("451".to_string())
        );
        assert_eq!(
            decode_value(b"Mar 12 2013\0\0", &DecodeType::Hex2Ascii, 1.0),
            DecodedValue::Text("Mar 12 2013".to_string())
        );
    }

    #[test]
    fn test_mode_tables() {
        assert_eq!(
            decode_value(&[0x01], &DecodeType::SomWinMode, 1.0),
            DecodedValue::Text("winter".to_string())
        );
        assert_eq!(
            decode_value(&[0x03], &DecodeType::OpModeHc, 1.0),
            DecodedValue::Text("standby".to_string())
        );
    }

    #[test]
    fn test_extract_field_bytes() {
        let block = [0x42, 0xFB, 0x00, 0xD2, 0xFF, 0x9C];
        let raw = extract_field(&block, 4, 4).unwrap();
        assert_eq!(raw.as_ref(), &[0x00, 0xD2]);

        // Odd character count rounds up to whole bytes
        let raw = extract_field(&block, 8, 3).unwrap();
        assert_eq!(raw.as_ref(), &[0xFF, 0x9C]);
    }

    #[test]
    fn test_extract_field_nibbles() {
        let block = [0x00, 0x00, 0x5A];
        assert_eq!(extract_field(&block, 4, 1).unwrap().as_ref(), &[0x05]);
        assert_eq!(extract_field(&block, 5, 1).unwrap().as_ref(), &[0x0A]);
    }

    #[test]
    fn test_extract_field_truncated() {
        let block = [0x42, 0xFB];
        assert_eq!(
            extract_field(&block, 4, 4).unwrap_err(),
            ProtocolError::Truncated {
                offset: 2,
                length: 2,
                available: 2
            }
        );
    }

    #[test]
    fn test_decoded_value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&DecodedValue::Float(21.5)).unwrap(), "21.5");
        assert_eq!(serde_json::to_string(&DecodedValue::Integer(1)).unwrap(), "1");
        assert_eq!(
            serde_json::to_string(&DecodedValue::Text("winter".into())).unwrap(),
            "\"winter\""
        );
    }
}
