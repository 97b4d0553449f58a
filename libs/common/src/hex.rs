//! Hex formatting for frame dumps in logs

use std::fmt::Write;

/// Space separated uppercase hex, the format used for raw packet logging
/// Example: [0x01, 0x00, 0xFB] -> "01 00 FB"
pub fn format_hex_pretty(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_pretty() {
        assert_eq!(format_hex_pretty(&[0x01, 0x00, 0xFB]), "01 00 FB");
        assert_eq!(format_hex_pretty(&[0x10]), "10");
        assert_eq!(format_hex_pretty(&[]), "");
    }
}
