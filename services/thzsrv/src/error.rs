//! Error handling for the THZ protocol client
//!
//! Failures are grouped by the layer that detects them: the byte channel
//! (`TransportError`), the greeting/acknowledge exchange (`HandshakeError`),
//! frame integrity (`ProtocolError`), device-reported rejections
//! (`DeviceError`) and schema or settings problems (`ConfigurationError`).

use thiserror::Error;

pub use crate::transport::TransportError;

/// Violations of the greeting/acknowledge sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Greeting was not acknowledged with DLE
    #[error("Handshake step 1 failed: expected 10, received [{0}]")]
    Step1(String),

    /// Request telegram was not acknowledged with DLE STX
    #[error("Handshake step 2 failed: expected 10 02, received [{0}]")]
    Step2(String),

    /// No complete data frame arrived before the read timeout
    #[error("No valid response after data request ({0} bytes received)")]
    NoValidResponse(usize),
}

/// Framing or integrity violations in a received frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Checksum mismatch: frame carries {received:02X}, calculated {calculated:02X}")]
    ChecksumMismatch { received: u8, calculated: u8 },

    #[error("Unknown response: {0}")]
    UnknownResponse(String),

    /// Field slice reaches past the end of the block
    #[error("Field at byte {offset} (+{length}) exceeds block of {available} bytes")]
    Truncated {
        offset: usize,
        length: usize,
        available: usize,
    },
}

/// Rejections reported by the controller in the response status
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device reported a timing issue")]
    Timing,

    #[error("Device reported a checksum error in the request")]
    RequestChecksum,

    #[error("Device does not know the command")]
    UnknownCommand,

    #[error("Device does not know the requested register")]
    UnknownRegister,
}

/// Schema, block id and settings problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid block id '{0}'")]
    InvalidBlockId(String),

    #[error("Invalid register schema {file}: {reason}")]
    Schema { file: String, reason: String },
}

/// THZ client error type
#[derive(Error, Debug, Clone)]
pub enum ThzError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Unknown block, field or setting name
    #[error("Not found: {0}")]
    NotFound(String),

    /// Value that cannot be encoded for a write
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias for the THZ client
pub type Result<T> = std::result::Result<T, ThzError>;

impl ThzError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ThzError::NotFound(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        ThzError::InvalidValue(msg.into())
    }

    /// Errors after which the link may be out of step with the device
    pub fn is_link_failure(&self) -> bool {
        matches!(self, ThzError::Transport(_) | ThzError::Handshake(_))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_message() {
        let err = ProtocolError::ChecksumMismatch {
            received: 0x2A,
            calculated: 0x2B,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: frame carries 2A, calculated 2B"
        );
    }

    #[test]
    fn test_layer_errors_convert_into_thz_error() {
        let err: ThzError = DeviceError::UnknownRegister.into();
        assert!(matches!(
            err,
            ThzError::Device(DeviceError::UnknownRegister)
        ));
        assert!(!err.is_link_failure());

        let err: ThzError = HandshakeError::Step1(String::new()).into();
        assert!(err.is_link_failure());
    }
}
