//! Firmware-versioned register catalogs
//!
//! A catalog is built from a firmware independent base table and a
//! per-firmware override table. Tables come from the built-in data in
//! [`builtin`] or, when a schema directory is configured, from YAML files
//! (see [`schema`]).

pub mod builtin;
pub mod entry;
pub mod manager;
pub mod schema;

pub use entry::{normalize_name, EntryKind, RegisterEntry, SettingValue, WriteRegisterEntry};
pub use manager::{
    merge_read_maps, merge_write_maps, RegisterMap, RegisterMapManager, WriteRegisterMap,
    WriteRegisterMapManager,
};

use crate::error::ConfigurationError;

/// Legacy block keys carry this prefix (`pxxFB`)
const LEGACY_PREFIX: &str = "pxx";

/// Canonical form of a block id: prefix stripped, uppercase hex
pub fn normalize_block_id(id: &str) -> Result<String, ConfigurationError> {
    let trimmed = id.trim();
    let bare = match trimmed.get(..LEGACY_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LEGACY_PREFIX) => &trimmed[LEGACY_PREFIX.len()..],
        _ => trimmed,
    };

    if bare.is_empty() || bare.len() % 2 != 0 || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigurationError::InvalidBlockId(id.to_string()));
    }
    Ok(bare.to_ascii_uppercase())
}

/// Register address bytes for a block id
pub fn block_address(id: &str) -> Result<Vec<u8>, ConfigurationError> {
    let normalized = normalize_block_id(id)?;
    hex::decode(&normalized).map_err(|_| ConfigurationError::InvalidBlockId(id.to_string()))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_normalize_block_id() {
        assert_eq!(normalize_block_id("pxxFB").unwrap(), "FB");
        assert_eq!(normalize_block_id("fb").unwrap(), "FB");
        assert_eq!(normalize_block_id(" PXX0a0176 ").unwrap(), "0A0176");
    }

    #[test]
    fn test_invalid_block_ids() {
        for id in ["", "pxx", "F", "GG", "0A01 76"] {
            assert!(
                matches!(normalize_block_id(id), Err(ConfigurationError::InvalidBlockId(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_block_address() {
        assert_eq!(block_address("FB").unwrap(), vec![0xFB]);
        assert_eq!(block_address("pxx0A0176").unwrap(), vec![0x0A, 0x01, 0x76]);
    }
}
