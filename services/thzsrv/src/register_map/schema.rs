//! YAML register schema files
//!
//! ```yaml
//! # register_map_206.yaml
//! firmware: "206"
//! blocks:
//!   pxxFB:
//!     - { name: flowRate, offset: 110, length: 4, decode: hex, factor: 10 }
//!
//! # write_map_all.yaml
//! firmware: all
//! registers:
//!   p01RoomTempDayHC1:
//!     { command: "0B0005", min: 12, max: 32, step: 0.1, type: number, factor: 10 }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use super::entry::{normalize_name, RegisterEntry, WriteRegisterEntry};
use super::manager::{RegisterMap, WriteRegisterMap};
use super::normalize_block_id;
use crate::error::ConfigurationError;

pub const READ_BASE_FILE: &str = "register_map_all.yaml";
pub const WRITE_BASE_FILE: &str = "write_map_all.yaml";

pub fn read_override_file(firmware_version: &str) -> String {
    format!("register_map_{firmware_version}.yaml")
}

pub fn write_override_file(firmware_version: &str) -> String {
    format!("write_map_{firmware_version}.yaml")
}

#[derive(Debug, Deserialize)]
struct ReadSchemaFile {
    #[serde(default)]
    blocks: BTreeMap<String, Vec<RegisterEntry>>,
}

#[derive(Debug, Deserialize)]
struct WriteSchemaFile {
    #[serde(default)]
    registers: BTreeMap<String, WriteRegisterEntry>,
}

fn schema_error(path: &Path, reason: impl ToString) -> ConfigurationError {
    ConfigurationError::Schema {
        file: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// File contents, `None` when the file does not exist
fn read_optional(path: &Path) -> Result<Option<String>, ConfigurationError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(schema_error(path, e)),
    }
}

pub fn parse_read_map(path: &Path, content: &str) -> Result<RegisterMap, ConfigurationError> {
    let file: ReadSchemaFile =
        serde_yaml::from_str(content).map_err(|e| schema_error(path, e))?;

    let mut map = RegisterMap::new();
    for (id, mut entries) in file.blocks {
        let block = normalize_block_id(&id).map_err(|e| schema_error(path, e))?;
        for entry in &mut entries {
            entry.name = normalize_name(&entry.name);
        }
        map.insert(block, entries);
    }
    Ok(map)
}

pub fn parse_write_map(path: &Path, content: &str) -> Result<WriteRegisterMap, ConfigurationError> {
    let file: WriteSchemaFile =
        serde_yaml::from_str(content).map_err(|e| schema_error(path, e))?;

    let mut map = WriteRegisterMap::new();
    for (name, mut entry) in file.registers {
        entry.command_bytes().map_err(|e| schema_error(path, e))?;
        entry.name = name.clone();
        map.insert(name, entry);
    }
    Ok(map)
}

pub fn load_read_map(path: &Path) -> Result<Option<RegisterMap>, ConfigurationError> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    let map = parse_read_map(path, &content)?;
    info!("Loaded read schema {} ({} blocks)", path.display(), map.len());
    Ok(Some(map))
}

pub fn load_write_map(path: &Path) -> Result<Option<WriteRegisterMap>, ConfigurationError> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    let map = parse_write_map(path, &content)?;
    info!("Loaded write schema {} ({} settings)", path.display(), map.len());
    Ok(Some(map))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::decoder::DecodeType;
    use crate::register_map::entry::EntryKind;
    use crate::register_map::{RegisterMapManager, WriteRegisterMapManager};
    use tempfile::TempDir;

    const READ_OVERRIDE: &str = r#"
firmware: "206"
blocks:
  pxxFB:
    - { name: " flowRate: ", offset: 110, length: 4, decode: hex, factor: 10 }
  "09":
    - { name: compressorHeating, offset: 4, length: 4, decode: hex }
"#;

    #[test]
    fn test_parse_read_map() {
        let map = parse_read_map(Path::new("inline.yaml"), READ_OVERRIDE).unwrap();
        let fb = &map["FB"];
        assert_eq!(fb[0].name, "flowRate");
        assert_eq!(fb[0].decode_type, DecodeType::Hex);
        assert_eq!(fb[0].factor, 10.0);
        assert_eq!(map["09"][0].factor, 1.0);
    }

    #[test]
    fn test_bad_block_id_is_a_schema_error() {
        let content = "blocks:\n  pxxZZ: []\n";
        let err = parse_read_map(Path::new("bad.yaml"), content).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_read_map(&dir.path().join("register_map_all.yaml"))
            .unwrap()
            .is_none());
        assert!(load_write_map(&dir.path().join("write_map_all.yaml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(WRITE_BASE_FILE);
        std::fs::write(&path, "registers: [not, a, map]").unwrap();
        let err = load_write_map(&path).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
    }

    #[test]
    fn test_managers_prefer_schema_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(read_override_file("206")), READ_OVERRIDE).unwrap();
        std::fs::write(
            dir.path().join(WRITE_BASE_FILE),
            r#"
registers:
  pSwitch:
    { command: "0A0575", type: switch }
"#,
        )
        .unwrap();

        // Base read table is missing and falls back to the built-in one
        let reads = RegisterMapManager::load("206", Some(dir.path())).unwrap();
        let fb = reads.get_registers_for_block("FB");
        assert_eq!(fb.last().unwrap().name, "flowRate");
        assert!(reads.find("FB", "outsideTemp").is_some());
        assert_eq!(reads.get_registers_for_block("09").len(), 1);

        let writes = WriteRegisterMapManager::load("206", Some(dir.path())).unwrap();
        let switch = writes.get("pSwitch").unwrap();
        assert_eq!(switch.name, "pSwitch");
        assert_eq!(switch.kind, EntryKind::Switch);
        assert!(writes.get("p01RoomTempDayHC1").is_some());
    }
}
