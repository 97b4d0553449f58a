//! Read and write catalog managers

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use super::entry::{RegisterEntry, WriteRegisterEntry};
use super::{builtin, normalize_block_id, schema};
use crate::error::Result;

/// Block id → ordered fields
pub type RegisterMap = BTreeMap<String, Vec<RegisterEntry>>;

/// Setting name → writable entry
pub type WriteRegisterMap = BTreeMap<String, WriteRegisterEntry>;

/// Per block: base fields not named in the override keep their order, then
/// every override field is appended
pub fn merge_read_maps(base: RegisterMap, overrides: RegisterMap) -> RegisterMap {
    let mut merged = base;
    for (block, entries) in overrides {
        match merged.get_mut(&block) {
            Some(existing) => {
                let replaced: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                existing.retain(|e| !replaced.contains(e.name.as_str()));
                existing.extend(entries);
            },
            None => {
                merged.insert(block, entries);
            },
        }
    }
    merged
}

/// Override entries replace base entries with the same name as a whole
pub fn merge_write_maps(base: WriteRegisterMap, overrides: WriteRegisterMap) -> WriteRegisterMap {
    let mut merged = base;
    merged.extend(overrides);
    merged
}

/// Effective read catalog for one firmware version
#[derive(Debug, Clone)]
pub struct RegisterMapManager {
    firmware_version: String,
    registers: RegisterMap,
}

impl RegisterMapManager {
    /// Catalog from the built-in tables
    pub fn new(firmware_version: &str) -> Self {
        Self::from_maps(
            firmware_version,
            builtin::base_read_map(),
            builtin::firmware_read_map(firmware_version),
        )
    }

    /// Catalog from `schema_dir` if given, built-in tables otherwise
    ///
    /// Each file that is missing falls back to the matching built-in table.
    pub fn load(firmware_version: &str, schema_dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = schema_dir else {
            return Ok(Self::new(firmware_version));
        };

        let base = schema::load_read_map(&dir.join(schema::READ_BASE_FILE))?
            .unwrap_or_else(builtin::base_read_map);
        let overrides = schema::load_read_map(&dir.join(schema::read_override_file(firmware_version)))?
            .unwrap_or_else(|| builtin::firmware_read_map(firmware_version));

        Ok(Self::from_maps(firmware_version, base, overrides))
    }

    pub fn from_maps(firmware_version: &str, base: RegisterMap, overrides: RegisterMap) -> Self {
        let registers = merge_read_maps(base, overrides);

        for (block, entries) in &registers {
            for entry in entries.iter().filter(|e| e.decode_type.is_unknown()) {
                warn!(
                    "Unknown decode tag '{}' for {}/{}, values will be shown as hex",
                    entry.decode_type, block, entry.name
                );
            }
        }
        debug!(
            "Read map for firmware {}: {} blocks, {} fields",
            firmware_version,
            registers.len(),
            registers.values().map(Vec::len).sum::<usize>()
        );

        Self {
            firmware_version: firmware_version.to_string(),
            registers,
        }
    }

    pub fn get_all_registers(&self) -> &RegisterMap {
        &self.registers
    }

    /// Fields of a block; empty for an unknown block
    pub fn get_registers_for_block(&self, id: &str) -> &[RegisterEntry] {
        let key = normalize_block_id(id).unwrap_or_else(|_| id.to_string());
        self.registers.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, block: &str, name: &str) -> Option<&RegisterEntry> {
        self.get_registers_for_block(block)
            .iter()
            .find(|e| e.name == name)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        self.registers.keys().map(String::as_str)
    }

    pub fn get_firmware_version(&self) -> &str {
        &self.firmware_version
    }
}

/// Effective write catalog for one firmware version
#[derive(Debug, Clone)]
pub struct WriteRegisterMapManager {
    firmware_version: String,
    registers: WriteRegisterMap,
}

impl WriteRegisterMapManager {
    pub fn new(firmware_version: &str) -> Self {
        Self::from_maps(
            firmware_version,
            builtin::base_write_map(),
            builtin::firmware_write_map(firmware_version),
        )
    }

    pub fn load(firmware_version: &str, schema_dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = schema_dir else {
            return Ok(Self::new(firmware_version));
        };

        let base = schema::load_write_map(&dir.join(schema::WRITE_BASE_FILE))?
            .unwrap_or_else(builtin::base_write_map);
        let overrides = schema::load_write_map(&dir.join(schema::write_override_file(firmware_version)))?
            .unwrap_or_else(|| builtin::firmware_write_map(firmware_version));

        Ok(Self::from_maps(firmware_version, base, overrides))
    }

    pub fn from_maps(
        firmware_version: &str,
        base: WriteRegisterMap,
        overrides: WriteRegisterMap,
    ) -> Self {
        let registers = merge_write_maps(base, overrides);
        debug!(
            "Write map for firmware {}: {} settings",
            firmware_version,
            registers.len()
        );
        Self {
            firmware_version: firmware_version.to_string(),
            registers,
        }
    }

    pub fn get_all_registers(&self) -> &WriteRegisterMap {
        &self.registers
    }

    pub fn get(&self, name: &str) -> Option<&WriteRegisterEntry> {
        self.registers.get(name)
    }

    pub fn get_firmware_version(&self) -> &str {
        &self.firmware_version
    }
}
