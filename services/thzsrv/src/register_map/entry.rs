//! Register schema entries

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::decoder::code_table::CodeTable;
use crate::decoder::time::{quarters_to_time, time_to_quarters};
use crate::decoder::{decode_value, extract_field, DecodeType, DecodedValue};
use crate::error::{ConfigurationError, ProtocolError, Result, ThzError};

fn default_factor() -> f64 {
    1.0
}

fn default_step() -> f64 {
    1.0
}

/// Field names in legacy tables carry padding and a trailing colon
pub fn normalize_name(raw: &str) -> String {
    raw.trim().trim_end_matches(':').trim().to_string()
}

/// One field inside a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub name: String,
    /// Offset in hex characters into the block bytes
    pub offset: usize,
    /// Length in hex characters
    pub length: usize,
    #[serde(rename = "decode")]
    pub decode_type: DecodeType,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_group: Option<String>,
}

impl RegisterEntry {
    pub fn new(name: &str, offset: usize, length: usize, decode: &str, factor: f64) -> Self {
        Self {
            name: normalize_name(name),
            offset,
            length,
            decode_type: DecodeType::parse(decode),
            factor,
            refresh_group: None,
        }
    }

    pub fn with_refresh_group(mut self, group: impl Into<String>) -> Self {
        self.refresh_group = Some(group.into());
        self
    }

    pub fn byte_offset(&self) -> usize {
        self.offset / 2
    }

    pub fn byte_length(&self) -> usize {
        self.length.div_ceil(2)
    }

    pub fn extract<'a>(&self, block: &'a [u8]) -> std::result::Result<Cow<'a, [u8]>, ProtocolError> {
        extract_field(block, self.offset, self.length)
    }

    pub fn decode(&self, block: &[u8]) -> std::result::Result<DecodedValue, ProtocolError> {
        let raw = self.extract(block)?;
        Ok(decode_value(&raw, &self.decode_type, self.factor))
    }
}

/// How a writable setting is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Number,
    Switch,
    Select,
    Time,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::Number => "number",
            EntryKind::Switch => "switch",
            EntryKind::Select => "select",
            EntryKind::Time => "time",
        };
        f.write_str(s)
    }
}

/// Current or requested value of a writable setting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(f64),
    Switch(bool),
    Select(String),
    /// `None` is the unset marker
    Time(Option<NaiveTime>),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Number(v) => write!(f, "{v}"),
            SettingValue::Switch(true) => f.write_str("on"),
            SettingValue::Switch(false) => f.write_str("off"),
            SettingValue::Select(label) => f.write_str(label),
            SettingValue::Time(Some(t)) => write!(f, "{}", t.format("%H:%M")),
            SettingValue::Time(None) => f.write_str("unset"),
        }
    }
}

/// One writable setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRegisterEntry {
    /// Filled from the map key when loaded from a schema file
    #[serde(default)]
    pub name: String,
    /// Register address as hex, e.g. `0A0112`
    pub command: String,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Code table name for `select` entries
    #[serde(default)]
    pub decode_type: Option<String>,
    /// Scale between the displayed number and the raw register value
    #[serde(default = "default_factor")]
    pub factor: f64,
}

impl WriteRegisterEntry {
    pub fn command_bytes(&self) -> std::result::Result<Vec<u8>, ConfigurationError> {
        hex::decode(&self.command)
            .map_err(|_| ConfigurationError::InvalidBlockId(self.command.clone()))
    }

    pub fn code_table(&self) -> Option<&'static CodeTable> {
        self.decode_type.as_deref().and_then(CodeTable::by_name)
    }

    fn select_table(&self) -> Result<&'static CodeTable> {
        self.code_table().ok_or_else(|| {
            ThzError::invalid_value(format!(
                "{} has no code table (decode_type {:?})",
                self.name, self.decode_type
            ))
        })
    }

    /// Parse user input for this setting
    pub fn parse_value(&self, input: &str) -> Result<SettingValue> {
        let input = input.trim();
        match self.kind {
            EntryKind::Number => input
                .parse::<f64>()
                .map(SettingValue::Number)
                .map_err(|_| ThzError::invalid_value(format!("{}: '{input}' is not a number", self.name))),
            EntryKind::Switch => match input.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Ok(SettingValue::Switch(true)),
                "off" | "false" | "0" => Ok(SettingValue::Switch(false)),
                _ => Err(ThzError::invalid_value(format!(
                    "{}: expected on or off, got '{input}'",
                    self.name
                ))),
            },
            EntryKind::Select => {
                let table = self.select_table()?;
                match table.labels().find(|label| *label == input) {
                    Some(label) => Ok(SettingValue::Select(label.to_string())),
                    None => Err(ThzError::invalid_value(format!(
                        "{}: '{input}' is not one of [{}]",
                        self.name,
                        table.labels().collect::<Vec<_>>().join(", ")
                    ))),
                }
            },
            EntryKind::Time => {
                if input.is_empty() || input.eq_ignore_ascii_case("unset") {
                    return Ok(SettingValue::Time(None));
                }
                NaiveTime::parse_from_str(input, "%H:%M")
                    .map(|t| SettingValue::Time(Some(t)))
                    .map_err(|_| {
                        ThzError::invalid_value(format!("{}: '{input}' is not HH:MM", self.name))
                    })
            },
        }
    }

    /// Two value bytes that follow the command in a write telegram
    pub fn encode(&self, value: &SettingValue) -> Result<[u8; 2]> {
        match (self.kind, value) {
            (EntryKind::Number, SettingValue::Number(v)) => {
                if *v < self.min || *v > self.max {
                    return Err(ThzError::invalid_value(format!(
                        "{}: {v} outside [{}, {}]",
                        self.name, self.min, self.max
                    )));
                }
                let raw = (v * self.factor).round();
                if raw < f64::from(i16::MIN) || raw > f64::from(i16::MAX) {
                    return Err(ThzError::invalid_value(format!(
                        "{}: {v} does not fit the register",
                        self.name
                    )));
                }
                Ok((raw as i16).to_be_bytes())
            },
            (EntryKind::Switch, SettingValue::Switch(on)) => Ok(u16::from(*on).to_be_bytes()),
            (EntryKind::Select, SettingValue::Select(label)) => {
                let table = self.select_table()?;
                let code = table.code(label).ok_or_else(|| {
                    ThzError::invalid_value(format!("{}: unknown option '{label}'", self.name))
                })?;
                Ok(code.to_le_bytes())
            },
            (EntryKind::Time, SettingValue::Time(t)) => Ok([time_to_quarters(*t), 0x00]),
            (kind, value) => Err(ThzError::invalid_value(format!(
                "{}: {kind} setting cannot take {value:?}",
                self.name
            ))),
        }
    }

    /// Interpret the two value bytes read back from the command register
    pub fn decode(&self, raw: [u8; 2]) -> SettingValue {
        match self.kind {
            EntryKind::Number => {
                let v = f64::from(i16::from_be_bytes(raw));
                let factor = if self.factor == 0.0 { 1.0 } else { self.factor };
                SettingValue::Number(v / factor)
            },
            EntryKind::Switch => SettingValue::Switch(u16::from_be_bytes(raw) != 0),
            EntryKind::Select => {
                let code = u16::from_le_bytes(raw);
                let label = match self.code_table() {
                    Some(table) => table
                        .label(u64::from(code))
                        .map(str::to_string)
                        .unwrap_or_else(|| table.key(u64::from(code))),
                    None => code.to_string(),
                };
                SettingValue::Select(label)
            },
            EntryKind::Time => SettingValue::Time(quarters_to_time(raw[0])),
        }
    }
}
