//! Built-in register tables
//!
//! Rows are `(name, offset, length, decode, factor)` with offsets and lengths
//! in hex characters of the block bytes (checksum first).

use super::entry::{EntryKind, RegisterEntry, WriteRegisterEntry};
use super::manager::{RegisterMap, WriteRegisterMap};

type Row = (&'static str, usize, usize, &'static str, f64);

const BLOCK_FB: &[Row] = &[
    ("outsideTemp", 8, 4, "hex2int", 10.0),
    ("flowTemp", 12, 4, "hex2int", 10.0),
    ("returnTemp", 16, 4, "hex2int", 10.0),
    ("hotGasTemp", 20, 4, "hex2int", 10.0),
    ("dhwTemp", 24, 4, "hex2int", 10.0),
    ("flowTempHC2", 28, 4, "hex2int", 10.0),
    ("evaporatorTemp", 36, 4, "hex2int", 10.0),
    ("condenserTemp", 40, 4, "hex2int", 10.0),
    ("mixerOpen", 45, 1, "bit0", 1.0),
    ("mixerClosed", 45, 1, "bit1", 1.0),
    ("heatPipeValve", 45, 1, "bit2", 1.0),
    ("diverterValve", 45, 1, "bit3", 1.0),
    ("dhwPump", 44, 1, "bit0", 1.0),
    ("heatingCircuitPump", 44, 1, "bit1", 1.0),
    ("solarPump", 44, 1, "bit3", 1.0),
    ("compressor", 47, 1, "bit3", 1.0),
    ("boosterStage3", 46, 1, "bit0", 1.0),
    ("boosterStage2", 46, 1, "bit1", 1.0),
    ("boosterStage1", 46, 1, "bit2", 1.0),
    ("highPressureSensor", 49, 1, "nbit0", 1.0),
    ("lowPressureSensor", 49, 1, "nbit1", 1.0),
    ("evaporatorIceMonitor", 49, 1, "bit2", 1.0),
    ("signalAnode", 49, 1, "bit3", 1.0),
    ("evuRelease", 48, 1, "bit0", 1.0),
    ("ovenFireplace", 48, 1, "bit1", 1.0),
    ("STB", 48, 1, "bit2", 1.0),
    ("outputVentilatorPower", 50, 4, "hex", 10.0),
    ("inputVentilatorPower", 54, 4, "hex", 10.0),
    ("mainVentilatorPower", 58, 4, "hex", 10.0),
    ("outputVentilatorSpeed", 62, 4, "hex", 1.0),
    ("inputVentilatorSpeed", 66, 4, "hex", 1.0),
    ("mainVentilatorSpeed", 70, 4, "hex", 1.0),
    ("outside_tempFiltered", 74, 4, "hex2int", 10.0),
    ("relHumidity", 78, 4, "hex2int", 10.0),
    ("dewPoint", 82, 4, "hex2int", 10.0),
    ("P_Nd", 86, 4, "hex2int", 100.0),
    ("P_Hd", 90, 4, "hex2int", 100.0),
    ("actualPower_Qc", 94, 8, "esp_mant", 1.0),
    ("actualPower_Pel", 102, 8, "esp_mant", 1.0),
    ("collectorTemp", 4, 4, "hex2int", 10.0),
    ("insideTemp", 32, 4, "hex2int", 10.0),
    ("windowOpen", 47, 1, "bit2", 1.0),
    ("quickAirVent", 48, 1, "bit3", 1.0),
    // l/min
    ("flowRate", 110, 4, "hex", 100.0),
    ("p_HCw", 114, 4, "hex", 100.0),
    ("humidityAirOut", 154, 4, "hex", 100.0),
];

const BLOCK_F2: &[Row] = &[
    // 0=DHW 2=heat 5=off 6=defrostEva
    ("heatRequest", 4, 2, "hex", 1.0),
    ("heatRequest2", 6, 2, "hex", 1.0),
    ("hcStage", 8, 2, "hex", 1.0),
    ("dhwStage", 10, 2, "hex", 1.0),
    ("heatStageControlModul", 12, 2, "hex", 1.0),
    ("compBlockTime", 14, 4, "hex2int", 1.0),
    ("pasteurisationMode", 18, 2, "hex", 1.0),
    ("defrostEvaporator", 20, 2, "raw", 1.0),
    ("boosterStage2", 22, 1, "bit3", 1.0),
    ("solarPump", 22, 1, "bit2", 1.0),
    ("boosterStage1", 22, 1, "bit1", 1.0),
    ("compressor", 22, 1, "bit0", 1.0),
    ("heatPipeValve", 23, 1, "bit3", 1.0),
    ("diverterValve", 23, 1, "bit2", 1.0),
    ("dhwPump", 23, 1, "bit1", 1.0),
    ("heatingCircuitPump", 23, 1, "bit0", 1.0),
    ("mixerOpen", 25, 1, "bit1", 1.0),
    ("mixerClosed", 25, 1, "bit0", 1.0),
    ("sensorBits1", 26, 2, "raw", 1.0),
    ("sensorBits2", 28, 2, "raw", 1.0),
    ("boostBlockTimeAfterPumpStart", 30, 4, "hex2int", 1.0),
    ("boostBlockTimeAfterHD", 34, 4, "hex2int", 1.0),
];

const BLOCK_F3: &[Row] = &[
    ("dhwTemp", 4, 4, "hex2int", 10.0),
    ("outsideTemp", 8, 4, "hex2int", 10.0),
    ("dhwSetTemp", 12, 4, "hex2int", 10.0),
    ("compBlockTime", 16, 4, "hex2int", 1.0),
    ("out", 20, 4, "raw", 1.0),
    ("heatBlockTime", 24, 4, "hex2int", 1.0),
    ("dhwBoosterStage", 28, 2, "hex", 1.0),
    ("pasteurisationMode", 32, 2, "hex", 1.0),
    ("dhwOpMode", 34, 2, "opmodehc", 1.0),
    ("x36", 36, 4, "raw", 1.0),
];

const BLOCK_F4: &[Row] = &[
    ("outsideTemp", 4, 4, "hex2int", 10.0),
    ("x08", 8, 4, "hex2int", 10.0),
    ("returnTemp", 12, 4, "hex2int", 10.0),
    ("integralHeat", 16, 4, "hex2int", 1.0),
    ("flowTemp", 20, 4, "hex2int", 10.0),
    ("heatSetTemp", 24, 4, "hex2int", 10.0),
    ("heatTemp", 28, 4, "hex2int", 10.0),
    ("seasonMode", 38, 2, "somwinmode", 1.0),
    ("integralSwitch", 44, 4, "hex2int", 1.0),
    ("hcOpMode", 48, 2, "opmodehc", 1.0),
    ("roomSetTemp", 56, 4, "hex2int", 10.0),
    ("x60", 60, 4, "hex2int", 10.0),
    ("x64", 64, 4, "hex2int", 10.0),
    ("insideTempRC", 68, 4, "hex2int", 10.0),
    ("x72", 72, 4, "hex2int", 10.0),
    ("x76", 76, 4, "hex2int", 10.0),
    ("onHysteresisNo", 32, 2, "hex", 1.0),
    ("offHysteresisNo", 34, 2, "hex", 1.0),
    ("hcBoosterStage", 36, 2, "hex", 1.0),
];

const BLOCK_FC: &[Row] = &[
    ("weekday", 5, 1, "weekday", 1.0),
    ("hour", 6, 2, "hex", 1.0),
    ("minute", 8, 2, "hex", 1.0),
    ("second", 10, 2, "hex", 1.0),
    ("year", 12, 2, "year", 1.0),
    ("month", 14, 2, "hex", 1.0),
    ("day", 16, 2, "hex", 1.0),
];

const BLOCK_FD: &[Row] = &[("version", 4, 4, "hexdate", 1.0)];

const BLOCK_FE: &[Row] = &[
    ("hardwareVersion", 30, 2, "hex", 1.0),
    ("softwareVersion", 32, 4, "swver", 1.0),
    ("softwareDate", 36, 22, "hex2ascii", 1.0),
];

const BLOCK_0A0176: &[Row] = &[
    ("switchingProg", 11, 1, "bit0", 1.0),
    ("compressor", 11, 1, "bit1", 1.0),
    ("heatingHC", 11, 1, "bit2", 1.0),
    ("heatingDHW", 10, 1, "bit0", 1.0),
    ("boosterHC", 10, 1, "bit1", 1.0),
    ("filterBoth", 9, 1, "bit0", 1.0),
    ("ventStage", 9, 1, "bit1", 1.0),
    ("pumpHC", 9, 1, "bit2", 1.0),
    ("defrost", 9, 1, "bit3", 1.0),
    ("filterUp", 8, 1, "bit0", 1.0),
    ("filterDown", 8, 1, "bit1", 1.0),
    ("cooling", 11, 1, "bit3", 1.0),
    ("service", 10, 1, "bit2", 1.0),
];

/// Operating hours, present from firmware 2.06 on
const BLOCK_09_206: &[Row] = &[
    ("compressorHeating", 4, 4, "hex", 1.0),
    ("compressorCooling", 8, 4, "hex", 1.0),
    ("compressorDHW", 12, 4, "hex", 1.0),
    ("boosterDHW", 16, 4, "hex", 1.0),
    ("boosterHeating", 20, 4, "hex", 1.0),
];

const BLOCK_FB_206: &[Row] = &[("flowRate", 110, 4, "hex", 10.0)];

const BLOCK_09_214: &[Row] = &[
    ("compressorHeating", 4, 4, "hex", 1.0),
    ("compressorCooling", 8, 4, "hex", 1.0),
    ("compressorDHW", 12, 4, "hex", 1.0),
    ("boosterDHW", 16, 4, "hex", 1.0),
    ("boosterHeating", 20, 4, "hex", 1.0),
    ("heatRecoveredDay", 24, 4, "hex", 1.0),
];

const BLOCK_F3_214: &[Row] = &[("dhwOpMode", 34, 2, "opmodehc", 1.0)];

fn block(id: &str, rows: &[Row]) -> (String, Vec<RegisterEntry>) {
    let group = format!("refresh{id}");
    let entries = rows
        .iter()
        .map(|(name, offset, length, decode, factor)| {
            RegisterEntry::new(name, *offset, *length, decode, *factor).with_refresh_group(&group)
        })
        .collect();
    (id.to_string(), entries)
}

/// Firmware independent read table
pub fn base_read_map() -> RegisterMap {
    RegisterMap::from([
        block("FB", BLOCK_FB),
        block("F2", BLOCK_F2),
        block("F3", BLOCK_F3),
        block("F4", BLOCK_F4),
        block("FC", BLOCK_FC),
        block("FD", BLOCK_FD),
        block("FE", BLOCK_FE),
        block("0A0176", BLOCK_0A0176),
    ])
}

/// Read override for a firmware version, empty when there is none
pub fn firmware_read_map(firmware_version: &str) -> RegisterMap {
    match firmware_version {
        "206" => RegisterMap::from([block("FB", BLOCK_FB_206), block("09", BLOCK_09_206)]),
        "214" => RegisterMap::from([block("F3", BLOCK_F3_214), block("09", BLOCK_09_214)]),
        _ => RegisterMap::new(),
    }
}

fn setting(name: &str, command: &str, kind: EntryKind) -> WriteRegisterEntry {
    WriteRegisterEntry {
        name: name.to_string(),
        command: command.to_string(),
        min: 0.0,
        max: 0.0,
        step: 1.0,
        unit: None,
        kind,
        device_class: None,
        icon: None,
        decode_type: None,
        factor: 1.0,
    }
}

fn number(name: &str, command: &str, min: f64, max: f64, step: f64, unit: &str, factor: f64) -> WriteRegisterEntry {
    WriteRegisterEntry {
        min,
        max,
        step,
        unit: Some(unit.to_string()),
        factor,
        ..setting(name, command, EntryKind::Number)
    }
}

fn temperature(name: &str, command: &str, min: f64, max: f64) -> WriteRegisterEntry {
    WriteRegisterEntry {
        device_class: Some("temperature".to_string()),
        icon: Some("mdi:thermometer".to_string()),
        ..number(name, command, min, max, 0.1, "°C", 10.0)
    }
}

fn select(name: &str, command: &str, table: &str) -> WriteRegisterEntry {
    WriteRegisterEntry {
        decode_type: Some(table.to_string()),
        ..setting(name, command, EntryKind::Select)
    }
}

fn switch(name: &str, command: &str) -> WriteRegisterEntry {
    WriteRegisterEntry {
        icon: Some("mdi:toggle-switch".to_string()),
        ..setting(name, command, EntryKind::Switch)
    }
}

fn time(name: &str, command: &str) -> WriteRegisterEntry {
    WriteRegisterEntry {
        icon: Some("mdi:clock-outline".to_string()),
        ..setting(name, command, EntryKind::Time)
    }
}

fn keyed(entries: Vec<WriteRegisterEntry>) -> WriteRegisterMap {
    entries.into_iter().map(|e| (e.name.clone(), e)).collect()
}

/// Firmware independent write table
pub fn base_write_map() -> WriteRegisterMap {
    keyed(vec![
        temperature("p01RoomTempDayHC1", "0B0005", 12.0, 32.0),
        temperature("p02RoomTempNightHC1", "0B0008", 12.0, 32.0),
        temperature("p03RoomTempStandbyHC1", "0B013D", 12.0, 32.0),
        temperature("p04DHWsetTempDay", "0A0013", 10.0, 55.0),
        temperature("p05DHWsetTempNight", "0A05BF", 10.0, 55.0),
        number("p07FanStageDay", "0A056C", 0.0, 3.0, 1.0, "", 1.0),
        number("p08FanStageNight", "0A056D", 0.0, 3.0, 1.0, "", 1.0),
        temperature("p49SummerModeTemp", "0A0116", 11.0, 24.0),
        number("p50SummerModeHysteresis", "0A05A2", 0.5, 5.0, 0.1, "K", 10.0),
        select("pOpMode", "0A0112", "2opmode"),
        switch("p75passiveCooling", "0A0575"),
        time("programDHW_Mo_0", "0B1410"),
        time("programDHW_Mo_1", "0B1411"),
    ])
}

/// Write override for a firmware version, empty when there is none
pub fn firmware_write_map(firmware_version: &str) -> WriteRegisterMap {
    match firmware_version {
        "206" => keyed(vec![
            temperature("p01RoomTempDayHC1", "0B0005", 12.0, 30.0),
            select("pSomWinMode", "0A0506", "SomWinMode"),
        ]),
        "214" => keyed(vec![
            number("p13GradientHC1", "0B010E", 0.0, 5.0, 0.01, "", 100.0),
            select("pOpModeHC", "0A0506", "OpModeHC"),
        ]),
        _ => WriteRegisterMap::new(),
    }
}
