//! Enumerated code ↔ label tables
//!
//! Codes are keyed by their decimal string. A table may require zero padding
//! of that string before lookup (the summer/winter table uses `"01"`,
//! `"02"`), so padding is a property of the table, not of the lookup.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeTable {
    name: &'static str,
    pad: usize,
    entries: &'static [(&'static str, &'static str)],
}

pub const OP_MODE: CodeTable = CodeTable {
    name: "2opmode",
    pad: 0,
    entries: &[
        ("1", "standby"),
        ("11", "automatic"),
        ("3", "DAYmode"),
        ("4", "setback"),
        ("5", "DHWmode"),
        ("14", "manual"),
        ("0", "emergency"),
    ],
};

pub const OP_MODE_HC: CodeTable = CodeTable {
    name: "OpModeHC",
    pad: 0,
    entries: &[
        ("1", "normal"),
        ("2", "setback"),
        ("3", "standby"),
        ("4", "restart"),
        ("5", "restart"),
    ],
};

pub const OP_MODE_2: CodeTable = CodeTable {
    name: "OpMode2",
    pad: 0,
    entries: &[("0", "manual"), ("1", "automatic")],
};

pub const SOM_WIN_MODE: CodeTable = CodeTable {
    name: "SomWinMode",
    pad: 2,
    entries: &[("01", "winter"), ("02", "summer")],
};

pub const WEEKDAY: CodeTable = CodeTable {
    name: "weekday",
    pad: 0,
    entries: &[
        ("0", "Monday"),
        ("1", "Tuesday"),
        ("2", "Wednesday"),
        ("3", "Thursday"),
        ("4", "Friday"),
        ("5", "Saturday"),
        ("6", "Sunday"),
    ],
};

pub const FAULT_MAP: CodeTable = CodeTable {
    name: "faultmap",
    pad: 0,
    entries: &[
        ("0", "n.a."),
        ("1", "F01_AnodeFault"),
        ("2", "F02_SafetyTempDelimiterEngaged"),
        ("3", "F03_HighPreasureGuardFault"),
        ("4", "F04_LowPreasureGuardFault"),
        ("5", "F05_OutletFanFault"),
        ("6", "F06_InletFanFault"),
        ("7", "F07_MainOutputFanFault"),
        ("11", "F11_LowPreasureSensorFault"),
        ("12", "F12_HighPreasureSensorFault"),
        ("15", "F15_DHW_TemperatureFault"),
        ("17", "F17_DefrostingDurationExceeded"),
        ("20", "F20_SolarSensorFault"),
        ("21", "F21_OutsideTemperatureSensorFault"),
        ("22", "F22_HotGasTemperatureFault"),
        ("23", "F23_CondenserTemperatureSensorFault"),
        ("24", "F24_EvaporatorTemperatureSensorFault"),
        ("26", "F26_ReturnTemperatureSensorFault"),
        ("28", "F28_FlowTemperatureSensorFault"),
        ("29", "F29_DHW_TemperatureSensorFault"),
        ("30", "F30_SoftwareVersionFault"),
        ("31", "F31_RAMfault"),
        ("32", "F32_EEPromFault"),
        ("33", "F33_ExtractAirHumiditySensor"),
        ("34", "F34_FlowSensor"),
        ("35", "F35_minFlowCooling"),
        ("36", "F36_MinFlowRate"),
        ("37", "F37_MinWaterPressure"),
        ("40", "F40_FloatSwitch"),
        ("50", "F50_SensorHeatPumpReturn"),
        ("51", "F51_SensorHeatPumpFlow"),
        ("52", "F52_SensorCondenserOutlet"),
    ],
};

const ALL: [&CodeTable; 6] = [
    &OP_MODE,
    &OP_MODE_HC,
    &OP_MODE_2,
    &SOM_WIN_MODE,
    &WEEKDAY,
    &FAULT_MAP,
];

impl CodeTable {
    /// Look a table up by the name used in write schemas (`decode_type`)
    pub fn by_name(name: &str) -> Option<&'static CodeTable> {
        ALL.into_iter().find(|table| table.name == name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lookup key for a raw code, padded as this table requires
    pub fn key(&self, code: u64) -> String {
        format!("{:0width$}", code, width = self.pad)
    }

    pub fn label(&self, code: u64) -> Option<&'static str> {
        let key = self.key(code);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| *label)
    }

    /// Reverse lookup; with duplicate labels the last code wins
    pub fn code(&self, label: &str) -> Option<u16> {
        self.entries
            .iter()
            .rev()
            .find(|(_, l)| *l == label)
            .and_then(|(k, _)| k.parse().ok())
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(_, label)| *label)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_summer_winter_codes_are_padded() {
        assert_eq!(SOM_WIN_MODE.key(1), "01");
        assert_eq!(SOM_WIN_MODE.label(1), Some("winter"));
        assert_eq!(SOM_WIN_MODE.label(2), Some("summer"));
        assert_eq!(SOM_WIN_MODE.code("summer"), Some(2));
    }

    #[test]
    fn test_other_tables_are_not_padded() {
        assert_eq!(OP_MODE.key(1), "1");
        assert_eq!(OP_MODE.label(11), Some("automatic"));
        assert_eq!(OP_MODE.label(2), None);
        assert_eq!(WEEKDAY.label(6), Some("Sunday"));
        assert_eq!(FAULT_MAP.label(17), Some("F17_DefrostingDurationExceeded"));
    }

    #[test]
    fn test_reverse_lookup_prefers_last_duplicate() {
        assert_eq!(OP_MODE_HC.code("restart"), Some(5));
        assert_eq!(OP_MODE_HC.code("normal"), Some(1));
        assert_eq!(OP_MODE_HC.code("Normal"), None);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(CodeTable::by_name("2opmode"), Some(&OP_MODE));
        assert_eq!(CodeTable::by_name("SomWinMode"), Some(&SOM_WIN_MODE));
        assert!(CodeTable::by_name("colors").is_none());
        assert_eq!(OP_MODE_2.labels().collect::<Vec<_>>(), vec!["manual", "automatic"]);
    }
}
