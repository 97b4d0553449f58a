//! Switching-program times, stored as quarter hours since midnight

use chrono::{NaiveTime, Timelike};

/// Quarter-hour byte meaning "no time set"
pub const UNSET_QUARTERS: u8 = 0x80;

/// `None` for the unset marker and for values past 23:45
pub fn quarters_to_time(quarters: u8) -> Option<NaiveTime> {
    if quarters == UNSET_QUARTERS {
        return None;
    }
    let hour = u32::from(quarters / 4);
    let minute = u32::from(quarters % 4) * 15;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Minutes are truncated to the quarter hour
pub fn time_to_quarters(time: Option<NaiveTime>) -> u8 {
    match time {
        Some(t) => (t.hour() * 4 + t.minute() / 15) as u8,
        None => UNSET_QUARTERS,
    }
}
