//! Text shown by the three telemetry labels. Every reader degrades to
//! [`UNDEFINED`] instead of failing.

use crate::telemetry::{BatteryState, Telemetry};

pub const UNDEFINED: &str = "Undefined";

pub fn flight_mode(telemetry: &Telemetry) -> String {
    match telemetry.vehicle() {
        Ok(Some(state)) => state.mode.clone(),
        _ => UNDEFINED.to_string(),
    }
}

pub fn arming_state(telemetry: &Telemetry) -> String {
    match telemetry.vehicle() {
        Ok(Some(state)) if state.armed => "Armed".to_string(),
        Ok(Some(_)) => "Disarmed".to_string(),
        _ => UNDEFINED.to_string(),
    }
}

pub fn battery_status(telemetry: &Telemetry) -> String {
    match telemetry.battery() {
        Ok(Some(state)) => format_battery(&state).unwrap_or_else(|| UNDEFINED.to_string()),
        _ => UNDEFINED.to_string(),
    }
}

/// `None` when any of the four fields is missing.
pub fn format_battery(state: &BatteryState) -> Option<String> {
    Some(format!(
        "Voltage: {}, Current: {}, Charge: {}, Percentage: {}",
        grouped(state.voltage?),
        grouped(state.current?),
        grouped(state.charge?),
        grouped(state.percentage?),
    ))
}

/// Two decimals with a comma between every three integer digits.
pub fn grouped(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let fixed = format!("{:.2}", value);

    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out.push('.');
    out.push_str(frac_part);
    out
}

/// A label that re-reads its value on every tick and reports whether the
/// shown text changed.
pub struct LiveLabel {
    read: fn(&Telemetry) -> String,
    value: String,
}

impl LiveLabel {
    pub fn new(read: fn(&Telemetry) -> String) -> Self {
        Self {
            read,
            value: UNDEFINED.to_string(),
        }
    }

    pub fn flight_mode() -> Self {
        Self::new(flight_mode)
    }

    pub fn arming_state() -> Self {
        Self::new(arming_state)
    }

    pub fn battery_status() -> Self {
        Self::new(battery_status)
    }

    /// Returns `true` when the text differs from what was shown before.
    pub fn refresh(&mut self, telemetry: &Telemetry) -> bool {
        let next = (self.read)(telemetry);
        if next == self.value {
            return false;
        }
        self.value = next;
        true
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
