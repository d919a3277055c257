//! Nightly top-up window and deadline arithmetic
//!
//! The window is a pair of wall-clock times that may wrap midnight. The end
//! time doubles as the deadline by which the vehicle must reach its top-up
//! SoC.

use crate::config::NightlyConfig;
use crate::error::{ChargerError, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Parse an `HH:MM` string into a wall-clock time
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Configured nightly window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightlyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl NightlyWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start == end {
            return Err(ChargerError::validation(
                "nightly.end",
                "Window start and end must differ",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn from_config(cfg: &NightlyConfig) -> Result<Self> {
        let start = parse_hhmm(&cfg.start)
            .ok_or_else(|| ChargerError::validation("nightly.start", "Expected HH:MM"))?;
        let end = parse_hhmm(&cfg.end)
            .ok_or_else(|| ChargerError::validation("nightly.end", "Expected HH:MM"))?;
        Self::new(start, end)
    }

    /// Whether `time` falls inside `[start, end)`, wrapping midnight
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    /// Hours from `time` until the next occurrence of the window end
    pub fn hours_until_end(&self, time: NaiveTime) -> f64 {
        let now = i64::from(time.num_seconds_from_midnight());
        let end = i64::from(self.end.num_seconds_from_midnight());
        let secs = (end - now).rem_euclid(SECONDS_PER_DAY);
        secs as f64 / 3600.0
    }
}

/// Average power needed to meet the nightly target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "watts", rename_all = "snake_case")]
pub enum RequiredPower {
    /// Spread the remaining energy over the remaining time
    Watts(f64),
    /// The deadline is now; use whatever the limits allow
    Maximum,
}

impl RequiredPower {
    /// Apply an upper bound
    pub fn capped_at(self, limit: f64) -> f64 {
        match self {
            RequiredPower::Watts(w) => w.min(limit),
            RequiredPower::Maximum => limit,
        }
    }
}

/// Inputs and result of one nightly recalculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NightlyRequirement {
    pub required_energy_wh: f64,
    pub remaining_hours: f64,
    pub required_power: RequiredPower,
}

/// Compute the average charging power that raises `vehicle_soc` to
/// `top_up_soc` within `remaining_hours`.
pub fn required_power(
    vehicle_soc: f64,
    top_up_soc: f64,
    capacity_wh: f64,
    efficiency: f64,
    remaining_hours: f64,
) -> NightlyRequirement {
    let missing = (top_up_soc - vehicle_soc).max(0.0);
    let required_energy_wh = missing / 100.0 * capacity_wh * efficiency;
    let required_power = if remaining_hours <= 0.0 {
        RequiredPower::Maximum
    } else {
        RequiredPower::Watts(required_energy_wh / remaining_hours)
    };
    NightlyRequirement {
        required_energy_wh,
        remaining_hours,
        required_power,
    }
}
