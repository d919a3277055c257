//! Charging control algorithms
//!
//! Converts the power budget of the active plan into a charger command.
//! Amps are always floored so rounding can never push the charger past a
//! power ceiling, and every command is either `Off` or within
//! `[min_amps, max_amps]`.

use crate::battery::{BatteryTier, TierSelection};
use crate::config::{ChargerConfig, NightlyConfig};
use crate::logging::get_logger;
use crate::plan::ChargingPlan;
use crate::schedule::RequiredPower;
use crate::telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};

/// Desired charger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChargeCommand {
    pub on: bool,
    /// Zero whenever `on` is false
    pub amps: u32,
}

impl ChargeCommand {
    pub const OFF: ChargeCommand = ChargeCommand { on: false, amps: 0 };

    pub fn charge(amps: u32) -> Self {
        Self { on: true, amps }
    }
}

impl std::fmt::Display for ChargeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.on {
            write!(f, "on@{}A", self.amps)
        } else {
            f.write_str("off")
        }
    }
}

/// Amperage solver
#[derive(Clone)]
pub struct ChargingControls {
    min_amps: u32,
    max_amps: u32,
    min_power: f64,
    max_power: f64,
    watts_per_amp: f64,
    amps_offset: i32,
    logger: crate::logging::StructuredLogger,
}

impl ChargingControls {
    /// Create new charging controls
    pub fn new(charger: &ChargerConfig, nightly: &NightlyConfig) -> Self {
        Self {
            min_amps: charger.min_amps,
            max_amps: charger.max_amps,
            min_power: charger.min_power,
            max_power: charger.max_power,
            watts_per_amp: charger.watts_per_amp(),
            amps_offset: nightly.amps_offset,
            logger: get_logger("controls"),
        }
    }

    /// Whole amps deliverable within `watts`, rounded down
    pub fn watts_to_amps(&self, watts: f64) -> u32 {
        if !watts.is_finite() || watts <= 0.0 || self.watts_per_amp <= 0.0 {
            return 0;
        }
        let amps = (watts / self.watts_per_amp).floor();
        if amps >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            amps as u32
        }
    }

    /// Power drawn at `amps`
    pub fn amps_to_watts(&self, amps: u32) -> f64 {
        f64::from(amps) * self.watts_per_amp
    }

    /// Solve the command for `plan`. `None` means the controller must not
    /// act this cycle (an external party owns the charger).
    pub fn solve(
        &self,
        plan: ChargingPlan,
        tier: &TierSelection,
        snapshot: &TelemetrySnapshot,
        required: Option<RequiredPower>,
    ) -> Option<ChargeCommand> {
        match plan {
            ChargingPlan::Off => Some(ChargeCommand::OFF),
            ChargingPlan::PassThroughExternal => None,
            ChargingPlan::SolarFollowing => {
                Some(self.solve_solar(tier.max_grid_power_watts, snapshot.surplus_watts()))
            }
            ChargingPlan::NightlyTarget => Some(self.solve_nightly(
                tier.tier,
                tier.max_grid_power_watts,
                required.unwrap_or(RequiredPower::Watts(0.0)),
            )),
        }
    }

    /// Follow the PV surplus, never drawing from the grid to reach `min_amps`
    pub fn solve_solar(&self, tier_max_watts: f64, surplus_watts: f64) -> ChargeCommand {
        let available = surplus_watts
            .max(0.0)
            .min(tier_max_watts.max(0.0))
            .min(self.max_power);
        if available < self.min_power {
            self.logger.debug(&format!(
                "Solar surplus {:.0} W below min_power {:.0} W (tier cap {:.0} W)",
                available, self.min_power, tier_max_watts
            ));
            return ChargeCommand::OFF;
        }

        let amps = self
            .watts_to_amps(available)
            .clamp(self.min_amps, self.max_amps);
        ChargeCommand::charge(amps)
    }

    /// Charge at the average power the deadline needs, at least `min_amps`,
    /// unless battery protection forbids charging altogether.
    pub fn solve_nightly(
        &self,
        tier: BatteryTier,
        tier_max_watts: f64,
        required: RequiredPower,
    ) -> ChargeCommand {
        if tier == BatteryTier::NoCharging || tier_max_watts <= 0.0 {
            self.logger.info(&format!(
                "Nightly charging blocked by battery tier {}",
                tier
            ));
            return ChargeCommand::OFF;
        }

        let available = required.capped_at(tier_max_watts.min(self.max_power));
        let floored = i64::from(self.watts_to_amps(available));
        let adjusted = floored - i64::from(self.amps_offset);
        let amps = adjusted.clamp(i64::from(self.min_amps), i64::from(self.max_amps));
        if adjusted < i64::from(self.min_amps) {
            self.logger.debug(&format!(
                "Nightly target needs {:.0} W ({} A); holding min_amps {} A",
                available, adjusted, self.min_amps
            ));
        }
        ChargeCommand::charge(u32::try_from(amps).unwrap_or(self.min_amps))
    }
}
