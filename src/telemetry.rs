//! Telemetry acquisition
//!
//! A [`TelemetrySnapshot`] is a point-in-time read of every input one
//! decision cycle needs. Values that could not be read, or that came back
//! out of range, are stored as `None` and never defaulted to zero here; the
//! deciding components apply their own fail-safe rules.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source of live readings, one strongly-typed accessor per field
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn vehicle_soc(&self) -> Result<f64>;
    async fn cable_connected(&self) -> Result<bool>;
    async fn charger_on(&self) -> Result<bool>;
    async fn charging_amps(&self) -> Result<f64>;
    async fn charging_limit_soc(&self) -> Result<f64>;
    async fn charging_plan(&self) -> Result<String>;
    async fn inverter_battery_soc(&self) -> Result<f64>;
    async fn battery_load_watts(&self) -> Result<f64>;
    async fn total_house_load_watts(&self) -> Result<f64>;
    async fn grid_power_watts(&self) -> Result<f64>;
    async fn pv_power_watts(&self) -> Result<f64>;
    async fn top_up_limit_soc(&self) -> Result<f64>;
}

/// Named snapshot fields, used for fail-safe reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    VehicleSoc,
    CableConnected,
    ChargerOn,
    ChargingAmps,
    ChargingLimitSoc,
    ChargingPlan,
    InverterBatterySoc,
    BatteryLoadWatts,
    TotalHouseLoadWatts,
    GridPowerWatts,
    PvPowerWatts,
    TopUpLimitSoc,
}

impl TelemetryField {
    pub fn name(self) -> &'static str {
        match self {
            TelemetryField::VehicleSoc => "vehicle_soc",
            TelemetryField::CableConnected => "cable_connected",
            TelemetryField::ChargerOn => "charger_on",
            TelemetryField::ChargingAmps => "charging_amps",
            TelemetryField::ChargingLimitSoc => "charging_limit_soc",
            TelemetryField::ChargingPlan => "charging_plan",
            TelemetryField::InverterBatterySoc => "inverter_battery_soc",
            TelemetryField::BatteryLoadWatts => "battery_load_watts",
            TelemetryField::TotalHouseLoadWatts => "total_house_load_watts",
            TelemetryField::GridPowerWatts => "grid_power_watts",
            TelemetryField::PvPowerWatts => "pv_power_watts",
            TelemetryField::TopUpLimitSoc => "top_up_limit_soc",
        }
    }

    /// Fields whose absence forces the most conservative decision
    pub fn is_safety_relevant(self) -> bool {
        matches!(
            self,
            TelemetryField::VehicleSoc
                | TelemetryField::InverterBatterySoc
                | TelemetryField::CableConnected
        )
    }
}

impl std::fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A field that could not be used this cycle and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unavailable {
    pub field: TelemetryField,
    pub reason: String,
}

/// Point-in-time read of all decision inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    /// Local wall-clock time in the configured timezone
    pub time_of_day: NaiveTime,
    pub vehicle_soc: Option<f64>,
    pub cable_connected: Option<bool>,
    pub charger_on: Option<bool>,
    pub charging_amps: Option<u32>,
    pub charging_limit_soc: Option<f64>,
    pub charging_plan: Option<String>,
    pub inverter_battery_soc: Option<f64>,
    /// Positive while the house battery discharges
    pub battery_load_watts: Option<f64>,
    pub total_house_load_watts: Option<f64>,
    /// Positive while importing from the grid
    pub grid_power_watts: Option<f64>,
    pub pv_power_watts: Option<f64>,
    pub top_up_limit_soc: Option<f64>,
    pub unavailable: Vec<Unavailable>,
}

impl TelemetrySnapshot {
    /// Snapshot with every reading unknown
    pub fn new(timestamp: DateTime<Utc>, time_of_day: NaiveTime) -> Self {
        Self {
            timestamp,
            time_of_day,
            vehicle_soc: None,
            cable_connected: None,
            charger_on: None,
            charging_amps: None,
            charging_limit_soc: None,
            charging_plan: None,
            inverter_battery_soc: None,
            battery_load_watts: None,
            total_house_load_watts: None,
            grid_power_watts: None,
            pv_power_watts: None,
            top_up_limit_soc: None,
            unavailable: Vec::new(),
        }
    }

    /// Read every field from `provider`, concurrently.
    pub async fn acquire<P: TelemetryProvider + ?Sized>(
        provider: &P,
        timestamp: DateTime<Utc>,
        time_of_day: NaiveTime,
    ) -> Self {
        let (
            vehicle_soc,
            cable_connected,
            charger_on,
            charging_amps,
            charging_limit_soc,
            charging_plan,
            inverter_battery_soc,
            battery_load_watts,
            total_house_load_watts,
            grid_power_watts,
            pv_power_watts,
            top_up_limit_soc,
        ) = tokio::join!(
            provider.vehicle_soc(),
            provider.cable_connected(),
            provider.charger_on(),
            provider.charging_amps(),
            provider.charging_limit_soc(),
            provider.charging_plan(),
            provider.inverter_battery_soc(),
            provider.battery_load_watts(),
            provider.total_house_load_watts(),
            provider.grid_power_watts(),
            provider.pv_power_watts(),
            provider.top_up_limit_soc(),
        );

        let mut snap = Self::new(timestamp, time_of_day);
        snap.vehicle_soc = snap.soc(TelemetryField::VehicleSoc, vehicle_soc);
        snap.cable_connected = snap.take(TelemetryField::CableConnected, cable_connected);
        snap.charger_on = snap.take(TelemetryField::ChargerOn, charger_on);
        if let Some(amps) = snap.power(TelemetryField::ChargingAmps, charging_amps) {
            snap.charging_amps = snap.amps(amps);
        }
        snap.charging_limit_soc = snap.soc(TelemetryField::ChargingLimitSoc, charging_limit_soc);
        snap.charging_plan = snap
            .take(TelemetryField::ChargingPlan, charging_plan)
            .map(|p| p.trim().to_string());
        snap.inverter_battery_soc =
            snap.soc(TelemetryField::InverterBatterySoc, inverter_battery_soc);
        snap.battery_load_watts = snap.power(TelemetryField::BatteryLoadWatts, battery_load_watts);
        snap.total_house_load_watts =
            snap.power(TelemetryField::TotalHouseLoadWatts, total_house_load_watts);
        snap.grid_power_watts = snap.power(TelemetryField::GridPowerWatts, grid_power_watts);
        snap.pv_power_watts = snap.power(TelemetryField::PvPowerWatts, pv_power_watts);
        snap.top_up_limit_soc = snap.soc(TelemetryField::TopUpLimitSoc, top_up_limit_soc);
        snap
    }

    /// PV generation minus house load; unknown inputs count as no surplus
    pub fn surplus_watts(&self) -> f64 {
        match (self.pv_power_watts, self.total_house_load_watts) {
            (Some(pv), Some(load)) => (pv - load).max(0.0),
            _ => 0.0,
        }
    }

    /// Whether the named field was unusable this cycle
    pub fn is_unavailable(&self, field: TelemetryField) -> bool {
        self.unavailable.iter().any(|u| u.field == field)
    }

    fn mark(&mut self, field: TelemetryField, reason: String) {
        debug!(field = field.name(), %reason, "Telemetry field unavailable");
        self.unavailable.push(Unavailable { field, reason });
    }

    fn take<T>(&mut self, field: TelemetryField, value: Result<T>) -> Option<T> {
        match value {
            Ok(v) => Some(v),
            Err(e) => {
                self.mark(field, e.to_string());
                None
            }
        }
    }

    fn soc(&mut self, field: TelemetryField, value: Result<f64>) -> Option<f64> {
        let v = self.take(field, value)?;
        if v.is_finite() && (0.0..=100.0).contains(&v) {
            Some(v)
        } else {
            self.mark(field, format!("out of range: {}", v));
            None
        }
    }

    fn power(&mut self, field: TelemetryField, value: Result<f64>) -> Option<f64> {
        let v = self.take(field, value)?;
        if v.is_finite() {
            Some(v)
        } else {
            self.mark(field, format!("not finite: {}", v));
            None
        }
    }

    fn amps(&mut self, value: f64) -> Option<u32> {
        if value < 0.0 || value > f64::from(u16::MAX) {
            self.mark(
                TelemetryField::ChargingAmps,
                format!("out of range: {}", value),
            );
            return None;
        }
        Some(value.round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChargerError;

    struct Fixed;

    #[async_trait]
    impl TelemetryProvider for Fixed {
        async fn vehicle_soc(&self) -> Result<f64> {
            Err(ChargerError::telemetry("vehicle_soc", "unknown"))
        }
        async fn cable_connected(&self) -> Result<bool> {
            Ok(true)
        }
        async fn charger_on(&self) -> Result<bool> {
            Ok(false)
        }
        async fn charging_amps(&self) -> Result<f64> {
            Ok(8.0)
        }
        async fn charging_limit_soc(&self) -> Result<f64> {
            Ok(90.0)
        }
        async fn charging_plan(&self) -> Result<String> {
            Ok(" min_plus_solar\n".to_string())
        }
        async fn inverter_battery_soc(&self) -> Result<f64> {
            Ok(140.0)
        }
        async fn battery_load_watts(&self) -> Result<f64> {
            Ok(-500.0)
        }
        async fn total_house_load_watts(&self) -> Result<f64> {
            Ok(600.0)
        }
        async fn grid_power_watts(&self) -> Result<f64> {
            Ok(f64::NAN)
        }
        async fn pv_power_watts(&self) -> Result<f64> {
            Ok(4000.0)
        }
        async fn top_up_limit_soc(&self) -> Result<f64> {
            Ok(80.0)
        }
    }

    #[tokio::test]
    async fn acquire_sanitizes_fields() {
        let now = Utc::now();
        let snap = TelemetrySnapshot::acquire(&Fixed, now, now.time()).await;

        assert_eq!(snap.vehicle_soc, None);
        assert!(snap.is_unavailable(TelemetryField::VehicleSoc));
        assert_eq!(snap.inverter_battery_soc, None);
        assert!(snap.is_unavailable(TelemetryField::InverterBatterySoc));
        assert_eq!(snap.grid_power_watts, None);
        assert_eq!(snap.cable_connected, Some(true));
        assert_eq!(snap.charging_amps, Some(8));
        assert_eq!(snap.charging_plan.as_deref(), Some("min_plus_solar"));
        assert!((snap.surplus_watts() - 3400.0).abs() < 1e-9);
    }

    #[test]
    fn surplus_is_zero_when_inputs_missing() {
        let now = Utc::now();
        let mut snap = TelemetrySnapshot::new(now, now.time());
        snap.pv_power_watts = Some(5000.0);
        assert_eq!(snap.surplus_watts(), 0.0);
        snap.total_house_load_watts = Some(6000.0);
        assert_eq!(snap.surplus_watts(), 0.0);
    }

    #[test]
    fn safety_relevant_fields() {
        assert!(TelemetryField::VehicleSoc.is_safety_relevant());
        assert!(TelemetryField::CableConnected.is_safety_relevant());
        assert!(TelemetryField::InverterBatterySoc.is_safety_relevant());
        assert!(!TelemetryField::PvPowerWatts.is_safety_relevant());
    }
}
