//! Charging Plan State Machine
//!
//! Rules are evaluated in a fixed priority order each cycle. The state
//! object ([`ChargingPlanState`]) is owned by the control loop; functions
//! here take it by reference and return a proposed successor.

use crate::battery::TierMemory;
use crate::config::{Config, PlansConfig};
use crate::error::Result;
use crate::schedule::{NightlyRequirement, NightlyWindow, required_power};
use crate::telemetry::TelemetrySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active charging strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingPlan {
    Off,
    /// Follow the PV surplus ("min_plus_solar")
    SolarFollowing,
    /// Reach the top-up SoC before the end of the nightly window
    NightlyTarget,
    /// Another party owns the charger; observe only
    PassThroughExternal,
}

impl ChargingPlan {
    pub fn name(self) -> &'static str {
        match self {
            ChargingPlan::Off => "off",
            ChargingPlan::SolarFollowing => "solar_following",
            ChargingPlan::NightlyTarget => "nightly_target",
            ChargingPlan::PassThroughExternal => "pass_through_external",
        }
    }
}

impl std::fmt::Display for ChargingPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    CableDisconnected,
    CableStateUnknown,
    VehicleSocUnknown,
    VehicleChargeLimitReached,
    NightlyTopUp,
    NightlyTargetReached,
    PassThroughSelected,
    UnrecognizedSelector,
    /// Selector unreadable while an external party owned the charger
    SelectorUnknown,
    SolarSurplus,
    InsufficientSurplus,
    /// Observed charger state diverged from the last command
    ManualTakeover,
}

impl PlanReason {
    pub fn describe(self) -> &'static str {
        match self {
            PlanReason::CableDisconnected => "cable disconnected",
            PlanReason::CableStateUnknown => "cable state unavailable, holding",
            PlanReason::VehicleSocUnknown => "vehicle SoC unavailable, holding",
            PlanReason::VehicleChargeLimitReached => "vehicle at its charge limit",
            PlanReason::NightlyTopUp => "nightly window, vehicle below top-up limit",
            PlanReason::NightlyTargetReached => "nightly window, top-up limit reached",
            PlanReason::PassThroughSelected => "external plan selected",
            PlanReason::UnrecognizedSelector => "unrecognized plan selector value",
            PlanReason::SelectorUnknown => "plan selector unavailable, holding pass-through",
            PlanReason::SolarSurplus => "solar surplus above min_power",
            PlanReason::InsufficientSurplus => "solar surplus below min_power",
            PlanReason::ManualTakeover => "charger changed externally",
        }
    }
}

impl std::fmt::Display for PlanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDecision {
    pub plan: ChargingPlan,
    pub reason: PlanReason,
    /// Safety-relevant input missing: keep the previous plan and command
    pub hold: bool,
}

impl PlanDecision {
    fn to(plan: ChargingPlan, reason: PlanReason) -> Self {
        Self {
            plan,
            reason,
            hold: false,
        }
    }

    fn hold(previous: ChargingPlan, reason: PlanReason) -> Self {
        Self {
            plan: previous,
            reason,
            hold: true,
        }
    }
}

/// Plan state carried across cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingPlanState {
    pub active_plan: ChargingPlan,
    pub plan_entered_at: DateTime<Utc>,
    /// Only updated once a write is confirmed
    pub last_commanded_on: Option<bool>,
    pub last_commanded_amps: Option<u32>,
    pub battery_tier: Option<TierMemory>,
    pub nightly: Option<NightlyRequirement>,
    pub last_recalc_at: Option<DateTime<Utc>>,
}

impl ChargingPlanState {
    /// Initial state, seeded from the charger's observed switch and current
    pub fn seed(now: DateTime<Utc>, charger_on: Option<bool>, amps: Option<u32>) -> Self {
        Self {
            active_plan: ChargingPlan::Off,
            plan_entered_at: now,
            last_commanded_on: charger_on,
            last_commanded_amps: amps,
            battery_tier: None,
            nightly: None,
            last_recalc_at: None,
        }
    }

    /// Successor state after `decision`. Leaving `NightlyTarget` drops the
    /// cached requirement and a disconnected cable clears the tier memory.
    pub fn transition(&self, decision: &PlanDecision, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if decision.hold {
            return next;
        }
        if decision.plan != self.active_plan {
            next.active_plan = decision.plan;
            next.plan_entered_at = now;
        }
        if decision.plan != ChargingPlan::NightlyTarget {
            next.nightly = None;
            next.last_recalc_at = None;
        }
        if decision.reason == PlanReason::CableDisconnected {
            next.battery_tier = None;
        }
        next
    }

    /// Record a confirmed charger write
    pub fn record_command(&mut self, on: bool, amps: Option<u32>) {
        self.last_commanded_on = Some(on);
        if amps.is_some() {
            self.last_commanded_amps = amps;
        }
    }

    /// Treat the observed charger state as the last command. Used while an
    /// external party owns the charger so control resumes from reality.
    pub fn adopt_observed(&mut self, charger_on: Option<bool>, amps: Option<u32>) {
        if charger_on.is_some() {
            self.last_commanded_on = charger_on;
        }
        if amps.is_some() {
            self.last_commanded_amps = amps;
        }
    }
}

/// Transition rules for one configuration
#[derive(Debug, Clone)]
pub struct PlanRules {
    window: NightlyWindow,
    plans: PlansConfig,
    min_power: f64,
    capacity_wh: f64,
    efficiency: f64,
    recalc_interval: chrono::Duration,
}

impl PlanRules {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            window: cfg.nightly_window()?,
            plans: cfg.plans.clone(),
            min_power: cfg.charger.min_power,
            capacity_wh: cfg.charger.vehicle_battery_capacity,
            efficiency: cfg.charger.charge_efficiency_factor,
            recalc_interval: chrono::Duration::seconds(
                i64::try_from(cfg.nightly.recalc_interval).unwrap_or(i64::MAX),
            ),
        })
    }

    pub fn window(&self) -> &NightlyWindow {
        &self.window
    }

    /// Evaluate the transition rules against `snap`
    pub fn evaluate(&self, snap: &TelemetrySnapshot, previous: ChargingPlan) -> PlanDecision {
        match snap.cable_connected {
            Some(false) => {
                return PlanDecision::to(ChargingPlan::Off, PlanReason::CableDisconnected);
            }
            None => return PlanDecision::hold(previous, PlanReason::CableStateUnknown),
            Some(true) => {}
        }

        let Some(vehicle_soc) = snap.vehicle_soc else {
            return PlanDecision::hold(previous, PlanReason::VehicleSocUnknown);
        };

        if vehicle_soc >= snap.charging_limit_soc.unwrap_or(100.0) {
            return PlanDecision::to(ChargingPlan::Off, PlanReason::VehicleChargeLimitReached);
        }

        let in_window = self.window.contains(snap.time_of_day);
        if in_window
            && let Some(top_up) = snap.top_up_limit_soc
            && vehicle_soc < top_up
        {
            return PlanDecision::to(ChargingPlan::NightlyTarget, PlanReason::NightlyTopUp);
        }

        // An unreadable selector never hands the charger away, but it does
        // not take it back from an external party either.
        if snap.charging_plan.is_none() && previous == ChargingPlan::PassThroughExternal {
            return PlanDecision::hold(previous, PlanReason::SelectorUnknown);
        }
        let external = self.external_selection(snap.charging_plan.as_deref());

        if in_window && snap.top_up_limit_soc.is_some() {
            return match external {
                Some(reason) => PlanDecision::to(ChargingPlan::PassThroughExternal, reason),
                None => PlanDecision::to(ChargingPlan::Off, PlanReason::NightlyTargetReached),
            };
        }

        if let Some(reason) = external {
            return PlanDecision::to(ChargingPlan::PassThroughExternal, reason);
        }

        if snap.surplus_watts() >= self.min_power {
            PlanDecision::to(ChargingPlan::SolarFollowing, PlanReason::SolarSurplus)
        } else {
            PlanDecision::to(ChargingPlan::Off, PlanReason::InsufficientSurplus)
        }
    }

    /// `Some(reason)` when the selector hands the charger to someone else.
    /// An unreadable selector leaves the charger managed.
    fn external_selection(&self, selector: Option<&str>) -> Option<PlanReason> {
        let option = selector?;
        if self.plans.is_managed(option) {
            None
        } else if self.plans.is_pass_through(option) {
            Some(PlanReason::PassThroughSelected)
        } else {
            Some(PlanReason::UnrecognizedSelector)
        }
    }

    /// Whether the cached nightly requirement must be recomputed
    pub fn recalc_due(&self, state: &ChargingPlanState, now: DateTime<Utc>) -> bool {
        match (state.nightly, state.last_recalc_at) {
            (Some(_), Some(at)) => now - at >= self.recalc_interval,
            _ => true,
        }
    }

    /// Required average power to reach the top-up limit by the window end
    pub fn nightly_requirement(&self, snap: &TelemetrySnapshot) -> Option<NightlyRequirement> {
        let vehicle_soc = snap.vehicle_soc?;
        let top_up = snap.top_up_limit_soc?;
        Some(required_power(
            vehicle_soc,
            top_up,
            self.capacity_wh,
            self.efficiency,
            self.window.hours_until_end(snap.time_of_day),
        ))
    }

    /// Refresh `state.nightly` when the recalculation timer allows it
    pub fn refresh_nightly(
        &self,
        state: &mut ChargingPlanState,
        snap: &TelemetrySnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        if state.active_plan != ChargingPlan::NightlyTarget || !self.recalc_due(state, now) {
            return false;
        }
        match self.nightly_requirement(snap) {
            Some(req) => {
                state.nightly = Some(req);
                state.last_recalc_at = Some(now);
                true
            }
            None => false,
        }
    }
}
