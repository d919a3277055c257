use chrono::{DateTime, Utc};
use tokio::time::{Duration, timeout};

use crate::actuator::{EntityValue, EntityWrite};
use crate::battery::{TierMemory, TierReason, TierSelection};
use crate::controls::ChargeCommand;
use crate::error::ChargerError;
use crate::plan::{ChargingPlan, ChargingPlanState, PlanDecision, PlanReason};
use crate::telemetry::TelemetrySnapshot;

use super::types::{ControllerPhase, CycleOutcome, CycleReport};


impl super::ChargingController {
    /// Run one decision cycle at `now`.
    ///
    /// Never fails: unreadable telemetry, missing fields and rejected writes
    /// all end in a fail-safe cycle that is logged and reported.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let started = std::time::Instant::now();
        self.total_cycles = self.total_cycles.saturating_add(1);
        let cycle = self.total_cycles;

        self.set_phase(ControllerPhase::Polling);
        let Some(snapshot) = self.read_snapshot(now).await else {
            self.skipped_cycles = self.skipped_cycles.saturating_add(1);
            let detail = format!(
                "Telemetry read did not finish within {} s; skipping cycle",
                self.config.charger.read_timeout
            );
            self.logger.warn(&detail);
            let mut report = CycleReport::skipped(cycle, now, detail);
            report.duration_ms = elapsed_ms(started);
            return self.finish(report).await;
        };
        self.log_snapshot(&snapshot);

        self.set_phase(ControllerPhase::Deciding);
        let state = match &self.state {
            Some(state) => state.clone(),
            None => {
                self.logger.info(&format!(
                    "Seeding plan state from charger: on={:?}, amps={:?}",
                    snapshot.charger_on, snapshot.charging_amps
                ));
                ChargingPlanState::seed(now, snapshot.charger_on, snapshot.charging_amps)
            }
        };

        let tier = self.select_tier(&state, &snapshot);
        let decision = self
            .detect_takeover(&state, &snapshot)
            .unwrap_or_else(|| self.rules.evaluate(&snapshot, state.active_plan));

        let solar_command = Some(
            self.controls
                .solve_solar(tier.max_grid_power_watts, snapshot.surplus_watts()),
        );
        let nightly_command = self.rules.nightly_requirement(&snapshot).map(|req| {
            self.controls.solve_nightly(
                tier.tier,
                tier.max_grid_power_watts,
                req.required_power,
            )
        });

        let mut report = CycleReport {
            cycle,
            timestamp: now,
            outcome: CycleOutcome::Completed,
            snapshot: None,
            tier: Some(tier),
            plan: Some(decision.plan),
            plan_reason: Some(decision.reason),
            detail: None,
            nightly: None,
            solar_command,
            nightly_command,
            command: None,
            writes: Vec::new(),
            duration_ms: 0,
        };

        if decision.hold {
            let detail = format!(
                "Holding plan {} and last command: {}{}",
                decision.plan,
                decision.reason,
                describe_unavailable(&snapshot)
            );
            self.logger.warn(&detail);
            report.outcome = CycleOutcome::Held;
            report.detail = Some(detail);
            report.nightly = state.nightly;
            report.snapshot = Some(snapshot);
            report.duration_ms = elapsed_ms(started);
            self.state = Some(state);
            return self.finish(report).await;
        }

        let mut writes = Vec::new();
        if decision.reason == PlanReason::ManualTakeover {
            self.set_phase(ControllerPhase::Actuating);
            let entity = self.config.api.entities.select_charging_plan.clone();
            let option = self.config.plans.manual_option.clone();
            let write = self.write(&entity, EntityValue::Option(option)).await;
            let ok = write.ok;
            writes.push(write);
            if !ok {
                // Previous plan and last command stay, so the takeover is
                // detected again next cycle.
                let detail = format!(
                    "Selector write failed; keeping plan {} until the takeover is handed over",
                    state.active_plan
                );
                self.logger.warn(&detail);
                report.outcome = CycleOutcome::Held;
                report.plan = Some(state.active_plan);
                report.detail = Some(detail);
                report.writes = writes;
                report.nightly = state.nightly;
                report.snapshot = Some(snapshot);
                report.duration_ms = elapsed_ms(started);
                self.state = Some(state);
                return self.finish(report).await;
            }
        }

        let mut next = state.transition(&decision, now);
        if next.active_plan != state.active_plan {
            self.logger.info(&format!(
                "Plan {} -> {}: {}",
                state.active_plan, next.active_plan, decision.reason
            ));
        }
        if decision.reason != PlanReason::CableDisconnected && tier.reason != TierReason::SocUnknown
        {
            next.battery_tier = Some(TierMemory::advance(next.battery_tier, tier.tier, now));
        }
        if self.rules.refresh_nightly(&mut next, &snapshot, now)
            && let Some(req) = next.nightly
        {
            self.logger.info(&format!(
                "Nightly target: {:.0} Wh needed over {:.2} h -> {:?}",
                req.required_energy_wh, req.remaining_hours, req.required_power
            ));
        }

        let command = self.controls.solve(
            next.active_plan,
            &tier,
            &snapshot,
            next.nightly.map(|n| n.required_power),
        );
        self.logger.debug(&format!(
            "Cycle {}: plan {} ({}), tier {} ({:.0} W), command {}",
            cycle,
            next.active_plan,
            decision.reason,
            tier.tier,
            tier.max_grid_power_watts,
            command.map_or_else(|| "none".to_string(), |c| c.to_string())
        ));

        match command {
            Some(cmd) => {
                // Takeover detection needs the commanded values; otherwise
                // compare against what the charger reports.
                if !self.config.charger.manual_takeover {
                    next.adopt_observed(snapshot.charger_on, snapshot.charging_amps);
                }
                self.set_phase(ControllerPhase::Actuating);
                writes.extend(self.apply_command(&mut next, cmd).await);
            }
            None => next.adopt_observed(snapshot.charger_on, snapshot.charging_amps),
        }

        report.command = command;
        report.writes = writes;
        report.nightly = next.nightly;
        report.snapshot = Some(snapshot);
        report.duration_ms = elapsed_ms(started);
        self.state = Some(next);
        self.finish(report).await
    }

    async fn read_snapshot(&self, now: DateTime<Utc>) -> Option<TelemetrySnapshot> {
        let local = now.with_timezone(&self.tz).time();
        let limit = Duration::from_secs(self.config.charger.read_timeout);
        timeout(
            limit,
            TelemetrySnapshot::acquire(self.telemetry.as_ref(), now, local),
        )
        .await
        .ok()
    }

    fn select_tier(&self, state: &ChargingPlanState, snap: &TelemetrySnapshot) -> TierSelection {
        let previous = state.battery_tier.map(|m| m.tier);
        let selection = self
            .profile
            .select_tier(snap.inverter_battery_soc, previous);
        match selection.reason {
            TierReason::SocUnknown => self.logger.warn(&format!(
                "Battery SoC unavailable; using tier {} ({} W)",
                selection.tier, selection.max_grid_power_watts
            )),
            TierReason::HysteresisHold => self.logger.debug(&format!(
                "Battery SoC {:?} within hysteresis band; keeping tier {}",
                snap.inverter_battery_soc, selection.tier
            )),
            TierReason::Threshold => {}
        }
        selection
    }

    /// Observed charger state diverging from the last confirmed command
    /// means someone else is driving the charger.
    fn detect_takeover(
        &self,
        state: &ChargingPlanState,
        snap: &TelemetrySnapshot,
    ) -> Option<PlanDecision> {
        if !self.config.charger.manual_takeover
            || state.active_plan == ChargingPlan::PassThroughExternal
            || snap.cable_connected != Some(true)
        {
            return None;
        }
        let observed_on = snap.charger_on?;
        let commanded_on = state.last_commanded_on?;
        let amps_changed = observed_on
            && commanded_on
            && matches!(
                (state.last_commanded_amps, snap.charging_amps),
                (Some(commanded), Some(observed)) if commanded != observed
            );
        if observed_on == commanded_on && !amps_changed {
            return None;
        }
        self.logger.warn(&format!(
            "Charger changed externally (on={} amps={:?}, expected on={} amps={:?}); switching to {}",
            observed_on,
            snap.charging_amps,
            commanded_on,
            state.last_commanded_amps,
            self.config.plans.manual_option
        ));
        Some(PlanDecision {
            plan: ChargingPlan::PassThroughExternal,
            reason: PlanReason::ManualTakeover,
            hold: false,
        })
    }

    /// Write only what differs from the last confirmed command. Amps go out
    /// before the switch is turned on; a failed amps write leaves it off.
    async fn apply_command(
        &mut self,
        state: &mut ChargingPlanState,
        cmd: ChargeCommand,
    ) -> Vec<EntityWrite> {
        let switch = self.config.api.entities.switch_set_charging.clone();
        let number = self.config.api.entities.number_set_charging_amps.clone();
        let mut writes = Vec::new();

        if !cmd.on {
            if state.last_commanded_on != Some(false) {
                let write = self.write(&switch, EntityValue::Switch(false)).await;
                if write.ok {
                    state.record_command(false, None);
                }
                writes.push(write);
            }
            return writes;
        }

        if state.last_commanded_amps != Some(cmd.amps) {
            let write = self
                .write(&number, EntityValue::Number(f64::from(cmd.amps)))
                .await;
            let ok = write.ok;
            if ok {
                state.last_commanded_amps = Some(cmd.amps);
            }
            writes.push(write);
            if !ok {
                return writes;
            }
        }

        if state.last_commanded_on != Some(true) {
            let write = self.write(&switch, EntityValue::Switch(true)).await;
            if write.ok {
                state.record_command(true, Some(cmd.amps));
            }
            writes.push(write);
        }
        writes
    }

    async fn write(&mut self, entity_id: &str, value: EntityValue) -> EntityWrite {
        match self.actuator.write_entity(entity_id, value.clone()).await {
            Ok(()) => {
                self.logger
                    .info(&format!("Set {} to {}", entity_id, value));
                EntityWrite {
                    entity_id: entity_id.to_string(),
                    value,
                    ok: true,
                    error: None,
                }
            }
            Err(e) => {
                self.failed_writes = self.failed_writes.saturating_add(1);
                let err = match e {
                    ChargerError::ActuationFailed { .. } => e,
                    other => ChargerError::actuation(entity_id, other.to_string()),
                };
                self.logger
                    .warn(&format!("{}; retrying next cycle", err));
                EntityWrite {
                    entity_id: entity_id.to_string(),
                    value,
                    ok: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn finish(&mut self, report: CycleReport) -> CycleReport {
        self.history.push(report.clone()).await;
        self.last_report = Some(report.clone());
        self.set_phase(ControllerPhase::Idle);
        report
    }

    fn log_snapshot(&self, snap: &TelemetrySnapshot) {
        self.logger.debug(&format!(
            "Telemetry: car_soc={:?} cable={:?} on={:?} amps={:?} limit={:?} plan={:?} \
             battery_soc={:?} battery_w={:?} load_w={:?} grid_w={:?} pv_w={:?} top_up={:?}",
            snap.vehicle_soc,
            snap.cable_connected,
            snap.charger_on,
            snap.charging_amps,
            snap.charging_limit_soc,
            snap.charging_plan,
            snap.inverter_battery_soc,
            snap.battery_load_watts,
            snap.total_house_load_watts,
            snap.grid_power_watts,
            snap.pv_power_watts,
            snap.top_up_limit_soc
        ));
    }
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn describe_unavailable(snap: &TelemetrySnapshot) -> String {
    if snap.unavailable.is_empty() {
        return String::new();
    }
    let fields: Vec<String> = snap
        .unavailable
        .iter()
        .map(|u| format!("{} ({})", u.field, u.reason))
        .collect();
    format!(" [unavailable: {}]", fields.join(", "))
}
