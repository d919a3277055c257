//! Control loop
//!
//! Orchestrates one decision cycle per tick: read a telemetry snapshot,
//! select the battery tier, evaluate the plan, solve the command and write
//! whatever differs from the last confirmed command. The loop is the only
//! owner of [`ChargingPlanState`].

use crate::actuator::Actuator;
use crate::battery::BatteryProfile;
use crate::config::Config;
use crate::controls::ChargingControls;
use crate::plan::{ChargingPlanState, PlanRules};
use crate::telemetry::TelemetryProvider;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

mod runtime;
mod runtime_poll;
mod snapshot;
pub mod types;

pub use types::{ControllerPhase, ControllerStatus, CycleOutcome, CycleReport, ReportHistory};

/// Solar and battery aware charging controller
pub struct ChargingController {
    /// Validated configuration
    config: Config,

    /// Timezone the nightly window is expressed in
    tz: chrono_tz::Tz,

    /// Live readings
    telemetry: Arc<dyn TelemetryProvider>,

    /// Charger and selector writes
    actuator: Arc<dyn Actuator>,

    /// Decision components
    profile: BatteryProfile,
    rules: PlanRules,
    controls: ChargingControls,

    /// Plan state, seeded from the first snapshot
    state: Option<ChargingPlanState>,

    /// Current phase within the cycle
    phase: ControllerPhase,

    /// Logger with context
    logger: crate::logging::StructuredLogger,

    /// Shutdown signal
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,

    /// Latest status for observers (web, tests)
    status_tx: watch::Sender<Arc<ControllerStatus>>,
    status_rx: watch::Receiver<Arc<ControllerStatus>>,

    /// Recent cycle reports
    history: ReportHistory,
    last_report: Option<CycleReport>,

    /// Counters
    total_cycles: u64,
    skipped_cycles: u64,
    failed_writes: u64,
    overrun_count: u64,
}

impl ChargingController {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Plan state, `None` before the first cycle
    pub fn plan_state(&self) -> Option<&ChargingPlanState> {
        self.state.as_ref()
    }

    pub fn history(&self) -> ReportHistory {
        self.history.clone()
    }

    /// Sender that stops [`ChargingController::run`] after the in-flight cycle
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }
}
