use std::sync::Arc;

use super::types::{ControllerPhase, ControllerStatus};

impl super::ChargingController {
    pub fn subscribe_status(&self) -> tokio::sync::watch::Receiver<Arc<ControllerStatus>> {
        self.status_rx.clone()
    }

    pub(super) fn build_status(&self) -> ControllerStatus {
        ControllerStatus {
            timestamp: chrono::Utc::now(),
            phase: self.phase,
            plan_state: self.state.clone(),
            last_report: self.last_report.clone(),
            total_cycles: self.total_cycles,
            skipped_cycles: self.skipped_cycles,
            failed_writes: self.failed_writes,
            overrun_count: self.overrun_count,
            poll_interval_s: self.config.charger.poll_interval,
        }
    }

    pub(super) fn publish_status(&self) {
        let _ = self.status_tx.send(Arc::new(self.build_status()));
    }

    pub(super) fn set_phase(&mut self, phase: ControllerPhase) {
        if self.phase != phase {
            self.logger.trace(&format!("Phase {:?} -> {:?}", self.phase, phase));
            self.phase = phase;
        }
        self.publish_status();
    }
}
