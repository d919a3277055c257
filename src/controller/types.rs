use crate::actuator::EntityWrite;
use crate::battery::TierSelection;
use crate::controls::ChargeCommand;
use crate::plan::{ChargingPlan, ChargingPlanState, PlanReason};
use crate::schedule::NightlyRequirement;
use crate::telemetry::{TelemetrySnapshot, Unavailable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where the loop is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Idle,
    Polling,
    Deciding,
    Actuating,
    /// Shutdown requested; no further cycles run
    Stopped,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Decision made; writes issued where needed
    Completed,
    /// Safety-relevant input missing; plan and command kept
    Held,
    /// Telemetry read did not finish in time; nothing decided
    Skipped,
}

/// Everything one decision cycle saw and did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub snapshot: Option<TelemetrySnapshot>,
    pub tier: Option<TierSelection>,
    pub plan: Option<ChargingPlan>,
    pub plan_reason: Option<PlanReason>,
    /// Human-readable explanation, set for held and skipped cycles
    pub detail: Option<String>,
    pub nightly: Option<NightlyRequirement>,
    /// What solar following would command with this snapshot
    pub solar_command: Option<ChargeCommand>,
    /// What the nightly target would command with this snapshot
    pub nightly_command: Option<ChargeCommand>,
    /// Proposed command; `None` for pass-through and held cycles
    pub command: Option<ChargeCommand>,
    pub writes: Vec<EntityWrite>,
    pub duration_ms: u64,
}

impl CycleReport {
    pub(crate) fn skipped(cycle: u64, timestamp: DateTime<Utc>, detail: String) -> Self {
        Self {
            cycle,
            timestamp,
            outcome: CycleOutcome::Skipped,
            snapshot: None,
            tier: None,
            plan: None,
            plan_reason: None,
            detail: Some(detail),
            nightly: None,
            solar_command: None,
            nightly_command: None,
            command: None,
            writes: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Fields that were unusable this cycle
    pub fn unavailable(&self) -> &[Unavailable] {
        self.snapshot
            .as_ref()
            .map(|s| s.unavailable.as_slice())
            .unwrap_or(&[])
    }

    pub fn failed_writes(&self) -> usize {
        self.writes.iter().filter(|w| !w.ok).count()
    }
}

/// Status published after every phase change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub timestamp: DateTime<Utc>,
    pub phase: ControllerPhase,
    pub plan_state: Option<ChargingPlanState>,
    pub last_report: Option<CycleReport>,
    pub total_cycles: u64,
    pub skipped_cycles: u64,
    pub failed_writes: u64,
    pub overrun_count: u64,
    pub poll_interval_s: u64,
}

/// Bounded, shared log of recent cycle reports
#[derive(Debug, Clone)]
pub struct ReportHistory {
    inner: Arc<RwLock<VecDeque<CycleReport>>>,
    capacity: usize,
}

impl ReportHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn push(&self, report: CycleReport) {
        if self.capacity == 0 {
            return;
        }
        let mut guard = self.inner.write().await;
        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(report);
    }

    /// Up to `limit` reports, newest first
    pub async fn recent(&self, limit: usize) -> Vec<CycleReport> {
        let guard = self.inner.read().await;
        guard.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_drops_oldest_beyond_capacity() {
        let history = ReportHistory::new(2);
        let now = Utc::now();
        for cycle in 1..=3 {
            history
                .push(CycleReport::skipped(cycle, now, "timeout".to_string()))
                .await;
        }
        let recent = history.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].cycle, 3);
        assert_eq!(recent[1].cycle, 2);
    }

    #[tokio::test]
    async fn zero_capacity_keeps_nothing() {
        let history = ReportHistory::new(0);
        history
            .push(CycleReport::skipped(1, Utc::now(), "timeout".to_string()))
            .await;
        assert!(history.is_empty().await);
    }
}
