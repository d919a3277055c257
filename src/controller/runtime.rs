use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};

use crate::actuator::Actuator;
use crate::config::Config;
use crate::error::Result;
use crate::telemetry::TelemetryProvider;

use super::types::{ControllerPhase, ControllerStatus, ReportHistory};

impl super::ChargingController {
    /// Create a controller. The configuration is validated here so an
    /// invalid one never reaches the loop.
    pub fn new(
        config: Config,
        telemetry: Arc<dyn TelemetryProvider>,
        actuator: Arc<dyn Actuator>,
    ) -> Result<Self> {
        config.validate()?;

        let logger = crate::logging::get_logger("controller");
        let tz = config.tz()?;
        let rules = crate::plan::PlanRules::new(&config)?;
        let profile = crate::battery::BatteryProfile::new(&config.battery);
        let controls = crate::controls::ChargingControls::new(&config.charger, &config.nightly);
        let history = ReportHistory::new(config.web.history_size);

        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let initial = Arc::new(ControllerStatus {
            timestamp: chrono::Utc::now(),
            phase: ControllerPhase::Idle,
            plan_state: None,
            last_report: None,
            total_cycles: 0,
            skipped_cycles: 0,
            failed_writes: 0,
            overrun_count: 0,
            poll_interval_s: config.charger.poll_interval,
        });
        let (status_tx, status_rx) = watch::channel(initial);

        logger.info(&format!(
            "Controller initialized: {}-{}A, {} phase(s) at {} V, nightly {}-{} ({})",
            config.charger.min_amps,
            config.charger.max_amps,
            config.charger.phases,
            config.charger.volts,
            config.nightly.start,
            config.nightly.end,
            config.timezone
        ));

        Ok(Self {
            config,
            tz,
            telemetry,
            actuator,
            profile,
            rules,
            controls,
            state: None,
            phase: ControllerPhase::Idle,
            logger,
            shutdown_tx,
            shutdown_rx,
            status_tx,
            status_rx,
            history,
            last_report: None,
            total_cycles: 0,
            skipped_cycles: 0,
            failed_writes: 0,
            overrun_count: 0,
        })
    }

    /// Run the control loop until a shutdown signal arrives
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting charging control loop");

        let period = Duration::from_secs(self.config.charger.poll_interval);
        let mut ticker = interval(period);
        // A cycle that overruns its period swallows the ticks it missed.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // A shutdown requested during a cycle wins over the tick that
                // cycle may have made due.
                biased;
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let report = self.run_cycle(chrono::Utc::now()).await;
                    if started.elapsed() > period {
                        self.overrun_count = self.overrun_count.saturating_add(1);
                        self.logger.warn(&format!(
                            "Cycle {} took {} ms, longer than the {} s poll interval",
                            report.cycle,
                            started.elapsed().as_millis(),
                            self.config.charger.poll_interval
                        ));
                    }
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.set_phase(ControllerPhase::Stopped);
        match self.state.as_ref() {
            Some(state) => self.logger.info(&format!(
                "Controller stopped in plan {} (last command: on={:?}, amps={:?})",
                state.active_plan, state.last_commanded_on, state.last_commanded_amps
            )),
            None => self.logger.info("Controller stopped before the first cycle"),
        }
    }
}
