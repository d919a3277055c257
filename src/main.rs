use anyhow::Result;
use solar_charger::config::Config;
use solar_charger::controller::ChargingController;
#[cfg(feature = "home-assistant")]
use solar_charger::error::ChargerError;
#[cfg(feature = "home-assistant")]
use solar_charger::home_assistant::HomeAssistantClient;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    solar_charger::logging::init_logging(&config.logging)?;
    info!(
        "Solar charger {} starting up (poll every {} s)",
        env!("APP_VERSION"),
        config.charger.poll_interval
    );

    run(config).await
}

#[cfg(feature = "home-assistant")]
async fn run(config: Config) -> Result<()> {
    let client = Arc::new(HomeAssistantClient::new(&config.api).map_err(refuse_start)?);
    // Validates the configuration; nothing is polled or written before this
    let mut controller =
        ChargingController::new(config.clone(), client.clone(), client).map_err(refuse_start)?;

    let shutdown = controller.shutdown_handle();
    let (web_stop_tx, web_stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received; finishing current cycle"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown.send(());
        let _ = web_stop_tx.send(());
    });

    let web_task = spawn_web(&config, &controller, web_stop_rx);

    let result = controller.run().await;
    if let Some(task) = web_task
        && let Err(e) = task.await
    {
        warn!("Status API task ended abnormally: {}", e);
    }

    match result {
        Ok(()) => {
            info!("Controller shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}

#[cfg(feature = "home-assistant")]
fn refuse_start(e: ChargerError) -> ChargerError {
    if e.is_fatal() {
        error!("Refusing to start with invalid configuration: {}", e);
        eprintln!("{}", e);
    } else {
        error!("Failed to start controller: {}", e);
    }
    e
}

#[cfg(not(feature = "home-assistant"))]
async fn run(_config: Config) -> Result<()> {
    Err(anyhow::anyhow!(
        "Built without the home-assistant feature; no telemetry provider available"
    ))
}

#[cfg(all(feature = "web", feature = "home-assistant"))]
fn spawn_web(
    config: &Config,
    controller: &ChargingController,
    stop: tokio::sync::oneshot::Receiver<()>,
) -> Option<tokio::task::JoinHandle<()>> {
    if !config.web.enabled {
        info!("Status API disabled");
        return None;
    }
    let state = solar_charger::web::AppState {
        status_rx: controller.subscribe_status(),
        history: controller.history(),
        config: Arc::new(config.clone()),
    };
    let host = config.web.host.clone();
    let port = config.web.port;
    Some(tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop.await;
        };
        if let Err(e) = solar_charger::web::serve(state, &host, port, shutdown).await {
            error!("Status API error: {}", e);
        }
    }))
}

#[cfg(all(not(feature = "web"), feature = "home-assistant"))]
fn spawn_web(
    _config: &Config,
    _controller: &ChargingController,
    _stop: tokio::sync::oneshot::Receiver<()>,
) -> Option<tokio::task::JoinHandle<()>> {
    None
}
