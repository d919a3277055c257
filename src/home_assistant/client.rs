use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};

use crate::actuator::{Actuator, EntityValue};
use crate::config::{ApiConfig, TemplatesConfig};
use crate::error::{ChargerError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::telemetry::{TelemetryField, TelemetryProvider};

use super::types::{ServiceCall, TemplateRequest, parse_bool, parse_number, parse_option};

/// Home Assistant REST client implementing both telemetry and actuation
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    templates: TemplatesConfig,
    max_retries: u32,
    retry_delay: Duration,
    logger: crate::logging::StructuredLogger,
}

impl HomeAssistantClient {
    /// Create a client from the `api` configuration section
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let base_url = cfg.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ChargerError::validation("api.url", "Must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| ChargerError::config(format!("Failed to build HTTP client: {}", e)))?;

        let logger =
            get_logger_with_context(LogContext::new("home_assistant").with_field("url", &base_url));
        if cfg.token.trim().is_empty() {
            logger.warn("No API token configured; requests will be unauthenticated");
        }

        Ok(Self {
            base_url,
            token: cfg.token.trim().to_string(),
            client,
            templates: cfg.templates.clone(),
            max_retries: cfg.max_retries,
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            logger,
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/plain")
            .header(
                USER_AGENT,
                concat!("solar-charger/", env!("CARGO_PKG_VERSION")),
            );
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    /// Render a template and return the raw text
    pub async fn render_template(&self, template: &str) -> Result<String> {
        let resp = self
            .request("/api/template")
            .json(&TemplateRequest { template })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChargerError::network(format!(
                "Template render failed with HTTP {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(resp.text().await?)
    }

    /// Call a service once
    pub async fn call_service(&self, call: &ServiceCall) -> Result<()> {
        let resp = self.request(&call.path()).json(&call.data).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChargerError::network(format!(
            "HTTP {} from {}: {}",
            status,
            call.path(),
            body.trim()
        )))
    }

    async fn call_service_with_retry(&self, call: &ServiceCall) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.call_service(call).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    self.logger.warn(&format!(
                        "Service {} failed (retry {}/{}): {}",
                        call.path(),
                        attempt,
                        self.max_retries,
                        e
                    ));
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn read(&self, field: TelemetryField, template: &str) -> Result<String> {
        self.render_template(template).await.map_err(|e| match e {
            ChargerError::TelemetryUnavailable { .. } => e,
            other => ChargerError::telemetry(field.name(), other.to_string()),
        })
    }

    async fn number(&self, field: TelemetryField, template: &str) -> Result<f64> {
        let raw = self.read(field, template).await?;
        parse_number(field.name(), &raw)
    }

    async fn boolean(&self, field: TelemetryField, template: &str) -> Result<bool> {
        let raw = self.read(field, template).await?;
        parse_bool(field.name(), &raw)
    }
}

#[async_trait]
impl TelemetryProvider for HomeAssistantClient {
    async fn vehicle_soc(&self) -> Result<f64> {
        self.number(TelemetryField::VehicleSoc, &self.templates.car_soc)
            .await
    }

    async fn cable_connected(&self) -> Result<bool> {
        self.boolean(
            TelemetryField::CableConnected,
            &self.templates.charger_connected,
        )
        .await
    }

    async fn charger_on(&self) -> Result<bool> {
        self.boolean(TelemetryField::ChargerOn, &self.templates.is_charging)
            .await
    }

    async fn charging_amps(&self) -> Result<f64> {
        self.number(TelemetryField::ChargingAmps, &self.templates.charging_amps)
            .await
    }

    async fn charging_limit_soc(&self) -> Result<f64> {
        self.number(
            TelemetryField::ChargingLimitSoc,
            &self.templates.charging_limit,
        )
        .await
    }

    async fn charging_plan(&self) -> Result<String> {
        let field = TelemetryField::ChargingPlan;
        let raw = self.read(field, &self.templates.charging_plan).await?;
        parse_option(field.name(), &raw)
    }

    async fn inverter_battery_soc(&self) -> Result<f64> {
        self.number(
            TelemetryField::InverterBatterySoc,
            &self.templates.inverter_soc,
        )
        .await
    }

    async fn battery_load_watts(&self) -> Result<f64> {
        self.number(
            TelemetryField::BatteryLoadWatts,
            &self.templates.battery_load,
        )
        .await
    }

    async fn total_house_load_watts(&self) -> Result<f64> {
        self.number(
            TelemetryField::TotalHouseLoadWatts,
            &self.templates.total_load,
        )
        .await
    }

    async fn grid_power_watts(&self) -> Result<f64> {
        self.number(TelemetryField::GridPowerWatts, &self.templates.grid_power)
            .await
    }

    async fn pv_power_watts(&self) -> Result<f64> {
        self.number(TelemetryField::PvPowerWatts, &self.templates.pv_power)
            .await
    }

    async fn top_up_limit_soc(&self) -> Result<f64> {
        self.number(TelemetryField::TopUpLimitSoc, &self.templates.top_up_limit)
            .await
    }
}

#[async_trait]
impl Actuator for HomeAssistantClient {
    async fn write_entity(&self, entity_id: &str, value: EntityValue) -> Result<()> {
        let call = ServiceCall::for_entity(entity_id, &value)?;
        self.logger
            .debug(&format!("Calling {} for {} = {}", call.path(), entity_id, value));
        self.call_service_with_retry(&call)
            .await
            .map_err(|e| ChargerError::actuation(entity_id, e.to_string()))
    }
}
