//! Configuration management for the charging controller
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{ChargerError, Result};
use crate::schedule::{NightlyWindow, parse_hhmm};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "SOLAR_CHARGER_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Home Assistant connection, entities and templates
    pub api: ApiConfig,

    /// Physical charger limits and loop cadence
    pub charger: ChargerConfig,

    /// Nightly top-up window
    pub nightly: NightlyConfig,

    /// House battery protection tiers
    pub battery: BatteryConfig,

    /// Plan selector option names
    pub plans: PlansConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Status API binding configuration
    pub web: WebConfig,

    /// Timezone the nightly window is expressed in
    pub timezone: String,
}

/// External state API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://homeassistant.local:8123`
    pub url: String,

    /// Long-lived access token
    pub token: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Write retries before reporting an actuation failure
    pub max_retries: u32,

    /// Delay between write retries in milliseconds
    pub retry_delay_ms: u64,

    /// Entities the controller writes to
    pub entities: EntitiesConfig,

    /// Template expressions the controller reads
    pub templates: TemplatesConfig,
}

/// Writable entity identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    /// Switch that enables or disables charging
    pub switch_set_charging: String,

    /// Number entity holding the charging current in amps
    pub number_set_charging_amps: String,

    /// Selector holding the active charging plan
    pub select_charging_plan: String,
}

/// Template expressions resolved once per field and cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub charging_amps: String,
    pub charging_limit: String,
    pub charging_plan: String,
    pub top_up_limit: String,
    pub inverter_soc: String,
    pub car_soc: String,
    pub battery_load: String,
    pub total_load: String,
    pub grid_power: String,
    pub pv_power: String,
    pub charger_connected: String,
    pub is_charging: String,
}

/// Charger limits and loop cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// Lowest current the charger accepts while charging
    pub min_amps: u32,

    /// Highest current the controller will ever command
    pub max_amps: u32,

    /// Minimum surplus in watts worth charging from
    pub min_power: f64,

    /// Hard ceiling on charging power in watts
    pub max_power: f64,

    /// Number of phases the charger uses
    pub phases: u32,

    /// Nominal phase voltage
    pub volts: f64,

    /// Usable vehicle battery capacity in Wh
    pub vehicle_battery_capacity: f64,

    /// Grid energy needed per unit of stored energy (>= 1.0)
    pub charge_efficiency_factor: f64,

    /// Seconds between decision cycles
    pub poll_interval: u64,

    /// Seconds allowed for a full telemetry read
    pub read_timeout: u64,

    /// Hand control to the user when the charger is changed externally
    pub manual_takeover: bool,
}

/// Nightly top-up window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NightlyConfig {
    /// Window start in HH:MM
    pub start: String,

    /// Window end (deadline) in HH:MM, may be before `start`
    pub end: String,

    /// Seconds between required-power recalculations
    pub recalc_interval: u64,

    /// Amps subtracted from the computed nightly current before clamping
    pub amps_offset: i32,
}

/// One battery protection tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TierConfig {
    /// Lowest battery SoC (inclusive) at which this tier applies
    pub soc: f64,

    /// Grid power the charger may draw while in this tier
    pub max_power: f64,

    /// SoC points below the next tier's threshold that still keep the
    /// higher tier when falling back into this one
    pub hysteresis: f64,
}

/// House battery tiers in ascending SoC order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub no_charging: TierConfig,
    pub reserve: TierConfig,
    pub peak_shaving_minimal: TierConfig,
    pub peak_shaving: TierConfig,
}

/// Plan selector option names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlansConfig {
    /// Options under which this controller manages charging
    pub managed: Vec<String>,

    /// Options under which another party controls charging
    pub pass_through: Vec<String>,

    /// Option written on manual takeover
    pub manual_option: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Status API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Whether to serve the status API
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Number of cycle reports kept for `/api/history`
    pub history_size: usize,
}

impl ChargerConfig {
    /// Watts delivered per amp across all phases
    pub fn watts_per_amp(&self) -> f64 {
        f64::from(self.phases) * self.volts
    }
}

impl PlansConfig {
    /// Whether the selector option hands charging to the controller
    pub fn is_managed(&self, option: &str) -> bool {
        self.managed.iter().any(|o| o.eq_ignore_ascii_case(option))
    }

    /// Whether the selector option is a known pass-through mode
    pub fn is_pass_through(&self, option: &str) -> bool {
        self.pass_through
            .iter()
            .any(|o| o.eq_ignore_ascii_case(option))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the environment-specified or default locations
    pub fn load() -> Result<Self> {
        let mut config = if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            Self::from_file(&path).map_err(|e| {
                ChargerError::config(format!("Failed to load {}: {}", path, e))
            })?
        } else {
            let default_paths = [
                "solar_charger.yaml",
                "/data/solar_charger.yaml",
                "/etc/solar-charger/config.yaml",
            ];
            match default_paths.iter().find(|p| Path::new(p).exists()) {
                Some(path) => Self::from_file(path)?,
                None => Config::default(),
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override API credentials from the environment when present
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SOLAR_CHARGER_API_URL")
            && !url.is_empty()
        {
            self.api.url = url;
        }
        if let Ok(token) = std::env::var("SOLAR_CHARGER_API_TOKEN")
            && !token.is_empty()
        {
            self.api.token = token;
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Copy of the configuration safe to expose over the status API
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api.token.is_empty() {
            copy.api.token = "***".to_string();
        }
        copy
    }

    /// Parsed timezone; only valid after [`Config::validate`]
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        chrono_tz::Tz::from_str(&self.timezone)
            .map_err(|_| ChargerError::validation("timezone", "Unknown timezone"))
    }

    /// Parsed nightly window; only valid after [`Config::validate`]
    pub fn nightly_window(&self) -> Result<NightlyWindow> {
        NightlyWindow::from_config(&self.nightly)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_charger()?;
        self.validate_nightly()?;
        self.validate_battery()?;
        self.tz()?;

        if self.web.enabled && self.web.port == 0 {
            return Err(ChargerError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_charger(&self) -> Result<()> {
        let c = &self.charger;
        if c.min_amps == 0 {
            return Err(ChargerError::validation(
                "charger.min_amps",
                "Must be greater than 0",
            ));
        }
        if c.min_amps > c.max_amps {
            return Err(ChargerError::validation(
                "charger.min_amps",
                format!(
                    "min_amps ({}) must not exceed max_amps ({})",
                    c.min_amps, c.max_amps
                ),
            ));
        }
        if c.phases == 0 {
            return Err(ChargerError::validation(
                "charger.phases",
                "Must be greater than 0",
            ));
        }
        for (field, value) in [
            ("charger.volts", c.volts),
            ("charger.vehicle_battery_capacity", c.vehicle_battery_capacity),
            ("charger.charge_efficiency_factor", c.charge_efficiency_factor),
            ("charger.max_power", c.max_power),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ChargerError::validation(field, "Must be positive"));
            }
        }
        if !c.min_power.is_finite() || c.min_power < 0.0 {
            return Err(ChargerError::validation(
                "charger.min_power",
                "Must not be negative",
            ));
        }
        if c.min_power > c.max_power {
            return Err(ChargerError::validation(
                "charger.min_power",
                "Must not exceed max_power",
            ));
        }
        if c.poll_interval == 0 {
            return Err(ChargerError::validation(
                "charger.poll_interval",
                "Must be greater than 0",
            ));
        }
        if c.read_timeout == 0 {
            return Err(ChargerError::validation(
                "charger.read_timeout",
                "Must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_nightly(&self) -> Result<()> {
        let start = parse_hhmm(&self.nightly.start)
            .ok_or_else(|| ChargerError::validation("nightly.start", "Expected HH:MM"))?;
        let end = parse_hhmm(&self.nightly.end)
            .ok_or_else(|| ChargerError::validation("nightly.end", "Expected HH:MM"))?;
        if start == end {
            return Err(ChargerError::validation(
                "nightly.end",
                "Window start and end must differ",
            ));
        }
        if self.nightly.recalc_interval == 0 {
            return Err(ChargerError::validation(
                "nightly.recalc_interval",
                "Must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_battery(&self) -> Result<()> {
        let b = &self.battery;
        let tiers = [
            ("battery.no_charging", &b.no_charging),
            ("battery.reserve", &b.reserve),
            ("battery.peak_shaving_minimal", &b.peak_shaving_minimal),
            ("battery.peak_shaving", &b.peak_shaving),
        ];

        for (name, tier) in tiers {
            if !(0.0..=100.0).contains(&tier.soc) {
                return Err(ChargerError::validation(name, "soc must be within 0..=100"));
            }
            if !tier.max_power.is_finite() || tier.max_power < 0.0 {
                return Err(ChargerError::validation(name, "max_power must not be negative"));
            }
            if !tier.hysteresis.is_finite() || tier.hysteresis < 0.0 {
                return Err(ChargerError::validation(name, "hysteresis must not be negative"));
            }
        }

        for pair in tiers.windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if upper.soc <= lower.soc {
                return Err(ChargerError::validation(
                    upper_name,
                    format!("soc threshold overlaps {}", lower_name),
                ));
            }
            if upper.max_power < lower.max_power {
                return Err(ChargerError::validation(
                    upper_name,
                    format!("max_power is lower than {}", lower_name),
                ));
            }
        }

        if b.no_charging.max_power != 0.0 {
            return Err(ChargerError::validation(
                "battery.no_charging",
                "max_power must be 0",
            ));
        }
        for (name, tier) in [
            ("battery.no_charging", &b.no_charging),
            ("battery.peak_shaving_minimal", &b.peak_shaving_minimal),
            ("battery.peak_shaving", &b.peak_shaving),
        ] {
            if tier.hysteresis != 0.0 {
                return Err(ChargerError::validation(
                    name,
                    "only the reserve tier may carry hysteresis",
                ));
            }
        }
        if b.reserve.hysteresis >= b.peak_shaving_minimal.soc - b.reserve.soc {
            return Err(ChargerError::validation(
                "battery.reserve",
                "hysteresis must be smaller than the reserve tier width",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.charger.min_amps, 5);
        assert_eq!(config.charger.max_amps, 16);
        assert_eq!(config.charger.poll_interval, 30);
        assert!((config.charger.watts_per_amp() - 690.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.charger.min_amps = 20;
        assert!(matches!(
            config.validate(),
            Err(ChargerError::ConfigInvalid { .. })
        ));

        config = Config::default();
        config.nightly.end = config.nightly.start.clone();
        assert!(config.validate().is_err());

        config = Config::default();
        config.battery.reserve.soc = config.battery.peak_shaving_minimal.soc;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.charger.max_amps, deserialized.charger.max_amps);
        assert_eq!(config.battery.reserve, deserialized.battery.reserve);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "charger:\n  max_amps: 32\nnightly:\n  start: \"23:00\"\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.charger.max_amps, 32);
        assert_eq!(config.charger.min_amps, 5);
        assert_eq!(config.nightly.start, "23:00");
        assert_eq!(config.nightly.end, "06:00");
    }

    #[test]
    fn plan_options_match_case_insensitively() {
        let plans = PlansConfig::default();
        assert!(plans.is_managed("Min_Plus_Solar"));
        assert!(plans.is_pass_through("manual"));
        assert!(!plans.is_managed("manual"));
    }

    #[test]
    fn redacted_hides_token() {
        let mut config = Config::default();
        config.api.token = "secret".to_string();
        assert_eq!(config.redacted().api.token, "***");
        assert_eq!(config.api.token, "secret");
    }
}
