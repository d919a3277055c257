use super::*;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "http://homeassistant.local:8123".to_string(),
            token: String::new(),
            request_timeout_ms: 5000,
            max_retries: 2,
            retry_delay_ms: 500,
            entities: EntitiesConfig::default(),
            templates: TemplatesConfig::default(),
        }
    }
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            switch_set_charging: "switch.car_charger".to_string(),
            number_set_charging_amps: "number.car_charging_amps".to_string(),
            select_charging_plan: "input_select.car_charging_plan".to_string(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            charging_amps: "{{ states('number.car_charging_amps') }}".to_string(),
            charging_limit: "{{ states('number.car_charge_limit') }}".to_string(),
            charging_plan: "{{ states('input_select.car_charging_plan') }}".to_string(),
            top_up_limit: "{{ states('input_number.car_top_up_limit') }}".to_string(),
            inverter_soc: "{{ states('sensor.inverter_battery_soc') }}".to_string(),
            car_soc: "{{ states('sensor.car_battery') }}".to_string(),
            battery_load: "{{ states('sensor.inverter_battery_power') }}".to_string(),
            total_load: "{{ states('sensor.house_essential_load') }}".to_string(),
            grid_power: "{{ states('sensor.grid_power') }}".to_string(),
            pv_power: "{{ states('sensor.pv_power') }}".to_string(),
            charger_connected: "{{ states('binary_sensor.car_charger_cable') }}".to_string(),
            is_charging: "{{ states('switch.car_charger') }}".to_string(),
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            min_amps: 5,
            max_amps: 16,
            min_power: 3450.0,
            max_power: 11040.0,
            phases: 3,
            volts: 230.0,
            vehicle_battery_capacity: 57500.0,
            charge_efficiency_factor: 1.05,
            poll_interval: 30,
            read_timeout: 10,
            manual_takeover: false,
        }
    }
}

impl Default for NightlyConfig {
    fn default() -> Self {
        Self {
            start: "22:00".to_string(),
            end: "06:00".to_string(),
            recalc_interval: 900,
            amps_offset: 0,
        }
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            soc: 0.0,
            max_power: 0.0,
            hysteresis: 0.0,
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            no_charging: TierConfig::default(),
            reserve: TierConfig {
                soc: 15.0,
                max_power: 3500.0,
                hysteresis: 5.0,
            },
            peak_shaving_minimal: TierConfig {
                soc: 35.0,
                max_power: 7000.0,
                hysteresis: 0.0,
            },
            peak_shaving: TierConfig {
                soc: 60.0,
                max_power: 11040.0,
                hysteresis: 0.0,
            },
        }
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            managed: vec!["min_plus_solar".to_string()],
            pass_through: vec!["manual".to_string(), "tesla_schedule".to_string()],
            manual_option: "manual".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8088,
            history_size: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            charger: ChargerConfig::default(),
            nightly: NightlyConfig::default(),
            battery: BatteryConfig::default(),
            plans: PlansConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            timezone: "Europe/Berlin".to_string(),
        }
    }
}
