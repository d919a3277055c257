use crate::actuator::EntityValue;
use crate::error::{ChargerError, Result};
use serde::Serialize;

/// Rendered states Home Assistant uses for "no value"
const UNKNOWN_STATES: [&str; 4] = ["unknown", "unavailable", "none", "null"];

/// Body of `POST /api/template`
#[derive(Debug, Clone, Serialize)]
pub struct TemplateRequest<'a> {
    pub template: &'a str,
}

/// Whether a rendered value means the sensor has no reading
pub fn is_unknown(raw: &str) -> bool {
    let value = raw.trim();
    value.is_empty() || UNKNOWN_STATES.iter().any(|s| value.eq_ignore_ascii_case(s))
}

fn known<'a>(field: &str, raw: &'a str) -> Result<&'a str> {
    if is_unknown(raw) {
        return Err(ChargerError::telemetry(
            field,
            format!("state is '{}'", raw.trim()),
        ));
    }
    Ok(raw.trim())
}

/// Parse a rendered numeric state
pub fn parse_number(field: &str, raw: &str) -> Result<f64> {
    let value = known(field, raw)?;
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ChargerError::telemetry(field, format!("not a number: '{}'", value)))
}

/// Parse a rendered on/off state
pub fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    let value = known(field, raw)?;
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" | "home" => Ok(true),
        "off" | "false" | "0" | "no" | "not_home" => Ok(false),
        other => Err(ChargerError::telemetry(
            field,
            format!("not a boolean state: '{}'", other),
        )),
    }
}

/// Parse a rendered selector option
pub fn parse_option(field: &str, raw: &str) -> Result<String> {
    known(field, raw).map(str::to_string)
}

/// One `POST /api/services/{domain}/{service}` call
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: &'static str,
    pub data: serde_json::Value,
}

impl ServiceCall {
    /// Service call that sets `entity_id` to `value`. The domain is taken
    /// from the entity id so `input_number`/`input_select` helpers work the
    /// same as `number`/`select` entities.
    pub fn for_entity(entity_id: &str, value: &EntityValue) -> Result<Self> {
        let domain = entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                ChargerError::actuation(entity_id, "entity id must look like 'domain.object_id'")
            })?;

        let (service, data) = match value {
            EntityValue::Switch(true) => ("turn_on", serde_json::json!({ "entity_id": entity_id })),
            EntityValue::Switch(false) => {
                ("turn_off", serde_json::json!({ "entity_id": entity_id }))
            }
            EntityValue::Number(n) => (
                "set_value",
                serde_json::json!({ "entity_id": entity_id, "value": n }),
            ),
            EntityValue::Option(option) => (
                "select_option",
                serde_json::json!({ "entity_id": entity_id, "option": option }),
            ),
        };

        Ok(Self {
            domain: domain.to_string(),
            service,
            data,
        })
    }

    pub fn path(&self) -> String {
        format!("/api/services/{}/{}", self.domain, self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_states_are_unavailable() {
        for raw in ["unknown", "Unavailable", " None ", "", "\n"] {
            assert!(is_unknown(raw), "{raw:?}");
            assert!(matches!(
                parse_number("car_soc", raw),
                Err(ChargerError::TelemetryUnavailable { .. })
            ));
        }
        assert!(!is_unknown("0"));
    }

    #[test]
    fn numbers_and_booleans_parse() {
        assert_eq!(parse_number("pv", " 1234.5\n").unwrap(), 1234.5);
        assert!(parse_number("pv", "abc").is_err());
        assert!(parse_number("pv", "NaN").is_err());
        assert!(parse_bool("cable", "on").unwrap());
        assert!(!parse_bool("cable", "OFF").unwrap());
        assert!(parse_bool("cable", "maybe").is_err());
        assert_eq!(parse_option("plan", "manual\n").unwrap(), "manual");
    }

    #[test]
    fn service_calls_follow_entity_domain() {
        let call = ServiceCall::for_entity("switch.car_charger", &EntityValue::Switch(false)).unwrap();
        assert_eq!(call.path(), "/api/services/switch/turn_off");
        assert_eq!(call.data, serde_json::json!({"entity_id": "switch.car_charger"}));

        let call =
            ServiceCall::for_entity("number.car_charging_amps", &EntityValue::Number(8.0)).unwrap();
        assert_eq!(call.path(), "/api/services/number/set_value");
        assert_eq!(call.data["value"], 8.0);

        let call = ServiceCall::for_entity(
            "input_select.car_charging_plan",
            &EntityValue::Option("manual".to_string()),
        )
        .unwrap();
        assert_eq!(call.path(), "/api/services/input_select/select_option");
        assert_eq!(call.data["option"], "manual");

        assert!(ServiceCall::for_entity("no_domain", &EntityValue::Switch(true)).is_err());
    }
}
