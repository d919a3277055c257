use solar_charger::error::ChargerError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ChargerError::config("x"),
        ChargerError::Config { .. }
    ));
    assert!(matches!(
        ChargerError::validation("f", "m"),
        ChargerError::ConfigInvalid { .. }
    ));
    assert!(matches!(
        ChargerError::telemetry("vehicle_soc", "unknown"),
        ChargerError::TelemetryUnavailable { .. }
    ));
    assert!(matches!(
        ChargerError::actuation("switch.car_charger", "refused"),
        ChargerError::ActuationFailed { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    let ser = ChargerError::Serialization {
        message: "s".into(),
    };
    assert!(matches!(ser, ChargerError::Serialization { .. }));
    assert!(matches!(ChargerError::io("x"), ChargerError::Io { .. }));
    assert!(matches!(
        ChargerError::network("x"),
        ChargerError::Network { .. }
    ));
    assert!(matches!(
        ChargerError::timeout("x"),
        ChargerError::Timeout { .. }
    ));
    assert!(matches!(ChargerError::web("x"), ChargerError::Web { .. }));
}

#[test]
fn display_names_field_and_entity() {
    let err = ChargerError::telemetry("inverter_battery_soc", "state is 'unavailable'");
    assert_eq!(
        err.to_string(),
        "Telemetry unavailable: inverter_battery_soc - state is 'unavailable'"
    );

    let err = ChargerError::actuation("number.car_charging_amps", "HTTP 500");
    assert_eq!(
        err.to_string(),
        "Actuation failed: number.car_charging_amps - HTTP 500"
    );
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: ChargerError = io.into();
    assert!(matches!(err, ChargerError::Io { .. }));
    assert!(!err.is_fatal());
}
