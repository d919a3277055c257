use solar_charger::config::Config;
use solar_charger::error::ChargerError;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.api.url = "http://10.0.0.5:8123".to_string();
    cfg.charger.max_amps = 32;
    cfg.nightly.amps_offset = -1;

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.api.url, "http://10.0.0.5:8123");
    assert_eq!(loaded.charger.max_amps, 32);
    assert_eq!(loaded.nightly.amps_offset, -1);
    assert!(loaded.validate().is_ok());
}

#[test]
fn partial_yaml_falls_back_to_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        b"charger:\n  max_amps: 11\nnightly:\n  start: \"23:30\"\n",
    )
    .unwrap();

    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.charger.max_amps, 11);
    assert_eq!(cfg.charger.min_amps, 5);
    assert_eq!(cfg.nightly.start, "23:30");
    assert_eq!(cfg.nightly.end, "06:00");
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    cfg.charger.min_amps = 17;
    assert!(matches!(
        cfg.validate(),
        Err(ChargerError::ConfigInvalid { .. })
    ));

    cfg = Config::default();
    cfg.charger.poll_interval = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.charger.charge_efficiency_factor = 0.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.nightly.start = "25:00".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.timezone = "Mars/Olympus".to_string();
    assert!(cfg.validate().is_err());

    // Tiers must stay monotonic in both SoC and power
    cfg = Config::default();
    cfg.battery.peak_shaving.max_power = 1000.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.battery.reserve.hysteresis = 25.0;
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"charger: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn redacted_hides_token_only() {
    let mut cfg = Config::default();
    cfg.api.token = "abc".to_string();
    let red = cfg.redacted();
    assert_eq!(red.api.token, "***");
    assert_eq!(red.api.url, cfg.api.url);

    let empty = Config::default().redacted();
    assert!(empty.api.token.is_empty());
}
