use chrono::{NaiveTime, Utc};
use solar_charger::config::Config;
use solar_charger::plan::{ChargingPlan, ChargingPlanState, PlanReason, PlanRules};
use solar_charger::schedule::RequiredPower;
use solar_charger::telemetry::TelemetrySnapshot;

fn rules() -> PlanRules {
    PlanRules::new(&Config::default()).unwrap()
}

fn snapshot(h: u32, m: u32) -> TelemetrySnapshot {
    let mut s = TelemetrySnapshot::new(Utc::now(), NaiveTime::from_hms_opt(h, m, 0).unwrap());
    s.cable_connected = Some(true);
    s.vehicle_soc = Some(40.0);
    s.charging_limit_soc = Some(90.0);
    s.top_up_limit_soc = Some(80.0);
    s.charging_plan = Some("min_plus_solar".to_string());
    s.pv_power_watts = Some(6000.0);
    s.total_house_load_watts = Some(500.0);
    s
}

#[test]
fn daytime_surplus_selects_solar() {
    let d = rules().evaluate(&snapshot(12, 0), ChargingPlan::Off);
    assert_eq!(d.plan, ChargingPlan::SolarFollowing);
    assert_eq!(d.reason, PlanReason::SolarSurplus);
    assert!(!d.hold);

    let mut snap = snapshot(12, 0);
    snap.pv_power_watts = Some(3000.0);
    let d = rules().evaluate(&snap, ChargingPlan::SolarFollowing);
    assert_eq!(d.plan, ChargingPlan::Off);
    assert_eq!(d.reason, PlanReason::InsufficientSurplus);
}

#[test]
fn unknown_pv_counts_as_no_surplus() {
    let mut snap = snapshot(12, 0);
    snap.pv_power_watts = None;
    let d = rules().evaluate(&snap, ChargingPlan::SolarFollowing);
    assert_eq!(d.plan, ChargingPlan::Off);
}

#[test]
fn window_below_top_up_selects_nightly() {
    let d = rules().evaluate(&snapshot(23, 0), ChargingPlan::Off);
    assert_eq!(d.plan, ChargingPlan::NightlyTarget);

    // Nightly rule outranks an external selection
    let mut snap = snapshot(23, 0);
    snap.charging_plan = Some("tesla_schedule".to_string());
    let d = rules().evaluate(&snap, ChargingPlan::PassThroughExternal);
    assert_eq!(d.plan, ChargingPlan::NightlyTarget);
}

#[test]
fn window_at_top_up_stops_or_passes_through() {
    let mut snap = snapshot(1, 0);
    snap.vehicle_soc = Some(80.0);
    let d = rules().evaluate(&snap, ChargingPlan::NightlyTarget);
    assert_eq!(d.plan, ChargingPlan::Off);
    assert_eq!(d.reason, PlanReason::NightlyTargetReached);

    snap.charging_plan = Some("manual".to_string());
    let d = rules().evaluate(&snap, ChargingPlan::NightlyTarget);
    assert_eq!(d.plan, ChargingPlan::PassThroughExternal);
}

#[test]
fn unknown_top_up_skips_nightly_rule() {
    let mut snap = snapshot(23, 0);
    snap.top_up_limit_soc = None;
    let d = rules().evaluate(&snap, ChargingPlan::Off);
    assert_eq!(d.plan, ChargingPlan::SolarFollowing);
}

#[test]
fn safety_inputs_take_priority() {
    let mut snap = snapshot(23, 0);
    snap.cable_connected = Some(false);
    snap.vehicle_soc = None;
    let d = rules().evaluate(&snap, ChargingPlan::NightlyTarget);
    assert_eq!(d.plan, ChargingPlan::Off);
    assert_eq!(d.reason, PlanReason::CableDisconnected);

    let mut snap = snapshot(23, 0);
    snap.cable_connected = None;
    let d = rules().evaluate(&snap, ChargingPlan::NightlyTarget);
    assert!(d.hold);
    assert_eq!(d.plan, ChargingPlan::NightlyTarget);

    let mut snap = snapshot(12, 0);
    snap.vehicle_soc = Some(95.0);
    let d = rules().evaluate(&snap, ChargingPlan::SolarFollowing);
    assert_eq!(d.plan, ChargingPlan::Off);
    assert_eq!(d.reason, PlanReason::VehicleChargeLimitReached);
}

#[test]
fn unrecognized_selector_is_pass_through() {
    let mut snap = snapshot(12, 0);
    snap.charging_plan = Some("something_new".to_string());
    let d = rules().evaluate(&snap, ChargingPlan::SolarFollowing);
    assert_eq!(d.plan, ChargingPlan::PassThroughExternal);
    assert_eq!(d.reason, PlanReason::UnrecognizedSelector);
}

#[test]
fn nightly_requirement_spreads_energy() {
    // 40 % of 57.5 kWh at 1.05 efficiency over 4 h
    let req = rules().nightly_requirement(&snapshot(2, 0)).unwrap();
    assert!((req.required_energy_wh - 24150.0).abs() < 1e-6);
    assert!((req.remaining_hours - 4.0).abs() < 1e-9);
    match req.required_power {
        RequiredPower::Watts(w) => assert!((w - 6037.5).abs() < 1e-6),
        RequiredPower::Maximum => panic!("expected a finite requirement"),
    }
}

#[test]
fn nightly_refresh_respects_interval() {
    let r = rules();
    let t0 = Utc::now();
    let snap = snapshot(23, 0);
    let decision = r.evaluate(&snap, ChargingPlan::Off);
    let mut state = ChargingPlanState::seed(t0, Some(false), Some(0)).transition(&decision, t0);
    assert_eq!(state.active_plan, ChargingPlan::NightlyTarget);

    assert!(r.refresh_nightly(&mut state, &snap, t0));
    assert!(!r.refresh_nightly(&mut state, &snap, t0 + chrono::Duration::seconds(60)));
    assert!(r.refresh_nightly(&mut state, &snap, t0 + chrono::Duration::seconds(900)));

    // Leaving the plan drops the cached requirement
    let mut day = snapshot(12, 0);
    day.vehicle_soc = Some(95.0);
    let off = r.evaluate(&day, ChargingPlan::NightlyTarget);
    let next = state.transition(&off, t0);
    assert!(next.nightly.is_none());
    assert_eq!(next.active_plan, ChargingPlan::Off);
}
