#![no_main]
use libfuzzer_sys::fuzz_target;
use solar_charger::battery::BatteryTier;
use solar_charger::config::{ChargerConfig, NightlyConfig};
use solar_charger::controls::ChargingControls;
use solar_charger::schedule::RequiredPower;

fn f64_at(data: &[u8], idx: usize) -> f64 {
    let mut buf = [0u8; 8];
    for (i, b) in buf.iter_mut().enumerate() {
        *b = data.get(idx * 8 + i).copied().unwrap_or(0);
    }
    f64::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    let charger = ChargerConfig::default();
    let mut nightly = NightlyConfig::default();
    nightly.amps_offset = i32::from(data.first().copied().unwrap_or(0) as i8);
    let controls = ChargingControls::new(&charger, &nightly);

    let tier_max = f64_at(data, 1);
    let surplus = f64_at(data, 2);
    let required = f64_at(data, 3);

    let cmds = [
        controls.solve_solar(tier_max, surplus),
        controls.solve_nightly(BatteryTier::Reserve, tier_max, RequiredPower::Watts(required)),
        controls.solve_nightly(BatteryTier::PeakShaving, tier_max, RequiredPower::Maximum),
    ];
    for cmd in cmds {
        if cmd.on {
            assert!(cmd.amps >= charger.min_amps && cmd.amps <= charger.max_amps);
        } else {
            assert_eq!(cmd.amps, 0);
        }
    }
});
