//! Battery Profile Selector
//!
//! Maps the house battery SoC onto one of four grid-power allowance tiers.
//! Tier memory is explicit state ([`TierMemory`]) owned by the control loop,
//! so the anti-oscillation band can be audited independently of the plain
//! threshold lookup.

use crate::config::{BatteryConfig, TierConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Battery protection tiers, ordered by ascending SoC threshold and allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryTier {
    NoCharging,
    Reserve,
    PeakShavingMinimal,
    PeakShaving,
}

impl BatteryTier {
    pub const ALL: [BatteryTier; 4] = [
        BatteryTier::NoCharging,
        BatteryTier::Reserve,
        BatteryTier::PeakShavingMinimal,
        BatteryTier::PeakShaving,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BatteryTier::NoCharging => "no_charging",
            BatteryTier::Reserve => "reserve",
            BatteryTier::PeakShavingMinimal => "peak_shaving_minimal",
            BatteryTier::PeakShaving => "peak_shaving",
        }
    }

    /// The next tier up, if any
    pub fn above(self) -> Option<BatteryTier> {
        match self {
            BatteryTier::NoCharging => Some(BatteryTier::Reserve),
            BatteryTier::Reserve => Some(BatteryTier::PeakShavingMinimal),
            BatteryTier::PeakShavingMinimal => Some(BatteryTier::PeakShaving),
            BatteryTier::PeakShaving => None,
        }
    }

    fn config(self, cfg: &BatteryConfig) -> &TierConfig {
        match self {
            BatteryTier::NoCharging => &cfg.no_charging,
            BatteryTier::Reserve => &cfg.reserve,
            BatteryTier::PeakShavingMinimal => &cfg.peak_shaving_minimal,
            BatteryTier::PeakShaving => &cfg.peak_shaving,
        }
    }
}

impl std::fmt::Display for BatteryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a tier was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierReason {
    /// Plain threshold lookup
    Threshold,
    /// SoC fell into a hysteresis band; the higher tier was kept
    HysteresisHold,
    /// Battery SoC unknown; most conservative tier
    SocUnknown,
}

/// Output of one tier selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierSelection {
    pub tier: BatteryTier,
    pub max_grid_power_watts: f64,
    pub reason: TierReason,
}

/// Tier held between cycles and when it was entered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierMemory {
    pub tier: BatteryTier,
    pub entered_at: DateTime<Utc>,
}

impl TierMemory {
    /// Record `tier` as current at `now`, keeping the entry time if unchanged
    pub fn advance(previous: Option<TierMemory>, tier: BatteryTier, now: DateTime<Utc>) -> Self {
        match previous {
            Some(mem) if mem.tier == tier => mem,
            _ => TierMemory {
                tier,
                entered_at: now,
            },
        }
    }
}

/// Static tier table built from configuration
#[derive(Debug, Clone)]
pub struct BatteryProfile {
    cfg: BatteryConfig,
}

impl BatteryProfile {
    pub fn new(cfg: &BatteryConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn threshold(&self, tier: BatteryTier) -> f64 {
        tier.config(&self.cfg).soc
    }

    /// Grid power the charger may draw in `tier`
    pub fn max_grid_power(&self, tier: BatteryTier) -> f64 {
        match tier {
            BatteryTier::NoCharging => 0.0,
            _ => tier.config(&self.cfg).max_power,
        }
    }

    /// Highest tier whose threshold is at or below `soc`
    pub fn tier_for_soc(&self, soc: f64) -> BatteryTier {
        BatteryTier::ALL
            .iter()
            .rev()
            .copied()
            .find(|t| self.threshold(*t) <= soc)
            .unwrap_or(BatteryTier::NoCharging)
    }

    /// Select the tier for `soc`, keeping a higher `previous` tier while the
    /// SoC sits inside the hysteresis band below a boundary.
    pub fn select_tier(&self, soc: Option<f64>, previous: Option<BatteryTier>) -> TierSelection {
        let Some(soc) = soc.filter(|s| s.is_finite()) else {
            return self.selection(BatteryTier::NoCharging, TierReason::SocUnknown);
        };

        let raw = self.tier_for_soc(soc);
        if let Some(prev) = previous
            && prev > raw
            && let Some(up) = raw.above()
        {
            let band = raw.config(&self.cfg).hysteresis;
            let boundary = self.threshold(up);
            if band > 0.0 && soc > boundary - band {
                return self.selection(prev.min(up), TierReason::HysteresisHold);
            }
        }
        self.selection(raw, TierReason::Threshold)
    }

    fn selection(&self, tier: BatteryTier, reason: TierReason) -> TierSelection {
        TierSelection {
            tier,
            max_grid_power_watts: self.max_grid_power(tier),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> BatteryProfile {
        BatteryProfile::new(&BatteryConfig::default())
    }

    #[test]
    fn plain_threshold_lookup() {
        let p = profile();
        assert_eq!(p.tier_for_soc(0.0), BatteryTier::NoCharging);
        assert_eq!(p.tier_for_soc(14.9), BatteryTier::NoCharging);
        assert_eq!(p.tier_for_soc(15.0), BatteryTier::Reserve);
        assert_eq!(p.tier_for_soc(34.9), BatteryTier::Reserve);
        assert_eq!(p.tier_for_soc(35.0), BatteryTier::PeakShavingMinimal);
        assert_eq!(p.tier_for_soc(100.0), BatteryTier::PeakShaving);
    }

    #[test]
    fn unknown_soc_is_no_charging() {
        let sel = profile().select_tier(None, Some(BatteryTier::PeakShaving));
        assert_eq!(sel.tier, BatteryTier::NoCharging);
        assert_eq!(sel.max_grid_power_watts, 0.0);
        assert_eq!(sel.reason, TierReason::SocUnknown);

        let sel = profile().select_tier(Some(f64::NAN), None);
        assert_eq!(sel.tier, BatteryTier::NoCharging);
    }

    #[test]
    fn hysteresis_keeps_tier_directly_above_boundary() {
        let p = profile();
        let sel = p.select_tier(Some(32.0), Some(BatteryTier::PeakShaving));
        assert_eq!(sel.tier, BatteryTier::PeakShavingMinimal);
        assert_eq!(sel.reason, TierReason::HysteresisHold);
    }

    #[test]
    fn no_band_between_upper_tiers() {
        let p = profile();
        let sel = p.select_tier(Some(59.0), Some(BatteryTier::PeakShaving));
        assert_eq!(sel.tier, BatteryTier::PeakShavingMinimal);
        assert_eq!(sel.reason, TierReason::Threshold);
    }

    #[test]
    fn memory_keeps_entry_time_while_unchanged() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(30);
        let m0 = TierMemory::advance(None, BatteryTier::Reserve, t0);
        let m1 = TierMemory::advance(Some(m0), BatteryTier::Reserve, t1);
        assert_eq!(m1.entered_at, t0);
        let m2 = TierMemory::advance(Some(m1), BatteryTier::PeakShaving, t1);
        assert_eq!(m2.entered_at, t1);
    }
}
