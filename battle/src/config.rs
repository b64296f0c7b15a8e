//! Engine constants.

/// Rage is clamped to [0, MAX_RAGE]
pub const MAX_RAGE: u32 = 100;

/// Rage both players gain at the end of each turn
pub const RAGE_PER_TURN: u32 = 15;

/// Rage gained by the defender per point of damage taken
pub const RAGE_PER_DAMAGE: f64 = 0.5;

/// Rage gained by the attacker when a damaging skill connects
pub const RAGE_ON_HIT: u32 = 15;

/// Fraction of rage kept when voluntarily switching out
pub const SWITCH_RAGE_RETENTION: f64 = 0.8;

/// Starting rage for both players
pub const INITIAL_RAGE: u32 = 20;

/// Stage multiplier table indexed by `stage + 6` (stage in -6..=+6)
pub const STAT_STAGE_MULTIPLIER: [f64; 13] = [
    0.25, 0.28, 0.33, 0.4, 0.5, 0.66, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0,
];

/// Same-type attack bonus multiplier
pub const STAB_MULTIPLIER: f64 = 1.5;

/// Critical hit multiplier
pub const CRIT_MULTIPLIER: f64 = 1.5;

/// Default critical hit chance (percent)
pub const BASE_CRIT_RATE: f64 = 10.0;

/// Default accuracy (percent)
pub const BASE_ACCURACY: f64 = 100.0;

/// Multiplier for a stat stage value
pub fn stage_multiplier(stage: i8) -> f64 {
    let idx = (stage.clamp(-6, 6) + 6) as usize;
    STAT_STAGE_MULTIPLIER[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_multiplier_bounds() {
        assert_eq!(stage_multiplier(0), 1.0);
        assert_eq!(stage_multiplier(6), 4.0);
        assert_eq!(stage_multiplier(-6), 0.25);
        assert_eq!(stage_multiplier(12), 4.0);
    }
}
