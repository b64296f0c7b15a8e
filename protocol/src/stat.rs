//! Stat enums and stage tables.

use serde::{Deserialize, Serialize};

/// Persistent stats, keyed by EV/IV spreads and species base stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Hp,
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
}

impl StatType {
    pub const ALL: [StatType; 6] = [
        StatType::Hp,
        StatType::Atk,
        StatType::Def,
        StatType::Spa,
        StatType::Spd,
        StatType::Spe,
    ];
}

/// Stats addressable during battle (no HP; includes battle-only stats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BattleStat {
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
    Accuracy,
    Evasion,
    CritRate,
}

impl BattleStat {
    /// Stats that participate in stat stages (-6..+6)
    pub const STAGED: [BattleStat; 5] = [
        BattleStat::Atk,
        BattleStat::Def,
        BattleStat::Spa,
        BattleStat::Spd,
        BattleStat::Spe,
    ];

    /// The persistent stat this battle stat derives from, if any
    pub fn base(&self) -> Option<StatType> {
        match self {
            BattleStat::Atk => Some(StatType::Atk),
            BattleStat::Def => Some(StatType::Def),
            BattleStat::Spa => Some(StatType::Spa),
            BattleStat::Spd => Some(StatType::Spd),
            BattleStat::Spe => Some(StatType::Spe),
            BattleStat::Accuracy | BattleStat::Evasion | BattleStat::CritRate => None,
        }
    }
}

/// Stat stage modifiers (-6 to +6)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatStages {
    pub atk: i8,
    pub def: i8,
    pub spa: i8,
    pub spd: i8,
    pub spe: i8,
}

impl StatStages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stat: BattleStat) -> i8 {
        match stat {
            BattleStat::Atk => self.atk,
            BattleStat::Def => self.def,
            BattleStat::Spa => self.spa,
            BattleStat::Spd => self.spd,
            BattleStat::Spe => self.spe,
            _ => 0,
        }
    }

    /// Set a stage, clamped to -6..+6. Battle-only stats have no stage.
    pub fn set(&mut self, stat: BattleStat, value: i8) {
        let clamped = value.clamp(-6, 6);
        match stat {
            BattleStat::Atk => self.atk = clamped,
            BattleStat::Def => self.def = clamped,
            BattleStat::Spa => self.spa = clamped,
            BattleStat::Spd => self.spd = clamped,
            BattleStat::Spe => self.spe = clamped,
            _ => {}
        }
    }

    /// Apply a boost, returns the change actually applied
    pub fn boost(&mut self, stat: BattleStat, amount: i8) -> i8 {
        let current = self.get(stat);
        let new_value = (current + amount).clamp(-6, 6);
        self.set(stat, new_value);
        new_value - current
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_clamps() {
        let mut stages = StatStages::new();
        assert_eq!(stages.boost(BattleStat::Atk, 4), 4);
        assert_eq!(stages.boost(BattleStat::Atk, 4), 2);
        assert_eq!(stages.atk, 6);
        assert_eq!(stages.boost(BattleStat::Atk, 1), 0);
    }

    #[test]
    fn test_battle_only_stats_have_no_stage() {
        let mut stages = StatStages::new();
        stages.set(BattleStat::Accuracy, 3);
        assert_eq!(stages.get(BattleStat::Accuracy), 0);
    }
}
