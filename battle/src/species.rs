//! Species definitions, natures, and stat spreads.

use serde::{Deserialize, Serialize};
use tamer_protocol::{Element, SpeciesId, StatType};

/// A value per persistent stat (base stats, EVs, IVs)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSpread {
    pub hp: u32,
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}

impl StatSpread {
    pub fn uniform(value: u32) -> Self {
        Self {
            hp: value,
            atk: value,
            def: value,
            spa: value,
            spd: value,
            spe: value,
        }
    }

    pub fn get(&self, stat: StatType) -> u32 {
        match stat {
            StatType::Hp => self.hp,
            StatType::Atk => self.atk,
            StatType::Def => self.def,
            StatType::Spa => self.spa,
            StatType::Spd => self.spd,
            StatType::Spe => self.spe,
        }
    }
}

/// Natures skew one stat up and one down by 10%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nature {
    Hardy,
    Adamant,
    Modest,
    Timid,
    Bold,
    Calm,
    Careful,
    Jolly,
}

impl Nature {
    pub fn multiplier(&self, stat: StatType) -> f64 {
        let (up, down) = match self {
            Nature::Hardy => return 1.0,
            Nature::Adamant => (StatType::Atk, StatType::Spa),
            Nature::Modest => (StatType::Spa, StatType::Atk),
            Nature::Timid => (StatType::Spe, StatType::Atk),
            Nature::Bold => (StatType::Def, StatType::Atk),
            Nature::Calm => (StatType::Spd, StatType::Atk),
            Nature::Careful => (StatType::Spd, StatType::Spa),
            Nature::Jolly => (StatType::Spe, StatType::Spa),
        };
        if stat == up {
            1.1
        } else if stat == down {
            0.9
        } else {
            1.0
        }
    }
}

/// Immutable species definition from the data repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub element: Element,
    pub base_stats: StatSpread,
}

impl Species {
    pub fn new(
        id: impl Into<SpeciesId>,
        name: impl Into<String>,
        element: Element,
        base_stats: StatSpread,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            element,
            base_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nature_multipliers() {
        assert_eq!(Nature::Adamant.multiplier(StatType::Atk), 1.1);
        assert_eq!(Nature::Adamant.multiplier(StatType::Spa), 0.9);
        assert_eq!(Nature::Adamant.multiplier(StatType::Def), 1.0);
        assert_eq!(Nature::Hardy.multiplier(StatType::Atk), 1.0);
    }

    #[test]
    fn test_spread_lookup() {
        let spread = StatSpread::uniform(31);
        assert_eq!(spread.get(StatType::Spe), 31);
    }
}
