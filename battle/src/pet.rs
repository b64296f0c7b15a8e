//! Pets: the combatants. Final stats derive from species bases, level,
//! individual and effort values, and nature.

use serde::{Deserialize, Serialize};
use tamer_protocol::{BattleStat, Element, PetId, PlayerId, SkillId, SpeciesId, StatStages, StatType};

use crate::attribute::AttributeModifier;
use crate::config;
use crate::mark::Mark;
use crate::skill::Skill;
use crate::species::{Nature, Species, StatSpread};

/// Build-time description of a pet, before battle instantiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetBlueprint {
    pub id: PetId,
    pub name: String,
    pub species: SpeciesId,
    pub level: u32,
    pub nature: Nature,
    #[serde(default)]
    pub ivs: StatSpread,
    #[serde(default)]
    pub evs: StatSpread,
    pub skills: Vec<tamer_protocol::BaseSkillId>,
}

/// Final computed stats at the pet's level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputedStats {
    pub max_hp: u32,
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}

impl ComputedStats {
    pub fn set(&mut self, stat: StatType, value: u32) {
        match stat {
            StatType::Hp => self.max_hp = value,
            StatType::Atk => self.atk = value,
            StatType::Def => self.def = value,
            StatType::Spa => self.spa = value,
            StatType::Spd => self.spd = value,
            StatType::Spe => self.spe = value,
        }
    }

    pub fn get(&self, stat: StatType) -> u32 {
        match stat {
            StatType::Hp => self.max_hp,
            StatType::Atk => self.atk,
            StatType::Def => self.def,
            StatType::Spa => self.spa,
            StatType::Spd => self.spd,
            StatType::Spe => self.spe,
        }
    }
}

fn stat_point(base: u32, iv: u32, ev: u32, level: u32) -> u32 {
    (2 * base + iv + ev / 4) * level / 100
}

/// `floor((2*base + iv + floor(ev/4)) * level / 100 + 5) * nature`
pub fn compute_stat(base: u32, iv: u32, ev: u32, level: u32, nature_mult: f64) -> u32 {
    (((stat_point(base, iv, ev, level) + 5) as f64) * nature_mult).floor() as u32
}

/// `floor((2*base + iv + floor(ev/4)) * level / 100) + level + 10`
pub fn compute_hp(base: u32, iv: u32, ev: u32, level: u32) -> u32 {
    stat_point(base, iv, ev, level) + level + 10
}

pub fn compute_stats(
    species: &Species,
    ivs: &StatSpread,
    evs: &StatSpread,
    level: u32,
    nature: Nature,
) -> ComputedStats {
    let stat = |s: StatType| {
        compute_stat(
            species.base_stats.get(s),
            ivs.get(s),
            evs.get(s),
            level,
            nature.multiplier(s),
        )
    };
    ComputedStats {
        max_hp: compute_hp(species.base_stats.hp, ivs.hp, evs.hp, level),
        atk: stat(StatType::Atk),
        def: stat(StatType::Def),
        spa: stat(StatType::Spa),
        spd: stat(StatType::Spd),
        spe: stat(StatType::Spe),
    }
}

/// A live pet in battle
#[derive(Debug, Clone)]
pub struct Pet {
    pub id: PetId,
    pub name: String,
    pub species: SpeciesId,
    pub element: Element,
    pub level: u32,
    pub nature: Nature,
    pub ivs: StatSpread,
    pub evs: StatSpread,
    pub stats: ComputedStats,
    pub current_hp: u32,
    pub stat_stages: StatStages,
    /// Flat percent adjustments from marks (accuracy, evasion, crit rate)
    pub accuracy_mod: f64,
    pub evasion: f64,
    pub crit_rate_mod: f64,
    /// Stacks independently of stat stages; folded over every read
    pub attribute_mods: Vec<AttributeModifier>,
    pub owner: PlayerId,
    pub skills: Vec<Skill>,
    pub marks: Vec<Mark>,
    pub last_skill: Option<SkillId>,
    /// Same base skill used this many times in a row
    pub skill_streak: Option<(tamer_protocol::BaseSkillId, u32)>,
    pub stunned: bool,
}

impl Pet {
    pub fn new(
        blueprint: &PetBlueprint,
        species: &Species,
        owner: PlayerId,
        skills: Vec<Skill>,
    ) -> Self {
        let stats = compute_stats(
            species,
            &blueprint.ivs,
            &blueprint.evs,
            blueprint.level,
            blueprint.nature,
        );
        Self {
            id: blueprint.id.clone(),
            name: blueprint.name.clone(),
            species: blueprint.species.clone(),
            element: species.element,
            level: blueprint.level,
            nature: blueprint.nature,
            ivs: blueprint.ivs,
            evs: blueprint.evs,
            stats,
            current_hp: stats.max_hp,
            stat_stages: StatStages::default(),
            accuracy_mod: 0.0,
            evasion: 0.0,
            crit_rate_mod: 0.0,
            attribute_mods: Vec::new(),
            owner,
            skills,
            marks: Vec::new(),
            last_skill: None,
            skill_streak: None,
            stunned: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    /// Stat after applying the stage multiplier and attribute modifiers.
    /// Battle-only stats (accuracy, evasion, crit rate) resolve from
    /// their flat modifiers.
    pub fn effective_stat(&self, stat: BattleStat) -> f64 {
        let staged = match stat {
            BattleStat::Accuracy => (config::BASE_ACCURACY + self.accuracy_mod).clamp(0.0, 100.0),
            BattleStat::Evasion => self.evasion.clamp(0.0, 100.0),
            BattleStat::CritRate => (config::BASE_CRIT_RATE + self.crit_rate_mod).max(0.0),
            other => match other.base() {
                Some(s) => {
                    self.stats.get(s) as f64 * config::stage_multiplier(self.stat_stages.get(stat))
                }
                None => 0.0,
            },
        };
        crate::attribute::modified_stat(&self.attribute_mods, stat, staged)
    }

    pub fn add_attribute_modifier(&mut self, modifier: AttributeModifier) {
        self.attribute_mods.push(modifier);
    }

    /// Drop every modifier a destroyed mark contributed
    pub fn clear_mark_modifiers(&mut self, mark: &tamer_protocol::MarkId) {
        self.attribute_mods
            .retain(|m| m.source.as_ref() != Some(mark));
    }

    /// Rewrite the base stat in place: add the delta, scale by the
    /// percent, floor. Stages and modifiers still apply on top.
    pub fn modify_base_stat(&mut self, stat: BattleStat, delta: f64, percent: f64) {
        let Some(base) = stat.base() else {
            return;
        };
        let current = self.stats.get(base) as f64;
        let updated = ((current + delta) * (100.0 + percent) / 100.0).floor().max(0.0);
        self.stats.set(base, updated as u32);
    }

    /// Effective speed, used for action ordering
    pub fn effective_speed(&self) -> f64 {
        self.effective_stat(BattleStat::Spe)
    }

    /// Reduce HP, clamped at zero. Returns the damage actually dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current_hp);
        self.current_hp -= dealt;
        dealt
    }

    /// Restore HP, clamped at max. Returns the amount actually healed.
    pub fn apply_heal(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.stats.max_hp - self.current_hp);
        self.current_hp += healed;
        healed
    }

    pub fn mark(&self, id: &tamer_protocol::MarkId) -> Option<&Mark> {
        self.marks.iter().find(|m| &m.id == id)
    }

    pub fn mark_mut(&mut self, id: &tamer_protocol::MarkId) -> Option<&mut Mark> {
        self.marks.iter_mut().find(|m| &m.id == id)
    }

    pub fn has_mark_base(&self, base: &tamer_protocol::BaseMarkId) -> bool {
        self.marks.iter().any(|m| m.active && &m.base == base)
    }

    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| &s.id == id)
    }

    pub fn skill_by_base(&self, base: &tamer_protocol::BaseSkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| &s.base == base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamer_protocol::Element;

    fn sample_species() -> Species {
        Species::new("flamepup", "Flamepup", Element::Fire, StatSpread {
            hp: 80,
            atk: 100,
            def: 70,
            spa: 90,
            spd: 75,
            spe: 95,
        })
    }

    #[test]
    fn test_stat_formula() {
        // (2*100 + 31 + 252/4) * 50 / 100 + 5 = 152, Adamant -> 167
        let v = compute_stat(100, 31, 252, 50, 1.1);
        assert_eq!(v, 167);
        assert_eq!(compute_stat(100, 31, 252, 50, 1.0), 152);
    }

    #[test]
    fn test_hp_formula() {
        // (2*80 + 31 + 0) * 50 / 100 + 50 + 10 = 95 + 60 = 155
        assert_eq!(compute_hp(80, 31, 0, 50), 155);
    }

    #[test]
    fn test_damage_and_heal_clamp() {
        let species = sample_species();
        let bp = PetBlueprint {
            id: PetId::new("p1"),
            name: "Pup".into(),
            species: species.id.clone(),
            level: 50,
            nature: Nature::Hardy,
            ivs: StatSpread::uniform(31),
            evs: StatSpread::default(),
            skills: Vec::new(),
        };
        let mut pet = Pet::new(&bp, &species, PlayerId::new("a"), Vec::new());
        let max = pet.stats.max_hp;
        assert_eq!(pet.apply_damage(max + 500), max);
        assert_eq!(pet.current_hp, 0);
        assert!(!pet.is_alive());
        assert_eq!(pet.apply_heal(30), 30);
        assert_eq!(pet.apply_heal(max), max - 30);
    }

    #[test]
    fn test_effective_stat_stages() {
        let species = sample_species();
        let bp = PetBlueprint {
            id: PetId::new("p1"),
            name: "Pup".into(),
            species: species.id.clone(),
            level: 50,
            nature: Nature::Hardy,
            ivs: StatSpread::default(),
            evs: StatSpread::default(),
            skills: Vec::new(),
        };
        let mut pet = Pet::new(&bp, &species, PlayerId::new("a"), Vec::new());
        let base = pet.effective_stat(BattleStat::Atk);
        pet.stat_stages.boost(BattleStat::Atk, 2);
        assert_eq!(pet.effective_stat(BattleStat::Atk), base * 2.0);
        pet.stat_stages.boost(BattleStat::Atk, -4);
        assert_eq!(pet.effective_stat(BattleStat::Atk), base * 0.5);
    }
}
