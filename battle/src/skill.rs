//! Skill definitions and per-battle skill instances.

use serde::{Deserialize, Serialize};
use tamer_protocol::{BaseSkillId, Element, SkillId};

use crate::effect::Effect;

/// Skill damage category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Physical,
    Special,
    Status,
    /// Uses the better of atk/spa against the matching defense
    Climax,
}

/// Who the skill points at by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOpinion {
    SelfPet,
    Opponent,
}

/// Number of hits per use; a range is rolled once per use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Multihit {
    Fixed(u32),
    Range(u32, u32),
}

impl Default for Multihit {
    fn default() -> Self {
        Multihit::Fixed(1)
    }
}

/// Immutable skill definition from the data repository
#[derive(Debug, Clone)]
pub struct SkillDef {
    pub id: BaseSkillId,
    pub name: String,
    pub category: Category,
    pub element: Element,
    pub power: u32,
    /// Percent, 0..=100
    pub accuracy: f64,
    pub rage_cost: u32,
    pub priority: i32,
    pub target: TargetOpinion,
    pub multihit: Multihit,
    pub sure_hit: bool,
    pub sure_crit: bool,
    pub ignore_shield: bool,
    pub tags: Vec<String>,
    pub effects: Vec<Effect>,
}

impl SkillDef {
    pub fn new(
        id: impl Into<BaseSkillId>,
        name: impl Into<String>,
        category: Category,
        element: Element,
        power: u32,
        accuracy: f64,
        rage_cost: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            element,
            power,
            accuracy,
            rage_cost,
            priority: 0,
            target: TargetOpinion::Opponent,
            multihit: Multihit::default(),
            sure_hit: false,
            sure_crit: false,
            ignore_shield: false,
            tags: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target(mut self, target: TargetOpinion) -> Self {
        self.target = target;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_multihit(mut self, multihit: Multihit) -> Self {
        self.multihit = multihit;
        self
    }
}

/// A skill instance owned by one pet for the battle's lifetime
#[derive(Debug, Clone)]
pub struct Skill {
    pub id: SkillId,
    pub base: BaseSkillId,
    pub name: String,
    pub category: Category,
    pub element: Element,
    pub power: u32,
    pub accuracy: f64,
    pub rage_cost: u32,
    pub priority: i32,
    pub target: TargetOpinion,
    pub multihit: Multihit,
    pub sure_hit: bool,
    pub sure_crit: bool,
    pub ignore_shield: bool,
    pub tags: Vec<String>,
    pub effects: Vec<Effect>,
}

impl Skill {
    pub fn instantiate(def: &SkillDef, id: SkillId) -> Self {
        Self {
            id,
            base: def.id.clone(),
            name: def.name.clone(),
            category: def.category,
            element: def.element,
            power: def.power,
            accuracy: def.accuracy,
            rage_cost: def.rage_cost,
            priority: def.priority,
            target: def.target,
            multihit: def.multihit,
            sure_hit: def.sure_hit,
            sure_crit: def.sure_crit,
            ignore_shield: def.ignore_shield,
            tags: def.tags.clone(),
            effects: def.effects.clone(),
        }
    }
}
