//! Execution contexts threaded through effect evaluation.
//!
//! Every trigger site builds a context describing the action in flight;
//! effects read and mutate it before the engine commits the result. A
//! context is plain owned data, so an effect can never hold a reference
//! into the battle across a mutation.

use tamer_protocol::{
    BaseMarkId, BaseSkillId, DamageKind, Element, MarkId, PetId, PlayerId, SkillId,
};

use crate::mark::MarkConfig;
use crate::player::RageReason;
use crate::skill::{Category, Multihit};

/// Where the currently-running effect came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectSource {
    Skill { skill: SkillId, owner: PetId },
    Mark { mark: MarkId, owner: Option<PetId> },
}

impl EffectSource {
    /// Stable key for per-effect persistent state
    pub fn carrier_key(&self) -> String {
        match self {
            EffectSource::Skill { skill, .. } => format!("skill:{skill}"),
            EffectSource::Mark { mark, .. } => format!("mark:{mark}"),
        }
    }

    pub fn owner_pet(&self) -> Option<&PetId> {
        match self {
            EffectSource::Skill { owner, .. } => Some(owner),
            EffectSource::Mark { owner, .. } => owner.as_ref(),
        }
    }
}

/// Cause of a pending damage instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DamageSource {
    Pet(PetId),
    Mark(MarkId),
    Skill { skill: SkillId, user: PetId },
}

impl DamageSource {
    pub fn source_pet(&self) -> Option<&PetId> {
        match self {
            DamageSource::Pet(id) => Some(id),
            DamageSource::Skill { user, .. } => Some(user),
            DamageSource::Mark(_) => None,
        }
    }
}

/// One prioritized hit/crit override; the highest priority entry wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub value: bool,
    pub priority: i32,
}

/// Resolve a list of overrides to the winning value, if any
pub fn resolve_overrides(overrides: &[Override]) -> Option<bool> {
    overrides.iter().max_by_key(|o| o.priority).map(|o| o.value)
}

/// A skill use in flight
#[derive(Debug, Clone)]
pub struct SkillCtx {
    pub player: PlayerId,
    pub user: PetId,
    pub skill: SkillId,
    pub base: BaseSkillId,
    /// Cleared by preventing effects; the use becomes a no-op
    pub available: bool,
    pub priority: i32,
    pub category: Category,
    pub element: Element,
    pub power: u32,
    pub accuracy: f64,
    pub rage_cost: u32,
    pub crit_rate: f64,
    pub actual_target: Option<PetId>,
    pub hit_overrides: Vec<Override>,
    pub crit_overrides: Vec<Override>,
    pub multihit: Multihit,
    /// Rolled hit count for this use
    pub multihit_result: u32,
    pub ignore_shield: bool,
    pub hit: bool,
    pub crit: bool,
    pub first_of_turn: bool,
    pub last_of_turn: bool,
}

impl SkillCtx {
    /// Scale power by a percentage (amplify), floored at zero
    pub fn amplify_power(&mut self, percent: f64) {
        let scaled = (self.power as f64 * (1.0 + percent / 100.0)).max(0.0);
        self.power = scaled.floor() as u32;
    }

    pub fn add_power(&mut self, delta: i32) {
        self.power = (self.power as i64 + delta as i64).max(0) as u32;
    }
}

/// A damage instance in flight
#[derive(Debug, Clone)]
pub struct DamageCtx {
    pub source: DamageSource,
    pub target: PetId,
    /// Working value, modified by effects before flooring
    pub value: f64,
    pub kind: DamageKind,
    pub crit: bool,
    pub effectiveness: f64,
    pub ignore_shield: bool,
    pub available: bool,
    /// Accumulated percent scaling and flat delta
    pub modified: (f64, f64),
    pub min_threshold: Option<u32>,
    pub max_threshold: Option<u32>,
}

impl DamageCtx {
    /// Final damage after modifiers and thresholds, floored, never negative
    pub fn final_damage(&self) -> u32 {
        let (percent, delta) = self.modified;
        let mut v = self.value * (1.0 + percent / 100.0) + delta;
        if v < 0.0 {
            v = 0.0;
        }
        let mut out = v.floor() as u32;
        if let Some(min) = self.min_threshold {
            out = out.max(min);
        }
        if let Some(max) = self.max_threshold {
            out = out.min(max);
        }
        out
    }
}

/// A mark application in flight
#[derive(Debug, Clone)]
pub struct AddMarkCtx {
    pub target: PetId,
    /// Pet whose skill or mark caused the application, when there is one
    pub applier: Option<PetId>,
    pub base: BaseMarkId,
    pub stack: u32,
    pub duration: i32,
    /// Overrides applied onto the definition's config before instantiation
    pub config: MarkConfig,
    pub available: bool,
}

/// A rage change in flight
#[derive(Debug, Clone)]
pub struct RageCtx {
    pub player: PlayerId,
    pub delta: i32,
    pub reason: RageReason,
    pub available: bool,
    pub modified: (f64, f64),
}

impl RageCtx {
    pub fn final_delta(&self) -> i32 {
        let (percent, flat) = self.modified;
        (self.delta as f64 * (1.0 + percent / 100.0) + flat).floor() as i32
    }
}

/// A heal in flight
#[derive(Debug, Clone)]
pub struct HealCtx {
    pub source: Option<PetId>,
    pub target: PetId,
    pub value: f64,
    pub available: bool,
    pub modified: (f64, f64),
}

impl HealCtx {
    pub fn final_amount(&self) -> u32 {
        let (percent, flat) = self.modified;
        let v = self.value * (1.0 + percent / 100.0) + flat;
        if v < 0.0 { 0 } else { v.floor() as u32 }
    }
}

/// What the triggering action was. Selectors resolve context bases
/// (the skill in flight, the damage in flight) through this.
#[derive(Debug)]
pub enum ParentCtx<'a> {
    Battle,
    Turn,
    Skill(&'a mut SkillCtx),
    Damage {
        damage: &'a mut DamageCtx,
        skill: Option<&'a SkillCtx>,
    },
    AddMark(&'a mut AddMarkCtx),
    RemoveMark {
        mark: MarkId,
    },
    Rage(&'a mut RageCtx),
    Heal(&'a mut HealCtx),
    Switch {
        player: PlayerId,
        from: PetId,
        to: PetId,
    },
    StatStage {
        pet: PetId,
        stat: tamer_protocol::BattleStat,
        delta: i8,
    },
    Stack {
        mark: MarkId,
    },
}

impl ParentCtx<'_> {
    pub fn skill_ctx(&self) -> Option<&SkillCtx> {
        match self {
            ParentCtx::Skill(ctx) => Some(ctx),
            ParentCtx::Damage { skill, .. } => skill.as_deref(),
            _ => None,
        }
    }

    pub fn damage_ctx(&self) -> Option<&DamageCtx> {
        match self {
            ParentCtx::Damage { damage, .. } => Some(damage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_priority_wins() {
        let overrides = [
            Override { value: false, priority: 1 },
            Override { value: true, priority: 5 },
            Override { value: false, priority: 3 },
        ];
        assert_eq!(resolve_overrides(&overrides), Some(true));
        assert_eq!(resolve_overrides(&[]), None);
    }

    #[test]
    fn test_final_damage_modifiers() {
        let mut ctx = DamageCtx {
            source: DamageSource::Pet(PetId::new("p")),
            target: PetId::new("q"),
            value: 100.0,
            kind: DamageKind::Physical,
            crit: false,
            effectiveness: 1.0,
            ignore_shield: false,
            available: true,
            modified: (50.0, -20.0),
            min_threshold: None,
            max_threshold: None,
        };
        assert_eq!(ctx.final_damage(), 130);
        ctx.max_threshold = Some(60);
        assert_eq!(ctx.final_damage(), 60);
        ctx.modified = (-200.0, 0.0);
        ctx.max_threshold = None;
        ctx.min_threshold = Some(5);
        assert_eq!(ctx.final_damage(), 5);
    }

    #[test]
    fn test_amplify_power_floor() {
        let mut ctx = SkillCtx {
            player: PlayerId::new("a"),
            user: PetId::new("p"),
            skill: SkillId::new("s"),
            base: BaseSkillId::new("b"),
            available: true,
            priority: 0,
            category: Category::Physical,
            element: Element::Normal,
            power: 80,
            accuracy: 100.0,
            rage_cost: 15,
            crit_rate: 10.0,
            actual_target: None,
            hit_overrides: Vec::new(),
            crit_overrides: Vec::new(),
            multihit: Multihit::Fixed(1),
            multihit_result: 1,
            ignore_shield: false,
            hit: false,
            crit: false,
            first_of_turn: false,
            last_of_turn: false,
        };
        ctx.amplify_power(25.0);
        assert_eq!(ctx.power, 100);
        ctx.amplify_power(-200.0);
        assert_eq!(ctx.power, 0);
        ctx.add_power(-5);
        assert_eq!(ctx.power, 0);
    }
}
