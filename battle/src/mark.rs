//! Marks: stackable, duration-bound status effect carriers.

use serde::{Deserialize, Serialize};
use tamer_protocol::{BaseMarkId, BattleStat, MarkId, PetId};

use crate::effect::Effect;

/// What happens when a mark is applied on top of an existing instance
/// with the same base id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStrategy {
    /// Add stacks (clamped to max), keep the longer duration
    Stack,
    /// Keep stacks, keep the longer duration
    Refresh,
    /// Add stacks (clamped to max), add durations
    Extend,
    /// Keep the higher stack count and the longer duration
    Max,
    /// Discard the old instance's numbers entirely
    Replace,
}

/// Behavioral flags and bounds for one mark definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkConfig {
    /// Turns until expiry; -1 means never
    pub duration: i32,
    pub persistent: bool,
    pub max_stacks: u32,
    pub stackable: bool,
    pub stack_strategy: StackStrategy,
    pub destroyable: bool,
    /// Shield marks absorb damage stack-by-stack before HP
    pub is_shield: bool,
    pub keep_on_switch_out: bool,
    pub transfer_on_switch: bool,
    pub inherit_on_faint: bool,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            duration: 3,
            persistent: false,
            max_stacks: 1,
            stackable: false,
            stack_strategy: StackStrategy::Refresh,
            destroyable: true,
            is_shield: false,
            keep_on_switch_out: false,
            transfer_on_switch: false,
            inherit_on_faint: false,
        }
    }
}

/// Immutable mark definition from the data repository
#[derive(Debug, Clone)]
pub struct MarkDef {
    pub id: BaseMarkId,
    pub name: String,
    pub config: MarkConfig,
    pub tags: Vec<String>,
    pub effects: Vec<Effect>,
    /// Stat-stage marks carry their stage contribution as a plain field
    /// instead of a wrapper subtype.
    pub stat_stage: Option<(BattleStat, i8)>,
}

impl MarkDef {
    pub fn new(id: impl Into<BaseMarkId>, name: impl Into<String>, config: MarkConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
            tags: Vec::new(),
            effects: Vec::new(),
            stat_stage: None,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Who a mark is attached to. Lookup-only; the owner's collection holds
/// the mark itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOwner {
    Pet(PetId),
    /// Field-wide marks (weather and the like)
    Battle,
}

/// A live mark instance
#[derive(Debug, Clone)]
pub struct Mark {
    pub id: MarkId,
    pub base: BaseMarkId,
    pub name: String,
    pub stack: u32,
    pub duration: i32,
    pub active: bool,
    pub owner: MarkOwner,
    pub config: MarkConfig,
    pub tags: Vec<String>,
    pub effects: Vec<Effect>,
    pub stat_stage: Option<(BattleStat, i8)>,
}

/// Outcome of merging an incoming application into an existing mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackOutcome {
    pub stack: u32,
    pub duration: i32,
    pub changed: bool,
}

impl Mark {
    pub fn instantiate(def: &MarkDef, id: MarkId, owner: MarkOwner) -> Self {
        Self {
            id,
            base: def.id.clone(),
            name: def.name.clone(),
            stack: 1,
            duration: def.config.duration,
            active: true,
            owner,
            config: def.config.clone(),
            tags: def.tags.clone(),
            effects: def.effects.clone(),
            stat_stage: def.stat_stage.clone(),
        }
    }

    /// Add stacks, clamped to the configured maximum
    pub fn add_stacks(&mut self, amount: u32) {
        self.stack = (self.stack + amount).min(self.config.max_stacks);
    }

    /// Remove up to `amount` stacks; returns how many were actually
    /// consumed. The caller destroys the mark when stacks reach zero.
    pub fn consume_stacks(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.stack);
        self.stack -= actual;
        actual
    }

    /// Merge an incoming application per the configured stacking strategy.
    /// Returns `None` when the mark is not stackable.
    pub fn try_stack(&mut self, incoming_stack: u32, incoming_duration: i32) -> Option<StackOutcome> {
        if !self.config.stackable {
            return None;
        }
        let max = self.config.max_stacks;
        let (stack, duration) = match self.config.stack_strategy {
            StackStrategy::Stack => (
                (self.stack + incoming_stack).min(max),
                self.duration.max(incoming_duration),
            ),
            StackStrategy::Refresh => (self.stack, self.duration.max(incoming_duration)),
            StackStrategy::Extend => (
                (self.stack + incoming_stack).min(max),
                self.duration.saturating_add(incoming_duration),
            ),
            StackStrategy::Max => (
                self.stack.max(incoming_stack).min(max),
                self.duration.max(incoming_duration),
            ),
            StackStrategy::Replace => (incoming_stack.min(max), incoming_duration),
        };
        let changed = stack != self.stack || duration != self.duration;
        self.stack = stack;
        self.duration = duration;
        self.active = true;
        Some(StackOutcome {
            stack,
            duration,
            changed,
        })
    }

    /// Count down one turn. Returns true when the mark just expired.
    /// Persistent marks and a -1 duration never tick.
    pub fn tick(&mut self) -> bool {
        if !self.active || self.config.persistent || self.duration < 0 {
            return false;
        }
        self.duration -= 1;
        self.duration <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stackable(strategy: StackStrategy, max: u32) -> Mark {
        let def = MarkDef::new(
            "test",
            "Test",
            MarkConfig {
                stackable: true,
                stack_strategy: strategy,
                max_stacks: max,
                ..MarkConfig::default()
            },
        );
        Mark::instantiate(&def, MarkId::new("m1"), MarkOwner::Battle)
    }

    #[test]
    fn test_add_stacks_clamps_to_max() {
        let mut mark = stackable(StackStrategy::Stack, 5);
        mark.add_stacks(3);
        assert_eq!(mark.stack, 4);
        mark.add_stacks(10);
        assert_eq!(mark.stack, 5);
    }

    #[test]
    fn test_consume_stacks_floors_at_zero() {
        let mut mark = stackable(StackStrategy::Stack, 5);
        mark.add_stacks(2);
        assert_eq!(mark.consume_stacks(2), 2);
        assert_eq!(mark.stack, 1);
        assert_eq!(mark.consume_stacks(9), 1);
        assert_eq!(mark.stack, 0);
    }

    #[test]
    fn test_stack_strategy_stack() {
        let mut mark = stackable(StackStrategy::Stack, 3);
        let outcome = mark.try_stack(5, 2).unwrap();
        assert_eq!(outcome.stack, 3);
        assert_eq!(outcome.duration, 3);
        assert!(outcome.changed);
    }

    #[test]
    fn test_stack_strategy_refresh_keeps_stack() {
        let mut mark = stackable(StackStrategy::Refresh, 3);
        let outcome = mark.try_stack(5, 9).unwrap();
        assert_eq!(outcome.stack, 1);
        assert_eq!(outcome.duration, 9);
    }

    #[test]
    fn test_stack_strategy_replace() {
        let mut mark = stackable(StackStrategy::Replace, 10);
        mark.add_stacks(4);
        mark.duration = 7;
        let outcome = mark.try_stack(2, 1).unwrap();
        assert_eq!(outcome.stack, 2);
        assert_eq!(outcome.duration, 1);
    }

    #[test]
    fn test_unstackable_rejects() {
        let def = MarkDef::new("solo", "Solo", MarkConfig::default());
        let mut mark = Mark::instantiate(&def, MarkId::new("m2"), MarkOwner::Battle);
        assert!(mark.try_stack(1, 3).is_none());
    }

    #[test]
    fn test_tick_expires() {
        let def = MarkDef::new(
            "brief",
            "Brief",
            MarkConfig {
                duration: 1,
                ..MarkConfig::default()
            },
        );
        let mut mark = Mark::instantiate(&def, MarkId::new("m3"), MarkOwner::Battle);
        assert!(mark.tick());
    }

    #[test]
    fn test_negative_duration_never_ticks() {
        // -1 is the "until removed" sentinel even without the persistent flag
        let def = MarkDef::new(
            "lasting",
            "Lasting",
            MarkConfig {
                duration: -1,
                persistent: false,
                ..MarkConfig::default()
            },
        );
        let mut mark = Mark::instantiate(&def, MarkId::new("m5"), MarkOwner::Battle);
        for _ in 0..10 {
            assert!(!mark.tick());
            assert_eq!(mark.duration, -1);
        }
    }

    #[test]
    fn test_persistent_never_ticks() {
        let def = MarkDef::new(
            "aura",
            "Aura",
            MarkConfig {
                duration: -1,
                persistent: true,
                ..MarkConfig::default()
            },
        );
        let mut mark = Mark::instantiate(&def, MarkId::new("m4"), MarkOwner::Battle);
        for _ in 0..10 {
            assert!(!mark.tick());
        }
    }
}
