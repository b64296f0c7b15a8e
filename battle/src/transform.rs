//! Transformations: swapping an entity's base definition mid-battle.
//!
//! Temporary transformations stack by priority; the highest priority one
//! is active and removing it reveals the next, then the permanent base,
//! then the original. Strategies encapsulate how each entity kind swaps
//! its definition, so the system itself stays entity-agnostic.

use tamer_protocol::{MarkId, PetId, SkillId};

use crate::battle::Battle;
use crate::pet::compute_stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Pet,
    Skill,
    Mark,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Pet(PetId),
    Skill(SkillId),
    Mark(MarkId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Pet(_) => EntityKind::Pet,
            EntityRef::Skill(_) => EntityKind::Skill,
            EntityRef::Mark(_) => EntityKind::Mark,
        }
    }
}

/// One applied transformation
#[derive(Debug, Clone)]
pub struct TransformationRecord {
    pub id: u64,
    pub target: EntityRef,
    pub from_base: String,
    pub to_base: String,
    pub permanent: bool,
    pub priority: i32,
    pub caused_by: Option<MarkId>,
}

/// Snapshot of a target's transformation stack
#[derive(Debug, Clone)]
pub struct TransformationState {
    pub is_transformed: bool,
    pub current: Vec<TransformationRecord>,
    pub active: Option<TransformationRecord>,
}

impl TransformationState {
    fn untransformed() -> Self {
        Self {
            is_transformed: false,
            current: Vec::new(),
            active: None,
        }
    }
}

/// How one entity kind swaps its base definition
pub trait TransformationStrategy {
    fn kind(&self) -> EntityKind;
    /// Whether the swap can be performed (target and new base both exist)
    fn can_transform(&self, battle: &Battle, target: &EntityRef, to_base: &str) -> bool;
    fn original_base(&self, battle: &Battle, target: &EntityRef) -> Option<String>;
    /// Perform the swap; returns false when the target vanished
    fn apply(&self, battle: &mut Battle, target: &EntityRef, to_base: &str) -> bool;
}

/// Per-target transformation bookkeeping
#[derive(Debug, Clone, Default)]
struct TargetStack {
    original_base: String,
    permanent: Option<TransformationRecord>,
    /// Sorted by priority descending; the first entry is active
    temporary: Vec<TransformationRecord>,
}

impl TargetStack {
    fn active(&self) -> Option<&TransformationRecord> {
        self.temporary.first().or(self.permanent.as_ref())
    }

    fn all(&self) -> Vec<TransformationRecord> {
        let mut out = self.temporary.clone();
        out.extend(self.permanent.clone());
        out
    }

    fn is_empty(&self) -> bool {
        self.temporary.is_empty() && self.permanent.is_none()
    }
}

#[derive(Default)]
pub struct TransformationSystem {
    strategies: Vec<Box<dyn TransformationStrategy + Send + Sync>>,
    stacks: std::collections::HashMap<EntityRef, TargetStack>,
    next_id: u64,
}

impl std::fmt::Debug for TransformationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationSystem")
            .field("strategies", &self.strategies.len())
            .field("stacks", &self.stacks)
            .finish()
    }
}

impl TransformationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A system with the standard pet, skill, and mark strategies
    pub fn with_default_strategies() -> Self {
        let mut system = Self::new();
        system.register(Box::new(PetTransformStrategy));
        system.register(Box::new(SkillTransformStrategy));
        system.register(Box::new(MarkTransformStrategy));
        system
    }

    pub fn register(&mut self, strategy: Box<dyn TransformationStrategy + Send + Sync>) {
        self.strategies.push(strategy);
    }

    fn strategy(&self, kind: EntityKind) -> Option<&(dyn TransformationStrategy + Send + Sync)> {
        self.strategies
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_ref())
    }

    /// Apply a transformation. Returns false when no strategy handles the
    /// target kind, the swap is impossible, or the battle has ended.
    pub fn transform(
        &mut self,
        battle: &mut Battle,
        target: EntityRef,
        to_base: String,
        permanent: bool,
        priority: i32,
        caused_by: Option<MarkId>,
        preserve_temporary: bool,
    ) -> bool {
        if battle.has_ended() {
            return false;
        }
        // scope the strategy borrow so the stack bookkeeping below can
        // mutate the system
        let original = {
            let Some(strategy) = self.strategy(target.kind()) else {
                return false;
            };
            if !strategy.can_transform(battle, &target, &to_base) {
                return false;
            }
            match strategy.original_base(battle, &target) {
                Some(original) => original,
                None => return false,
            }
        };

        let from_base = self
            .stacks
            .get(&target)
            .and_then(|s| s.active().map(|r| r.to_base.clone()))
            .unwrap_or_else(|| original.clone());

        self.next_id += 1;
        let record = TransformationRecord {
            id: self.next_id,
            target: target.clone(),
            from_base: from_base.clone(),
            to_base: to_base.clone(),
            permanent,
            priority,
            caused_by,
        };

        let stack = self.stacks.entry(target.clone()).or_insert_with(|| TargetStack {
            original_base: original,
            ..TargetStack::default()
        });

        if permanent {
            stack.permanent = Some(record);
            if !preserve_temporary {
                stack.temporary.clear();
            }
            if !stack.temporary.is_empty() {
                // a temporary transformation stays on top; nothing to apply
                return true;
            }
        } else {
            let pos = stack
                .temporary
                .iter()
                .position(|r| r.priority < priority)
                .unwrap_or(stack.temporary.len());
            let on_top = pos == 0;
            stack.temporary.insert(pos, record);
            if !on_top {
                return true;
            }
        }

        match self.strategy(target.kind()) {
            Some(strategy) => strategy.apply(battle, &target, &to_base),
            None => false,
        }
    }

    /// Remove the active temporary transformation, restoring the next one
    /// down, the permanent base, or the original. Returns the base that is
    /// now active, or None when the target was not transformed.
    pub fn remove_transformation(
        &mut self,
        battle: &mut Battle,
        target: &EntityRef,
    ) -> Option<String> {
        let stack = self.stacks.get_mut(target)?;
        if stack.temporary.is_empty() {
            return None;
        }
        stack.temporary.remove(0);
        let restored = stack
            .active()
            .map(|r| r.to_base.clone())
            .unwrap_or_else(|| stack.original_base.clone());
        if stack.is_empty() {
            self.stacks.remove(target);
        }
        let strategy = self.strategy(target.kind())?;
        strategy.apply(battle, target, &restored);
        Some(restored)
    }

    /// Remove every transformation a destroyed mark caused. Safe to call
    /// for marks that never caused one.
    pub fn cleanup_mark_transformations(&mut self, battle: &mut Battle, mark: &MarkId) {
        let targets: Vec<EntityRef> = self
            .stacks
            .iter()
            .filter(|(_, stack)| {
                stack
                    .all()
                    .iter()
                    .any(|r| r.caused_by.as_ref() == Some(mark))
            })
            .map(|(target, _)| target.clone())
            .collect();

        for target in targets {
            let Some(stack) = self.stacks.get_mut(&target) else {
                continue;
            };
            let was_active = stack
                .active()
                .is_some_and(|r| r.caused_by.as_ref() == Some(mark));
            stack
                .temporary
                .retain(|r| r.caused_by.as_ref() != Some(mark));
            if stack
                .permanent
                .as_ref()
                .is_some_and(|r| r.caused_by.as_ref() == Some(mark))
            {
                stack.permanent = None;
            }
            let restored = stack
                .active()
                .map(|r| r.to_base.clone())
                .unwrap_or_else(|| stack.original_base.clone());
            if stack.is_empty() {
                self.stacks.remove(&target);
            }
            if was_active {
                if let Some(strategy) = self.strategy(target.kind()) {
                    strategy.apply(battle, &target, &restored);
                }
            }
        }
    }

    pub fn state(&self, target: &EntityRef) -> TransformationState {
        match self.stacks.get(target) {
            None => TransformationState::untransformed(),
            Some(stack) => TransformationState {
                is_transformed: stack.active().is_some(),
                current: stack.all(),
                active: stack.active().cloned(),
            },
        }
    }
}

/// Swap a pet's species: element and stats follow, HP keeps its fraction
pub struct PetTransformStrategy;

impl TransformationStrategy for PetTransformStrategy {
    fn kind(&self) -> EntityKind {
        EntityKind::Pet
    }

    fn can_transform(&self, battle: &Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Pet(id) = target else {
            return false;
        };
        battle.pet(id).is_some()
            && battle
                .store
                .species(&tamer_protocol::SpeciesId::new(to_base))
                .is_ok()
    }

    fn original_base(&self, battle: &Battle, target: &EntityRef) -> Option<String> {
        let EntityRef::Pet(id) = target else {
            return None;
        };
        battle.pet(id).map(|p| p.species.to_string())
    }

    fn apply(&self, battle: &mut Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Pet(id) = target else {
            return false;
        };
        let species = match battle.store.species(&tamer_protocol::SpeciesId::new(to_base)) {
            Ok(s) => s.clone(),
            Err(_) => return false,
        };
        let Some(pet) = battle.pet_mut(id) else {
            return false;
        };
        let hp_fraction = if pet.stats.max_hp > 0 {
            pet.current_hp as f64 / pet.stats.max_hp as f64
        } else {
            0.0
        };
        pet.species = species.id.clone();
        pet.element = species.element;
        pet.stats = compute_stats(&species, &pet.ivs, &pet.evs, pet.level, pet.nature);
        pet.current_hp = ((pet.stats.max_hp as f64 * hp_fraction).round() as u32)
            .min(pet.stats.max_hp);
        true
    }
}

/// Swap a skill instance's base definition; instance identity survives
pub struct SkillTransformStrategy;

impl TransformationStrategy for SkillTransformStrategy {
    fn kind(&self) -> EntityKind {
        EntityKind::Skill
    }

    fn can_transform(&self, battle: &Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Skill(id) = target else {
            return false;
        };
        battle.find_skill(id).is_some()
            && battle
                .store
                .skill(&tamer_protocol::BaseSkillId::new(to_base))
                .is_ok()
    }

    fn original_base(&self, battle: &Battle, target: &EntityRef) -> Option<String> {
        let EntityRef::Skill(id) = target else {
            return None;
        };
        battle.find_skill(id).map(|s| s.base.to_string())
    }

    fn apply(&self, battle: &mut Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Skill(id) = target else {
            return false;
        };
        let def = match battle
            .store
            .skill(&tamer_protocol::BaseSkillId::new(to_base))
        {
            Ok(d) => d.clone(),
            Err(_) => return false,
        };
        let Some(skill) = battle.find_skill_mut(id) else {
            return false;
        };
        let id = skill.id.clone();
        *skill = crate::skill::Skill::instantiate(&def, id);
        true
    }
}

/// Swap a mark's base definition; stack and duration carry over, clamped
pub struct MarkTransformStrategy;

impl TransformationStrategy for MarkTransformStrategy {
    fn kind(&self) -> EntityKind {
        EntityKind::Mark
    }

    fn can_transform(&self, battle: &Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Mark(id) = target else {
            return false;
        };
        battle.mark(id).is_some()
            && battle
                .store
                .mark(&tamer_protocol::BaseMarkId::new(to_base))
                .is_ok()
    }

    fn original_base(&self, battle: &Battle, target: &EntityRef) -> Option<String> {
        let EntityRef::Mark(id) = target else {
            return None;
        };
        battle.mark(id).map(|m| m.base.to_string())
    }

    fn apply(&self, battle: &mut Battle, target: &EntityRef, to_base: &str) -> bool {
        let EntityRef::Mark(id) = target else {
            return false;
        };
        let def = match battle.store.mark(&tamer_protocol::BaseMarkId::new(to_base)) {
            Ok(d) => d.clone(),
            Err(_) => return false,
        };
        let Some(mark) = battle.mark_mut(id) else {
            return false;
        };
        let stack = mark.stack.min(def.config.max_stacks).max(1);
        let duration = mark.duration;
        let id = mark.id.clone();
        let owner = mark.owner.clone();
        *mark = crate::mark::Mark::instantiate(&def, id, owner);
        mark.stack = stack;
        mark.duration = duration;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untransformed_state_is_empty() {
        let system = TransformationSystem::with_default_strategies();
        let state = system.state(&EntityRef::Pet(PetId::new("nobody")));
        assert!(!state.is_transformed);
        assert!(state.current.is_empty());
        assert!(state.active.is_none());
    }
}
