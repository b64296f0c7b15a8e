//! Operators: the mutations an effect can perform.
//!
//! Each operator resolves its target selection first, then hands the
//! mutation to the battle so downstream triggers (damage pipeline, mark
//! lifecycle, rage changes) fire exactly as they would for a direct
//! action.

use tamer_protocol::{BaseMarkId, BattleStat, PetId, SpeciesId};

use crate::attribute::{AttributeModifier, ModifierOp, ModifierType};
use crate::battle::Battle;
use crate::context::{DamageSource, EffectSource, Override, ParentCtx};
use crate::effect::condition::ConditionIr;
use crate::effect::selector::{self, SelectorIr};
use crate::effect::value::{ActionError, PropRef, ValueIr};
use crate::mark::StackStrategy;
use crate::player::RageReason;
use crate::skill::Multihit;

#[derive(Debug, Clone)]
pub enum OperatorIr {
    DealDamage {
        target: SelectorIr,
        value: ValueIr,
    },
    Heal {
        target: SelectorIr,
        value: ValueIr,
    },
    AddMark {
        target: SelectorIr,
        mark: BaseMarkId,
        stack: Option<ValueIr>,
        duration: Option<ValueIr>,
    },
    DestroyMark {
        target: SelectorIr,
    },
    /// Move marks onto another pet
    TransferMark {
        target: SelectorIr,
        to: SelectorIr,
    },
    AddStacks {
        target: SelectorIr,
        value: ValueIr,
    },
    ConsumeStacks {
        target: SelectorIr,
        value: ValueIr,
    },
    StatStageBuff {
        target: SelectorIr,
        stat: BattleStat,
        value: ValueIr,
    },
    ClearStatStage {
        target: SelectorIr,
        stat: Option<BattleStat>,
    },
    /// Flat delta and/or percent rewrite of the base stat itself
    ModifyStat {
        target: SelectorIr,
        stat: BattleStat,
        delta: Option<ValueIr>,
        percent: Option<ValueIr>,
    },
    AddAttributeModifier {
        target: SelectorIr,
        stat: BattleStat,
        modifier: ModifierType,
        value: ValueIr,
        priority: i32,
    },
    AddClampMaxModifier {
        target: SelectorIr,
        stat: BattleStat,
        max: ValueIr,
        priority: i32,
    },
    AddClampMinModifier {
        target: SelectorIr,
        stat: BattleStat,
        min: ValueIr,
        priority: i32,
    },
    AddClampModifier {
        target: SelectorIr,
        stat: BattleStat,
        min: ValueIr,
        max: ValueIr,
        priority: i32,
    },
    AddRage {
        target: SelectorIr,
        value: ValueIr,
    },
    AmplifyPower {
        value: ValueIr,
    },
    AddPower {
        value: ValueIr,
    },
    AddCritRate {
        value: ValueIr,
    },
    AddAccuracy {
        value: ValueIr,
    },
    SetMultihit {
        min: ValueIr,
        max: Option<ValueIr>,
    },
    AddMultihitResult {
        value: ValueIr,
    },
    Stun {
        target: SelectorIr,
    },
    SetSureHit {
        priority: i32,
    },
    SetSureCrit {
        priority: i32,
    },
    SetSureMiss {
        priority: i32,
    },
    SetSureNoCrit {
        priority: i32,
    },
    /// Cancel the damage in flight
    PreventDamage,
    AddDamageModified {
        percent: ValueIr,
        delta: ValueIr,
    },
    AddDamageThreshold {
        min: Option<ValueIr>,
        max: Option<ValueIr>,
    },
    SetActualTarget {
        target: SelectorIr,
    },
    SetValue {
        target: SelectorIr,
        value: ValueIr,
    },
    AddValue {
        target: SelectorIr,
        value: ValueIr,
    },
    Toggle {
        target: SelectorIr,
    },
    // mark-application rewrites; only valid inside OnBeforeAddMark
    SetMarkStack(ValueIr),
    SetMarkDuration(ValueIr),
    SetMarkMaxStack(ValueIr),
    SetMarkPersistent(bool),
    SetMarkStackable(bool),
    SetMarkStackStrategy(StackStrategy),
    SetMarkDestroyable(bool),
    SetMarkIsShield(bool),
    SetMarkKeepOnSwitchOut(bool),
    SetMarkTransferOnSwitch(bool),
    SetMarkInheritOnFaint(bool),
    /// Cancel the mark application in flight
    PreventAddMark,
    Transform {
        target: SelectorIr,
        to: SpeciesId,
        permanent: bool,
        priority: i32,
    },
    RemoveTransformation {
        target: SelectorIr,
    },
    Conditional {
        condition: ConditionIr,
        then_ops: Vec<OperatorIr>,
        else_ops: Vec<OperatorIr>,
    },
}

pub fn exec_operator(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &mut ParentCtx<'_>,
    op: &OperatorIr,
) -> Result<(), ActionError> {
    match op {
        OperatorIr::DealDamage { target, value } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let amount = selector::eval_number(battle, source, parent, value)?;
            let damage_source = effect_damage_source(source);
            for pet in pets {
                battle.deal_effect_damage(damage_source.clone(), pet, amount);
            }
            Ok(())
        }
        OperatorIr::Heal { target, value } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let amount = selector::eval_number(battle, source, parent, value)?;
            let healer = source.owner_pet().cloned();
            for pet in pets {
                battle.heal_pet(healer.clone(), pet, amount);
            }
            Ok(())
        }
        OperatorIr::AddMark {
            target,
            mark,
            stack,
            duration,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let stack = match stack {
                Some(v) => Some(selector::eval_number(battle, source, parent, v)? as u32),
                None => None,
            };
            let duration = match duration {
                Some(v) => Some(selector::eval_number(battle, source, parent, v)? as i32),
                None => None,
            };
            let applier = source.owner_pet().cloned();
            for pet in pets {
                battle.add_mark(applier.clone(), pet, mark.clone(), stack, duration)?;
            }
            Ok(())
        }
        OperatorIr::DestroyMark { target } => {
            let marks = resolve_marks(battle, source, parent, target)?;
            for mark in marks {
                battle.destroy_mark(&mark);
            }
            Ok(())
        }
        OperatorIr::TransferMark { target, to } => {
            let marks = resolve_marks(battle, source, parent, target)?;
            let to = first_pet(battle, source, parent, to)?;
            for mark in marks {
                battle.transfer_mark(&mark, &to);
            }
            Ok(())
        }
        OperatorIr::AddStacks { target, value } => {
            let marks = resolve_marks(battle, source, parent, target)?;
            let amount = selector::eval_number(battle, source, parent, value)? as u32;
            for mark in marks {
                battle.add_mark_stacks(&mark, amount);
            }
            Ok(())
        }
        OperatorIr::ConsumeStacks { target, value } => {
            let marks = resolve_marks(battle, source, parent, target)?;
            let amount = selector::eval_number(battle, source, parent, value)? as u32;
            for mark in marks {
                battle.consume_mark_stacks(&mark, amount);
            }
            Ok(())
        }
        OperatorIr::StatStageBuff {
            target,
            stat,
            value,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let delta = selector::eval_number(battle, source, parent, value)? as i8;
            for pet in pets {
                battle.boost_stat(&pet, *stat, delta);
            }
            Ok(())
        }
        OperatorIr::ClearStatStage { target, stat } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            for pet in pets {
                battle.clear_stat_stages(&pet, *stat);
            }
            Ok(())
        }
        OperatorIr::ModifyStat {
            target,
            stat,
            delta,
            percent,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let delta = optional_number(battle, source, parent, delta)?;
            let percent = optional_number(battle, source, parent, percent)?;
            for pet in pets {
                battle.modify_base_stat(&pet, *stat, delta, percent);
            }
            Ok(())
        }
        OperatorIr::AddAttributeModifier {
            target,
            stat,
            modifier,
            value,
            priority,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let value = selector::eval_number(battle, source, parent, value)?;
            let op = modifier.with_value(value);
            add_modifiers(battle, source, &pets, *stat, op, *priority);
            Ok(())
        }
        OperatorIr::AddClampMaxModifier {
            target,
            stat,
            max,
            priority,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let max = selector::eval_number(battle, source, parent, max)?;
            add_modifiers(battle, source, &pets, *stat, ModifierOp::ClampMax(max), *priority);
            Ok(())
        }
        OperatorIr::AddClampMinModifier {
            target,
            stat,
            min,
            priority,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let min = selector::eval_number(battle, source, parent, min)?;
            add_modifiers(battle, source, &pets, *stat, ModifierOp::ClampMin(min), *priority);
            Ok(())
        }
        OperatorIr::AddClampModifier {
            target,
            stat,
            min,
            max,
            priority,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let min = selector::eval_number(battle, source, parent, min)?;
            let max = selector::eval_number(battle, source, parent, max)?;
            add_modifiers(battle, source, &pets, *stat, ModifierOp::Clamp { min, max }, *priority);
            Ok(())
        }
        OperatorIr::AddRage { target, value } => {
            let players = {
                let selection = selector::eval_selector(battle, source, parent, target)?;
                selection.players()?.clone()
            };
            let delta = selector::eval_number(battle, source, parent, value)? as i32;
            for player in players {
                battle.add_rage(&player, delta, RageReason::Effect);
            }
            Ok(())
        }
        OperatorIr::AmplifyPower { value } => {
            let percent = selector::eval_number(battle, source, parent, value)?;
            skill_ctx_mut(parent)?.amplify_power(percent);
            Ok(())
        }
        OperatorIr::AddPower { value } => {
            let delta = selector::eval_number(battle, source, parent, value)? as i32;
            skill_ctx_mut(parent)?.add_power(delta);
            Ok(())
        }
        OperatorIr::AddCritRate { value } => {
            let delta = selector::eval_number(battle, source, parent, value)?;
            let ctx = skill_ctx_mut(parent)?;
            ctx.crit_rate = (ctx.crit_rate + delta).max(0.0);
            Ok(())
        }
        OperatorIr::AddAccuracy { value } => {
            let delta = selector::eval_number(battle, source, parent, value)?;
            let ctx = skill_ctx_mut(parent)?;
            ctx.accuracy = (ctx.accuracy + delta).clamp(0.0, 100.0);
            Ok(())
        }
        OperatorIr::SetMultihit { min, max } => {
            let min = selector::eval_number(battle, source, parent, min)? as u32;
            let multihit = match max {
                Some(max) => {
                    let max = selector::eval_number(battle, source, parent, max)? as u32;
                    Multihit::Range(min, max)
                }
                None => Multihit::Fixed(min),
            };
            skill_ctx_mut(parent)?.multihit = multihit;
            Ok(())
        }
        OperatorIr::AddMultihitResult { value } => {
            let delta = selector::eval_number(battle, source, parent, value)? as i64;
            let ctx = skill_ctx_mut(parent)?;
            ctx.multihit_result = (ctx.multihit_result as i64 + delta).max(0) as u32;
            Ok(())
        }
        OperatorIr::Stun { target } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            for pet in pets {
                battle.stun(&pet);
            }
            Ok(())
        }
        OperatorIr::SetSureHit { priority } => {
            push_override(parent, true, *priority, OverrideSlot::Hit)
        }
        OperatorIr::SetSureMiss { priority } => {
            push_override(parent, false, *priority, OverrideSlot::Hit)
        }
        OperatorIr::SetSureCrit { priority } => {
            push_override(parent, true, *priority, OverrideSlot::Crit)
        }
        OperatorIr::SetSureNoCrit { priority } => {
            push_override(parent, false, *priority, OverrideSlot::Crit)
        }
        OperatorIr::PreventDamage => {
            let ParentCtx::Damage { damage, .. } = parent else {
                return Err(ActionError::MissingContext("damage"));
            };
            damage.available = false;
            Ok(())
        }
        OperatorIr::AddDamageModified { percent, delta } => {
            let percent = selector::eval_number(battle, source, parent, percent)?;
            let delta = selector::eval_number(battle, source, parent, delta)?;
            let ParentCtx::Damage { damage, .. } = parent else {
                return Err(ActionError::MissingContext("damage"));
            };
            damage.modified.0 += percent;
            damage.modified.1 += delta;
            Ok(())
        }
        OperatorIr::AddDamageThreshold { min, max } => {
            let min = match min {
                Some(v) => Some(selector::eval_number(battle, source, parent, v)? as u32),
                None => None,
            };
            let max = match max {
                Some(v) => Some(selector::eval_number(battle, source, parent, v)? as u32),
                None => None,
            };
            let ParentCtx::Damage { damage, .. } = parent else {
                return Err(ActionError::MissingContext("damage"));
            };
            if let Some(min) = min {
                damage.min_threshold = Some(damage.min_threshold.map_or(min, |m| m.max(min)));
            }
            if let Some(max) = max {
                damage.max_threshold = Some(damage.max_threshold.map_or(max, |m| m.min(max)));
            }
            Ok(())
        }
        OperatorIr::SetActualTarget { target } => {
            let pet = first_pet(battle, source, parent, target)?;
            skill_ctx_mut(parent)?.actual_target = Some(pet);
            Ok(())
        }
        OperatorIr::SetValue { target, value } => {
            write_props(battle, source, parent, target, value, WriteMode::Set)
        }
        OperatorIr::AddValue { target, value } => {
            write_props(battle, source, parent, target, value, WriteMode::Add)
        }
        OperatorIr::Toggle { target } => {
            let props = {
                let selection = selector::eval_selector(battle, source, parent, target)?;
                selection.props()?.clone()
            };
            for prop in props {
                match prop {
                    PropRef::PetStunned(pet) => {
                        if let Some(pet) = battle.pet_mut(&pet) {
                            pet.stunned = !pet.stunned;
                        }
                    }
                    _ => return Err(ActionError::Unsupported("toggle on non-boolean property")),
                }
            }
            Ok(())
        }
        OperatorIr::SetMarkStack(v) => {
            let value = selector::eval_number(battle, source, parent, v)? as u32;
            add_mark_ctx(parent)?.stack = value;
            Ok(())
        }
        OperatorIr::SetMarkDuration(v) => {
            let value = selector::eval_number(battle, source, parent, v)? as i32;
            add_mark_ctx(parent)?.duration = value;
            Ok(())
        }
        OperatorIr::SetMarkMaxStack(v) => {
            let value = selector::eval_number(battle, source, parent, v)? as u32;
            add_mark_ctx(parent)?.config.max_stacks = value.max(1);
            Ok(())
        }
        OperatorIr::SetMarkPersistent(v) => {
            add_mark_ctx(parent)?.config.persistent = *v;
            Ok(())
        }
        OperatorIr::SetMarkStackable(v) => {
            add_mark_ctx(parent)?.config.stackable = *v;
            Ok(())
        }
        OperatorIr::SetMarkStackStrategy(strategy) => {
            add_mark_ctx(parent)?.config.stack_strategy = *strategy;
            Ok(())
        }
        OperatorIr::SetMarkDestroyable(v) => {
            add_mark_ctx(parent)?.config.destroyable = *v;
            Ok(())
        }
        OperatorIr::SetMarkIsShield(v) => {
            add_mark_ctx(parent)?.config.is_shield = *v;
            Ok(())
        }
        OperatorIr::SetMarkKeepOnSwitchOut(v) => {
            add_mark_ctx(parent)?.config.keep_on_switch_out = *v;
            Ok(())
        }
        OperatorIr::SetMarkTransferOnSwitch(v) => {
            add_mark_ctx(parent)?.config.transfer_on_switch = *v;
            Ok(())
        }
        OperatorIr::SetMarkInheritOnFaint(v) => {
            add_mark_ctx(parent)?.config.inherit_on_faint = *v;
            Ok(())
        }
        OperatorIr::PreventAddMark => {
            add_mark_ctx(parent)?.available = false;
            Ok(())
        }
        OperatorIr::Transform {
            target,
            to,
            permanent,
            priority,
        } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            let caused_by = match source {
                EffectSource::Mark { mark, .. } => Some(mark.clone()),
                _ => None,
            };
            for pet in pets {
                battle.transform_pet(&pet, to, *permanent, *priority, caused_by.clone());
            }
            Ok(())
        }
        OperatorIr::RemoveTransformation { target } => {
            let pets = resolve_pets(battle, source, parent, target)?;
            for pet in pets {
                battle.remove_transformation(&pet);
            }
            Ok(())
        }
        OperatorIr::Conditional {
            condition,
            then_ops,
            else_ops,
        } => {
            let ops = if crate::effect::condition::eval_condition(battle, source, parent, condition)?
            {
                then_ops
            } else {
                else_ops
            };
            for op in ops {
                exec_operator(battle, source, parent, op)?;
            }
            Ok(())
        }
    }
}

enum OverrideSlot {
    Hit,
    Crit,
}

fn push_override(
    parent: &mut ParentCtx<'_>,
    value: bool,
    priority: i32,
    slot: OverrideSlot,
) -> Result<(), ActionError> {
    let ctx = skill_ctx_mut(parent)?;
    let list = match slot {
        OverrideSlot::Hit => &mut ctx.hit_overrides,
        OverrideSlot::Crit => &mut ctx.crit_overrides,
    };
    list.push(Override { value, priority });
    Ok(())
}

enum WriteMode {
    Set,
    Add,
}

fn write_props(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &mut ParentCtx<'_>,
    target: &SelectorIr,
    value: &ValueIr,
    mode: WriteMode,
) -> Result<(), ActionError> {
    let props = {
        let selection = selector::eval_selector(battle, source, parent, target)?;
        selection.props()?.clone()
    };
    let value = selector::eval_number(battle, source, parent, value)?;
    for prop in props {
        match prop {
            PropRef::PetHp(pet) => {
                if let Some(pet) = battle.pet_mut(&pet) {
                    let current = pet.current_hp as f64;
                    let next = match mode {
                        WriteMode::Set => value,
                        WriteMode::Add => current + value,
                    };
                    pet.current_hp = next.clamp(0.0, pet.stats.max_hp as f64) as u32;
                }
            }
            PropRef::MarkStack(mark) => {
                if let Some(mark) = battle.mark_mut(&mark) {
                    let current = mark.stack as f64;
                    let next = match mode {
                        WriteMode::Set => value,
                        WriteMode::Add => current + value,
                    };
                    mark.stack = next.clamp(0.0, mark.config.max_stacks as f64) as u32;
                }
            }
            PropRef::MarkDuration(mark) => {
                if let Some(mark) = battle.mark_mut(&mark) {
                    let current = mark.duration as f64;
                    let next = match mode {
                        WriteMode::Set => value,
                        WriteMode::Add => current + value,
                    };
                    mark.duration = next as i32;
                }
            }
            PropRef::SkillPower => {
                let ctx = skill_ctx_mut(parent)?;
                let next = match mode {
                    WriteMode::Set => value,
                    WriteMode::Add => ctx.power as f64 + value,
                };
                ctx.power = next.max(0.0) as u32;
            }
            PropRef::SkillAccuracy => {
                let ctx = skill_ctx_mut(parent)?;
                let next = match mode {
                    WriteMode::Set => value,
                    WriteMode::Add => ctx.accuracy + value,
                };
                ctx.accuracy = next.clamp(0.0, 100.0);
            }
            PropRef::SkillPriority => {
                let ctx = skill_ctx_mut(parent)?;
                let next = match mode {
                    WriteMode::Set => value,
                    WriteMode::Add => ctx.priority as f64 + value,
                };
                ctx.priority = next as i32;
            }
            PropRef::DamageValue => {
                let ParentCtx::Damage { damage, .. } = parent else {
                    return Err(ActionError::MissingContext("damage"));
                };
                let next = match mode {
                    WriteMode::Set => value,
                    WriteMode::Add => damage.value + value,
                };
                damage.value = next.max(0.0);
            }
            PropRef::PetStunned(_) => {
                return Err(ActionError::Unsupported("numeric write to boolean property"));
            }
        }
    }
    Ok(())
}

fn skill_ctx_mut<'a, 'b>(
    parent: &'a mut ParentCtx<'b>,
) -> Result<&'a mut crate::context::SkillCtx, ActionError> {
    match parent {
        ParentCtx::Skill(ctx) => Ok(ctx),
        _ => Err(ActionError::MissingContext("skill use")),
    }
}

fn add_mark_ctx<'a, 'b>(
    parent: &'a mut ParentCtx<'b>,
) -> Result<&'a mut crate::context::AddMarkCtx, ActionError> {
    match parent {
        ParentCtx::AddMark(ctx) => Ok(ctx),
        _ => Err(ActionError::MissingContext("mark application")),
    }
}

fn resolve_pets(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    target: &SelectorIr,
) -> Result<Vec<PetId>, ActionError> {
    let selection = selector::eval_selector(battle, source, parent, target)?;
    Ok(selection.pets()?.clone())
}

fn optional_number(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    value: &Option<ValueIr>,
) -> Result<f64, ActionError> {
    match value {
        Some(v) => selector::eval_number(battle, source, parent, v),
        None => Ok(0.0),
    }
}

fn add_modifiers(
    battle: &mut Battle,
    source: &EffectSource,
    pets: &[PetId],
    stat: BattleStat,
    op: ModifierOp,
    priority: i32,
) {
    let from_mark = match source {
        EffectSource::Mark { mark, .. } => Some(mark.clone()),
        _ => None,
    };
    for pet in pets {
        battle.add_attribute_modifier(
            pet,
            AttributeModifier {
                stat,
                op,
                priority,
                source: from_mark.clone(),
            },
        );
    }
}

fn first_pet(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    target: &SelectorIr,
) -> Result<PetId, ActionError> {
    resolve_pets(battle, source, parent, target)?
        .into_iter()
        .next()
        .ok_or(ActionError::EmptySelection)
}

fn resolve_marks(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    target: &SelectorIr,
) -> Result<Vec<tamer_protocol::MarkId>, ActionError> {
    let selection = selector::eval_selector(battle, source, parent, target)?;
    Ok(selection.marks()?.clone())
}

fn effect_damage_source(source: &EffectSource) -> DamageSource {
    match source {
        EffectSource::Skill { owner, .. } => DamageSource::Pet(owner.clone()),
        EffectSource::Mark { mark, .. } => DamageSource::Mark(mark.clone()),
    }
}
