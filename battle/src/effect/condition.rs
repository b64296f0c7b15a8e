//! Conditions: boolean gates run before an effect's operators.

use crate::battle::Battle;
use crate::context::{EffectSource, ParentCtx};
use crate::effect::evaluator::{self, EvaluatorIr};
use crate::effect::selector::{self, SelectorIr};
use crate::effect::value::ActionError;

/// How a consecutive-use requirement fires once reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousStrategy {
    /// Every multiple of the required count
    Periodic,
    /// Exactly on the required count
    Once,
    /// The required count and every use after it
    Continuous,
}

/// Direction filter for stat stage change triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDirection {
    Up,
    Down,
    All,
}

#[derive(Debug, Clone)]
pub enum ConditionIr {
    /// Resolve a selector and test it with an evaluator
    Evaluate {
        target: SelectorIr,
        evaluator: EvaluatorIr,
    },
    /// The effect's own pet is the one using the skill in flight
    SelfUseSkill,
    /// The opposing active pet is using the skill in flight
    FoeUseSkill,
    /// The damage in flight lands on the effect's own pet
    SelfBeDamaged,
    /// The mark in flight was applied by the effect's own pet
    SelfAddMark,
    FoeAddMark,
    /// The mark in flight lands on the effect's own pet
    SelfBeAddMark,
    FoeBeAddMark,
    ContinuousUseSkill {
        times: u32,
        strategy: ContinuousStrategy,
    },
    StatStageChange {
        direction: StageDirection,
    },
    IsFirstSkillUsedThisTurn,
    IsLastSkillUsedThisTurn,
    /// The effect's own pet is on the field
    PetIsActive,
    SomeOf(Vec<ConditionIr>),
    EveryOf(Vec<ConditionIr>),
    Not(Box<ConditionIr>),
}

pub fn eval_condition(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    cond: &ConditionIr,
) -> Result<bool, ActionError> {
    match cond {
        ConditionIr::Evaluate { target, evaluator } => {
            let value = selector::eval_selector(battle, source, parent, target)?;
            evaluator::eval_set(battle, source, parent, &value, evaluator)
        }
        ConditionIr::SelfUseSkill => {
            let Some(ctx) = parent.skill_ctx() else {
                return Ok(false);
            };
            Ok(source.owner_pet() == Some(&ctx.user))
        }
        ConditionIr::FoeUseSkill => {
            let Some(ctx) = parent.skill_ctx() else {
                return Ok(false);
            };
            let Some(me) = source.owner_pet() else {
                return Ok(false);
            };
            let owner = battle.owner_of(me)?;
            let foe = battle.opponent_active_pet(&owner)?;
            Ok(ctx.user == foe)
        }
        ConditionIr::SelfBeDamaged => {
            let Some(ctx) = parent.damage_ctx() else {
                return Ok(false);
            };
            Ok(source.owner_pet() == Some(&ctx.target))
        }
        ConditionIr::SelfAddMark | ConditionIr::FoeAddMark => {
            let ParentCtx::AddMark(ctx) = parent else {
                return Ok(false);
            };
            let Some(applier) = &ctx.applier else {
                return Ok(false);
            };
            let Some(me) = source.owner_pet() else {
                return Ok(false);
            };
            if matches!(cond, ConditionIr::SelfAddMark) {
                Ok(applier == me)
            } else {
                let owner = battle.owner_of(me)?;
                let foe = battle.opponent_active_pet(&owner)?;
                Ok(*applier == foe)
            }
        }
        ConditionIr::SelfBeAddMark | ConditionIr::FoeBeAddMark => {
            let ParentCtx::AddMark(ctx) = parent else {
                return Ok(false);
            };
            let Some(me) = source.owner_pet() else {
                return Ok(false);
            };
            if matches!(cond, ConditionIr::SelfBeAddMark) {
                Ok(&ctx.target == me)
            } else {
                let owner = battle.owner_of(me)?;
                let foe = battle.opponent_active_pet(&owner)?;
                Ok(ctx.target == foe)
            }
        }
        ConditionIr::ContinuousUseSkill { times, strategy } => {
            let Some(ctx) = parent.skill_ctx() else {
                return Ok(false);
            };
            if source.owner_pet() != Some(&ctx.user) {
                return Ok(false);
            }
            let pet = battle
                .pet(&ctx.user)
                .ok_or_else(|| ActionError::UnknownEntity(ctx.user.to_string()))?;
            let Some((base, count)) = &pet.skill_streak else {
                return Ok(false);
            };
            if base != &ctx.base {
                return Ok(false);
            }
            let times = (*times).max(1);
            Ok(match strategy {
                ContinuousStrategy::Periodic => *count > 0 && count % times == 0,
                ContinuousStrategy::Once => *count == times,
                ContinuousStrategy::Continuous => *count >= times,
            })
        }
        ConditionIr::StatStageChange { direction } => {
            let ParentCtx::StatStage { delta, .. } = parent else {
                return Ok(false);
            };
            Ok(match direction {
                StageDirection::Up => *delta > 0,
                StageDirection::Down => *delta < 0,
                StageDirection::All => *delta != 0,
            })
        }
        ConditionIr::IsFirstSkillUsedThisTurn => {
            Ok(parent.skill_ctx().is_some_and(|ctx| ctx.first_of_turn))
        }
        ConditionIr::IsLastSkillUsedThisTurn => {
            Ok(parent.skill_ctx().is_some_and(|ctx| ctx.last_of_turn))
        }
        ConditionIr::PetIsActive => {
            let Some(me) = source.owner_pet() else {
                return Ok(false);
            };
            let owner = battle.owner_of(me)?;
            let player = battle.player_by_id(&owner)?;
            Ok(&player.active_pet().id == me)
        }
        ConditionIr::SomeOf(parts) => {
            for part in parts {
                if eval_condition(battle, source, parent, part)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConditionIr::EveryOf(parts) => {
            for part in parts {
                if !eval_condition(battle, source, parent, part)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionIr::Not(inner) => Ok(!eval_condition(battle, source, parent, inner)?),
    }
}
