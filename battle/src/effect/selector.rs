//! Selector evaluation: resolve a base set, then refine it through a
//! chain of steps.

use crate::battle::Battle;
use crate::context::{EffectSource, ParentCtx};
use crate::effect::evaluator::{self, EvaluatorIr};
use crate::effect::value::{ActionError, Extractor, PropRef, RuntimeVal, ValueIr};

/// Starting set of a selector chain
#[derive(Debug, Clone, PartialEq)]
pub enum BaseSelectorIr {
    /// The action's target (skill target or damage target)
    Target,
    /// The pet carrying the running effect
    SelfPet,
    /// The opposing active pet
    Foe,
    /// The owning player
    PetOwners,
    /// The opposing player
    FoeOwners,
    /// The skill-use context in flight
    UsingSkillContext,
    /// The damage context in flight
    DamageContext,
    /// The mark carrying the running effect
    Mark,
    SelfMarks,
    FoeMarks,
    AllPetsOnField,
}

/// Property names selectable for write-through access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropName {
    Hp,
    Stunned,
    Stack,
    Duration,
    Power,
    Accuracy,
    Priority,
    DamageValue,
}

/// One refinement step in a selector chain
#[derive(Debug, Clone)]
pub enum ChainStep {
    Select(Extractor),
    SelectProp(PropName),
    Where(EvaluatorIr),
    WhereAttr {
        extract: Extractor,
        eval: EvaluatorIr,
    },
    /// Intersect with another selection
    And(Box<SelectorIr>),
    /// Append another selection; `duplicate` keeps repeats
    Or {
        other: Box<SelectorIr>,
        duplicate: bool,
    },
    RandomPick(u32),
    /// Keep each element independently with the given percent chance
    RandomSample(ValueIr),
    Sum,
    Add(ValueIr),
    Multiply(ValueIr),
    Divide(ValueIr),
    Shuffled,
    ClampMax(ValueIr),
    ClampMin(ValueIr),
    /// Replace the selection with its element count
    Length,
}

#[derive(Debug, Clone)]
pub enum SelectorIr {
    Chain {
        base: BaseSelectorIr,
        chain: Vec<ChainStep>,
    },
    /// Pick one of two selectors at evaluation time; no else branch
    /// resolves to an empty selection
    Conditional {
        condition: Box<crate::effect::condition::ConditionIr>,
        then_sel: Box<SelectorIr>,
        else_sel: Option<Box<SelectorIr>>,
    },
}

impl SelectorIr {
    pub fn base(base: BaseSelectorIr) -> Self {
        Self::Chain {
            base,
            chain: Vec::new(),
        }
    }

    pub fn step(mut self, step: ChainStep) -> Self {
        if let SelectorIr::Chain { chain, .. } = &mut self {
            chain.push(step);
        }
        self
    }
}

pub fn eval_selector(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    sel: &SelectorIr,
) -> Result<RuntimeVal, ActionError> {
    match sel {
        SelectorIr::Chain { base, chain } => {
            let mut value = eval_base(battle, source, parent, base)?;
            for step in chain {
                value = apply_step(battle, source, parent, value, step)?;
            }
            Ok(value)
        }
        SelectorIr::Conditional {
            condition,
            then_sel,
            else_sel,
        } => {
            if crate::effect::condition::eval_condition(battle, source, parent, condition)? {
                eval_selector(battle, source, parent, then_sel)
            } else if let Some(else_sel) = else_sel {
                eval_selector(battle, source, parent, else_sel)
            } else {
                Ok(RuntimeVal::Pets(Vec::new()))
            }
        }
    }
}

/// Resolve a value expression to a runtime selection
pub fn eval_value(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    value: &ValueIr,
) -> Result<RuntimeVal, ActionError> {
    match value {
        ValueIr::Number(n) => Ok(RuntimeVal::Numbers(vec![*n])),
        ValueIr::Str(s) => Ok(RuntimeVal::Strings(vec![s.clone()])),
        ValueIr::Bool(b) => Ok(RuntimeVal::Bools(vec![*b])),
        ValueIr::BaseMark(id) => Ok(RuntimeVal::Strings(vec![id.to_string()])),
        ValueIr::Element(e) => Ok(RuntimeVal::Elements(vec![*e])),
        ValueIr::Dynamic(sel) => eval_selector(battle, source, parent, sel),
        ValueIr::Conditional {
            condition,
            then_value,
            else_value,
        } => {
            if crate::effect::condition::eval_condition(battle, source, parent, condition)? {
                eval_value(battle, source, parent, then_value)
            } else if let Some(else_value) = else_value {
                eval_value(battle, source, parent, else_value)
            } else {
                Ok(RuntimeVal::Numbers(Vec::new()))
            }
        }
        ValueIr::List(items) => {
            let mut items = items.iter();
            let Some(first) = items.next() else {
                return Ok(RuntimeVal::Numbers(Vec::new()));
            };
            let mut value = eval_value(battle, source, parent, first)?;
            for item in items {
                let next = eval_value(battle, source, parent, item)?;
                value.union(next, true)?;
            }
            Ok(value)
        }
    }
}

/// Resolve a value expression to a single number
pub fn eval_number(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    value: &ValueIr,
) -> Result<f64, ActionError> {
    eval_value(battle, source, parent, value)?.first_number()
}

fn self_pet(battle: &Battle, source: &EffectSource) -> Result<tamer_protocol::PetId, ActionError> {
    source
        .owner_pet()
        .cloned()
        .or_else(|| match source {
            EffectSource::Mark { mark, .. } => battle.mark_owner_pet(mark),
            _ => None,
        })
        .ok_or(ActionError::MissingContext("self pet"))
}

fn eval_base(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    base: &BaseSelectorIr,
) -> Result<RuntimeVal, ActionError> {
    match base {
        BaseSelectorIr::Target => {
            if let Some(damage) = parent.damage_ctx() {
                return Ok(RuntimeVal::Pets(vec![damage.target.clone()]));
            }
            if let Some(skill) = parent.skill_ctx() {
                if let Some(target) = &skill.actual_target {
                    return Ok(RuntimeVal::Pets(vec![target.clone()]));
                }
            }
            if let ParentCtx::AddMark(ctx) = parent {
                return Ok(RuntimeVal::Pets(vec![ctx.target.clone()]));
            }
            if let ParentCtx::Heal(ctx) = parent {
                return Ok(RuntimeVal::Pets(vec![ctx.target.clone()]));
            }
            Ok(RuntimeVal::Pets(Vec::new()))
        }
        BaseSelectorIr::SelfPet => Ok(RuntimeVal::Pets(vec![self_pet(battle, source)?])),
        BaseSelectorIr::Foe => {
            let me = self_pet(battle, source)?;
            let owner = battle.owner_of(&me)?;
            let foe = battle.opponent_active_pet(&owner)?;
            Ok(RuntimeVal::Pets(vec![foe]))
        }
        BaseSelectorIr::PetOwners => {
            let me = self_pet(battle, source)?;
            Ok(RuntimeVal::Players(vec![battle.owner_of(&me)?]))
        }
        BaseSelectorIr::FoeOwners => {
            let me = self_pet(battle, source)?;
            let owner = battle.owner_of(&me)?;
            Ok(RuntimeVal::Players(vec![battle.opponent_id(&owner)?]))
        }
        BaseSelectorIr::UsingSkillContext => {
            Ok(RuntimeVal::SkillUses(parent.skill_ctx().is_some() as usize))
        }
        BaseSelectorIr::DamageContext => {
            Ok(RuntimeVal::Damages(parent.damage_ctx().is_some() as usize))
        }
        BaseSelectorIr::Mark => match source {
            EffectSource::Mark { mark, .. } => Ok(RuntimeVal::Marks(vec![mark.clone()])),
            _ => Ok(RuntimeVal::Marks(Vec::new())),
        },
        BaseSelectorIr::SelfMarks => {
            let me = self_pet(battle, source)?;
            Ok(RuntimeVal::Marks(battle.marks_on(&me)))
        }
        BaseSelectorIr::FoeMarks => {
            let me = self_pet(battle, source)?;
            let owner = battle.owner_of(&me)?;
            let foe = battle.opponent_active_pet(&owner)?;
            Ok(RuntimeVal::Marks(battle.marks_on(&foe)))
        }
        BaseSelectorIr::AllPetsOnField => Ok(RuntimeVal::Pets(battle.active_pet_ids())),
    }
}

fn apply_step(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    mut value: RuntimeVal,
    step: &ChainStep,
) -> Result<RuntimeVal, ActionError> {
    match step {
        ChainStep::Select(extract) => apply_extractor(battle, parent, &value, extract),
        ChainStep::SelectProp(prop) => apply_prop(&value, *prop),
        ChainStep::Where(eval) => {
            let keep = evaluator::filter_indices(battle, source, parent, &value, eval)?;
            value.retain_indices(&keep);
            Ok(value)
        }
        ChainStep::WhereAttr { extract, eval } => {
            let attrs = apply_extractor(battle, parent, &value, extract)?;
            let keep = evaluator::filter_indices(battle, source, parent, &attrs, eval)?;
            value.retain_indices(&keep);
            Ok(value)
        }
        ChainStep::And(other) => {
            let other = eval_selector(battle, source, parent, other)?;
            intersect(value, other)
        }
        ChainStep::Or { other, duplicate } => {
            let other = eval_selector(battle, source, parent, other)?;
            value.union(other, *duplicate)?;
            Ok(value)
        }
        ChainStep::RandomPick(count) => {
            value.random_pick(&mut battle.rng, *count as usize);
            Ok(value)
        }
        ChainStep::RandomSample(percent) => {
            let percent = eval_number(battle, source, parent, percent)?;
            let mut keep = Vec::new();
            for i in 0..value.len() {
                if battle.rng.chance(percent) {
                    keep.push(i);
                }
            }
            value.retain_indices(&keep);
            Ok(value)
        }
        ChainStep::Sum => {
            let total: f64 = value.numbers()?.iter().sum();
            Ok(RuntimeVal::Numbers(vec![total]))
        }
        ChainStep::Add(v) => arith(battle, source, parent, value, v, |a, b| Ok(a + b)),
        ChainStep::Multiply(v) => arith(battle, source, parent, value, v, |a, b| Ok(a * b)),
        ChainStep::Divide(v) => arith(battle, source, parent, value, v, |a, b| {
            if b == 0.0 {
                Err(ActionError::DivideByZero)
            } else {
                Ok(a / b)
            }
        }),
        ChainStep::Shuffled => {
            value.shuffle(&mut battle.rng);
            Ok(value)
        }
        ChainStep::ClampMax(v) => arith(battle, source, parent, value, v, |a, b| Ok(a.min(b))),
        ChainStep::ClampMin(v) => arith(battle, source, parent, value, v, |a, b| Ok(a.max(b))),
        ChainStep::Length => Ok(RuntimeVal::Numbers(vec![value.len() as f64])),
    }
}

fn arith(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    mut value: RuntimeVal,
    operand: &ValueIr,
    op: impl Fn(f64, f64) -> Result<f64, ActionError>,
) -> Result<RuntimeVal, ActionError> {
    let operand = eval_number(battle, source, parent, operand)?;
    for n in value.numbers_mut()? {
        *n = op(*n, operand)?;
    }
    Ok(value)
}

fn intersect(value: RuntimeVal, other: RuntimeVal) -> Result<RuntimeVal, ActionError> {
    fn keep<T: PartialEq>(a: Vec<T>, b: &[T]) -> Vec<T> {
        a.into_iter().filter(|x| b.contains(x)).collect()
    }
    match (value, other) {
        (RuntimeVal::Pets(a), RuntimeVal::Pets(b)) => Ok(RuntimeVal::Pets(keep(a, &b))),
        (RuntimeVal::Players(a), RuntimeVal::Players(b)) => Ok(RuntimeVal::Players(keep(a, &b))),
        (RuntimeVal::Marks(a), RuntimeVal::Marks(b)) => Ok(RuntimeVal::Marks(keep(a, &b))),
        (RuntimeVal::Strings(a), RuntimeVal::Strings(b)) => Ok(RuntimeVal::Strings(keep(a, &b))),
        (a, b) => Err(ActionError::KindMismatch {
            expected: a.kind_name(),
            got: b.kind_name(),
        }),
    }
}

fn apply_prop(value: &RuntimeVal, prop: PropName) -> Result<RuntimeVal, ActionError> {
    let props = match (value, prop) {
        (RuntimeVal::Pets(pets), PropName::Hp) => {
            pets.iter().map(|p| PropRef::PetHp(p.clone())).collect()
        }
        (RuntimeVal::Pets(pets), PropName::Stunned) => {
            pets.iter().map(|p| PropRef::PetStunned(p.clone())).collect()
        }
        (RuntimeVal::Marks(marks), PropName::Stack) => {
            marks.iter().map(|m| PropRef::MarkStack(m.clone())).collect()
        }
        (RuntimeVal::Marks(marks), PropName::Duration) => marks
            .iter()
            .map(|m| PropRef::MarkDuration(m.clone()))
            .collect(),
        (RuntimeVal::SkillUses(n), PropName::Power) => vec![PropRef::SkillPower; *n],
        (RuntimeVal::SkillUses(n), PropName::Accuracy) => vec![PropRef::SkillAccuracy; *n],
        (RuntimeVal::SkillUses(n), PropName::Priority) => vec![PropRef::SkillPriority; *n],
        (RuntimeVal::Damages(n), PropName::DamageValue) => vec![PropRef::DamageValue; *n],
        (other, _) => {
            return Err(ActionError::KindMismatch {
                expected: "selectable property",
                got: other.kind_name(),
            });
        }
    };
    Ok(RuntimeVal::Props(props))
}

fn apply_extractor(
    battle: &Battle,
    parent: &ParentCtx<'_>,
    value: &RuntimeVal,
    extract: &Extractor,
) -> Result<RuntimeVal, ActionError> {
    match (value, extract) {
        (RuntimeVal::Pets(pets), extract) => {
            let mut hp = Vec::new();
            let mut max_hp = Vec::new();
            let mut level = Vec::new();
            let mut element = Vec::new();
            let mut ids = Vec::new();
            let mut marks = Vec::new();
            let mut owners = Vec::new();
            let mut stats = Vec::new();
            let mut rage = Vec::new();
            for id in pets {
                let pet = battle
                    .pet(id)
                    .ok_or_else(|| ActionError::UnknownEntity(id.to_string()))?;
                match extract {
                    Extractor::Hp => hp.push(pet.current_hp as f64),
                    Extractor::MaxHp => max_hp.push(pet.stats.max_hp as f64),
                    Extractor::Level => level.push(pet.level as f64),
                    Extractor::PetElement => element.push(pet.element),
                    Extractor::PetId => ids.push(pet.id.to_string()),
                    Extractor::Marks => {
                        marks.extend(pet.marks.iter().filter(|m| m.active).map(|m| m.id.clone()));
                    }
                    Extractor::Owner => owners.push(pet.owner.clone()),
                    Extractor::Stat(stat) => stats.push(pet.effective_stat(*stat)),
                    Extractor::Rage => {
                        let player = battle.player_by_id(&pet.owner)?;
                        rage.push(player.rage as f64);
                    }
                    other => {
                        return Err(unsupported_extractor(other));
                    }
                }
            }
            Ok(match extract {
                Extractor::Hp => RuntimeVal::Numbers(hp),
                Extractor::MaxHp => RuntimeVal::Numbers(max_hp),
                Extractor::Level => RuntimeVal::Numbers(level),
                Extractor::PetElement => RuntimeVal::Elements(element),
                Extractor::PetId => RuntimeVal::Strings(ids),
                Extractor::Marks => RuntimeVal::Marks(marks),
                Extractor::Owner => RuntimeVal::Players(owners),
                Extractor::Stat(_) => RuntimeVal::Numbers(stats),
                Extractor::Rage => RuntimeVal::Numbers(rage),
                other => return Err(unsupported_extractor(other)),
            })
        }
        (RuntimeVal::Players(players), Extractor::ActivePet) => {
            let mut pets = Vec::new();
            for id in players {
                pets.push(battle.player_by_id(id)?.active_pet().id.clone());
            }
            Ok(RuntimeVal::Pets(pets))
        }
        (RuntimeVal::Players(players), Extractor::Rage) => {
            let mut rage = Vec::new();
            for id in players {
                rage.push(battle.player_by_id(id)?.rage as f64);
            }
            Ok(RuntimeVal::Numbers(rage))
        }
        (RuntimeVal::Marks(marks), extract) => {
            let mut stacks = Vec::new();
            let mut durations = Vec::new();
            let mut bases = Vec::new();
            let mut tags = Vec::new();
            for id in marks {
                let mark = battle
                    .mark(id)
                    .ok_or_else(|| ActionError::UnknownEntity(id.to_string()))?;
                match extract {
                    Extractor::Stack => stacks.push(mark.stack as f64),
                    Extractor::Duration => durations.push(mark.duration as f64),
                    Extractor::BaseId => bases.push(mark.base.to_string()),
                    Extractor::Tags => tags.extend(mark.tags.iter().cloned()),
                    other => return Err(unsupported_extractor(other)),
                }
            }
            Ok(match extract {
                Extractor::Stack => RuntimeVal::Numbers(stacks),
                Extractor::Duration => RuntimeVal::Numbers(durations),
                Extractor::BaseId => RuntimeVal::Strings(bases),
                Extractor::Tags => RuntimeVal::Strings(tags),
                other => return Err(unsupported_extractor(other)),
            })
        }
        (RuntimeVal::SkillUses(n), extract) => {
            let ctx = parent
                .skill_ctx()
                .ok_or(ActionError::MissingContext("skill use"))?;
            if *n == 0 {
                return Ok(RuntimeVal::Numbers(Vec::new()));
            }
            Ok(match extract {
                Extractor::Power => RuntimeVal::Numbers(vec![ctx.power as f64]),
                Extractor::Priority => RuntimeVal::Numbers(vec![ctx.priority as f64]),
                Extractor::Accuracy => RuntimeVal::Numbers(vec![ctx.accuracy]),
                Extractor::RageCost => RuntimeVal::Numbers(vec![ctx.rage_cost as f64]),
                Extractor::SkillElement => RuntimeVal::Elements(vec![ctx.element]),
                other => return Err(unsupported_extractor(other)),
            })
        }
        (RuntimeVal::Damages(n), Extractor::DamageValue) => {
            let ctx = parent
                .damage_ctx()
                .ok_or(ActionError::MissingContext("damage"))?;
            if *n == 0 {
                return Ok(RuntimeVal::Numbers(Vec::new()));
            }
            Ok(RuntimeVal::Numbers(vec![ctx.value]))
        }
        (other, extract) => Err(ActionError::KindMismatch {
            expected: extractor_domain(extract),
            got: other.kind_name(),
        }),
    }
}

fn unsupported_extractor(extract: &Extractor) -> ActionError {
    ActionError::KindMismatch {
        expected: extractor_domain(extract),
        got: "other",
    }
}

fn extractor_domain(extract: &Extractor) -> &'static str {
    match extract {
        Extractor::Hp
        | Extractor::MaxHp
        | Extractor::Level
        | Extractor::PetElement
        | Extractor::PetId
        | Extractor::Marks
        | Extractor::Owner
        | Extractor::Stat(_) => "pet",
        Extractor::ActivePet | Extractor::Rage => "player",
        Extractor::Stack | Extractor::Duration | Extractor::BaseId | Extractor::Tags => "mark",
        Extractor::Power
        | Extractor::Priority
        | Extractor::Accuracy
        | Extractor::RageCost
        | Extractor::SkillElement => "skill-use",
        Extractor::DamageValue => "damage",
    }
}
