//! Lowering from document shapes to the engine's executable IR.
//!
//! The compiler walks each selector chain carrying the [`ValueKind`] the
//! chain produces so far, so every field access, arithmetic step, and
//! operator target is checked before a battle ever runs the effect.
//! Anything that would fail at runtime for shape reasons fails here
//! instead; only data-dependent failures (empty selections, division by
//! a runtime zero) are left to the engine.

use tamer_battle::effect::condition::{ConditionIr, ContinuousStrategy, StageDirection};
use tamer_battle::effect::evaluator::{CompareOp, EvaluatorIr};
use tamer_battle::effect::operator::OperatorIr;
use tamer_battle::effect::selector::{BaseSelectorIr, ChainStep, PropName, SelectorIr};
use tamer_battle::effect::value::{Extractor, ValueIr};
use tamer_battle::Effect;
use tamer_protocol::{BaseMarkId, BattleStat, EffectId, SpeciesId};

use crate::doc::{
    ConditionDoc, ContinuousStrategyDoc, EffectDoc, EvaluatorDoc, OperatorDoc, SelectorDoc,
    StageDirectionDoc, StepDoc, TaggedValueDoc, ValueDoc,
};
use crate::error::CompileError;

/// What kind of selection a chain produces at a given point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Pet,
    Player,
    Mark,
    SkillUse,
    Damage,
    Number,
    Str,
    Bool,
    Element,
    Prop,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Pet => "pet",
            ValueKind::Player => "player",
            ValueKind::Mark => "mark",
            ValueKind::SkillUse => "skill-use",
            ValueKind::Damage => "damage",
            ValueKind::Number => "number",
            ValueKind::Str => "string",
            ValueKind::Bool => "boolean",
            ValueKind::Element => "element",
            ValueKind::Prop => "prop",
        }
    }
}

/// Compile one authored effect into an executable [`Effect`]
pub fn compile_effect(doc: &EffectDoc) -> Result<Effect, CompileError> {
    let condition = match &doc.condition {
        Some(cond) => Some(compile_condition(cond)?),
        None => None,
    };
    let mut ops = Vec::new();
    for op in doc.apply.iter() {
        ops.push(compile_operator(op)?);
    }
    Ok(Effect {
        id: EffectId::new(&*doc.id),
        trigger: doc.trigger,
        priority: doc.priority,
        condition,
        ops,
        consumes_stacks: doc.consumes_stacks,
    })
}

pub fn compile_selector(doc: &SelectorDoc) -> Result<(SelectorIr, ValueKind), CompileError> {
    let (base_name, steps): (&str, &[StepDoc]) = match doc {
        SelectorDoc::Base(name) => (name, &[]),
        SelectorDoc::Chained { base, chain } => (base, chain),
        SelectorDoc::Conditional {
            condition,
            true_selector,
            false_selector,
        } => {
            let condition = compile_condition(condition)?;
            let (then_sel, then_kind) = compile_selector(true_selector)?;
            let else_sel = match false_selector {
                Some(doc) => {
                    let (sel, else_kind) = compile_selector(doc)?;
                    if else_kind != then_kind {
                        return Err(CompileError::BranchKindMismatch {
                            then: then_kind.name(),
                            otherwise: else_kind.name(),
                        });
                    }
                    Some(Box::new(sel))
                }
                None => None,
            };
            return Ok((
                SelectorIr::Conditional {
                    condition: Box::new(condition),
                    then_sel: Box::new(then_sel),
                    else_sel,
                },
                then_kind,
            ));
        }
    };
    let (base, mut kind) = compile_base(base_name)?;
    let mut selector = SelectorIr::base(base);
    for step in steps {
        let (chain_steps, next) = compile_step(step, kind)?;
        for chain_step in chain_steps {
            selector = selector.step(chain_step);
        }
        kind = next;
    }
    Ok((selector, kind))
}

fn compile_base(name: &str) -> Result<(BaseSelectorIr, ValueKind), CompileError> {
    Ok(match name {
        "target" => (BaseSelectorIr::Target, ValueKind::Pet),
        "self" => (BaseSelectorIr::SelfPet, ValueKind::Pet),
        "foe" => (BaseSelectorIr::Foe, ValueKind::Pet),
        "allPetsOnField" => (BaseSelectorIr::AllPetsOnField, ValueKind::Pet),
        "petOwners" => (BaseSelectorIr::PetOwners, ValueKind::Player),
        "foeOwners" => (BaseSelectorIr::FoeOwners, ValueKind::Player),
        "usingSkillContext" => (BaseSelectorIr::UsingSkillContext, ValueKind::SkillUse),
        "damageContext" => (BaseSelectorIr::DamageContext, ValueKind::Damage),
        "mark" => (BaseSelectorIr::Mark, ValueKind::Mark),
        "selfMarks" => (BaseSelectorIr::SelfMarks, ValueKind::Mark),
        "foeMarks" => (BaseSelectorIr::FoeMarks, ValueKind::Mark),
        other => return Err(CompileError::UnknownBaseSelector(other.to_string())),
    })
}

/// Lower one step. `flat` compiles to nothing (selections are already
/// flat at runtime) and `selectPath` expands to one select per segment.
fn compile_step(
    step: &StepDoc,
    kind: ValueKind,
) -> Result<(Vec<ChainStep>, ValueKind), CompileError> {
    Ok(match step {
        StepDoc::Select { arg } => {
            let (extract, next) = field_lookup(kind, arg)?;
            (vec![ChainStep::Select(extract)], next)
        }
        StepDoc::SelectPath { arg } => return compile_path(arg, kind),
        StepDoc::SelectProp { arg } => {
            let prop = prop_lookup(kind, arg)?;
            (vec![ChainStep::SelectProp(prop)], ValueKind::Prop)
        }
        StepDoc::Where { arg } => {
            let eval = compile_evaluator(arg, kind)?;
            (vec![ChainStep::Where(eval)], kind)
        }
        StepDoc::WhereAttr {
            extractor,
            evaluator,
        } => {
            let (extract, attr_kind) = field_lookup(kind, extractor)?;
            let eval = compile_evaluator(evaluator, attr_kind)?;
            (vec![ChainStep::WhereAttr { extract, eval }], kind)
        }
        StepDoc::And { arg } => {
            let (other, other_kind) = compile_selector(arg)?;
            require_kind("and", kind, other_kind)?;
            (vec![ChainStep::And(Box::new(other))], kind)
        }
        StepDoc::Or { arg, duplicate } => {
            let (other, other_kind) = compile_selector(arg)?;
            require_kind("or", kind, other_kind)?;
            (
                vec![ChainStep::Or {
                    other: Box::new(other),
                    duplicate: *duplicate,
                }],
                kind,
            )
        }
        StepDoc::RandomPick { arg } => (vec![ChainStep::RandomPick(*arg)], kind),
        StepDoc::RandomSample { arg } => {
            let percent = number_value("randomSample", arg)?;
            (vec![ChainStep::RandomSample(percent)], kind)
        }
        StepDoc::Sum => {
            require_numeric("sum", kind)?;
            (vec![ChainStep::Sum], ValueKind::Number)
        }
        StepDoc::Add { arg } => arith_step("add", kind, arg, ChainStep::Add)?,
        StepDoc::Multiply { arg } => arith_step("multiply", kind, arg, ChainStep::Multiply)?,
        StepDoc::Divide { arg } => arith_step("divide", kind, arg, ChainStep::Divide)?,
        StepDoc::Shuffled => (vec![ChainStep::Shuffled], kind),
        StepDoc::ClampMax { arg } => arith_step("clampMax", kind, arg, ChainStep::ClampMax)?,
        StepDoc::ClampMin { arg } => arith_step("clampMin", kind, arg, ChainStep::ClampMin)?,
        StepDoc::Flat => (Vec::new(), kind),
        StepDoc::Length => (vec![ChainStep::Length], ValueKind::Number),
    })
}

fn arith_step(
    name: &'static str,
    kind: ValueKind,
    arg: &ValueDoc,
    build: impl FnOnce(ValueIr) -> ChainStep,
) -> Result<(Vec<ChainStep>, ValueKind), CompileError> {
    require_numeric(name, kind)?;
    let operand = number_value(name, arg)?;
    Ok((vec![build(operand)], ValueKind::Number))
}

fn compile_path(
    path: &str,
    mut kind: ValueKind,
) -> Result<(Vec<ChainStep>, ValueKind), CompileError> {
    let mut steps = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (extract, next) = field_lookup(kind, segment)?;
        steps.push(ChainStep::Select(extract));
        kind = next;
    }
    Ok((steps, kind))
}

fn require_numeric(step: &'static str, kind: ValueKind) -> Result<(), CompileError> {
    if kind == ValueKind::Number {
        Ok(())
    } else {
        Err(CompileError::NonNumericArithmetic(step))
    }
}

fn require_kind(
    step: &'static str,
    expected: ValueKind,
    got: ValueKind,
) -> Result<(), CompileError> {
    if expected == got {
        Ok(())
    } else {
        Err(CompileError::KindMismatch {
            step,
            expected: expected.name(),
            got: got.name(),
        })
    }
}

fn field_lookup(kind: ValueKind, field: &str) -> Result<(Extractor, ValueKind), CompileError> {
    let entry = match (kind, field) {
        (ValueKind::Pet, "hp" | "currentHp") => (Extractor::Hp, ValueKind::Number),
        (ValueKind::Pet, "maxHp") => (Extractor::MaxHp, ValueKind::Number),
        (ValueKind::Pet, "level") => (Extractor::Level, ValueKind::Number),
        (ValueKind::Pet, "element") => (Extractor::PetElement, ValueKind::Element),
        (ValueKind::Pet, "id") => (Extractor::PetId, ValueKind::Str),
        (ValueKind::Pet, "marks") => (Extractor::Marks, ValueKind::Mark),
        (ValueKind::Pet, "owner") => (Extractor::Owner, ValueKind::Player),
        (ValueKind::Pet, "rage") => (Extractor::Rage, ValueKind::Number),
        (ValueKind::Pet, "atk") => (Extractor::Stat(BattleStat::Atk), ValueKind::Number),
        (ValueKind::Pet, "def") => (Extractor::Stat(BattleStat::Def), ValueKind::Number),
        (ValueKind::Pet, "spa") => (Extractor::Stat(BattleStat::Spa), ValueKind::Number),
        (ValueKind::Pet, "spd") => (Extractor::Stat(BattleStat::Spd), ValueKind::Number),
        (ValueKind::Pet, "spe") => (Extractor::Stat(BattleStat::Spe), ValueKind::Number),
        (ValueKind::Pet, "accuracy") => {
            (Extractor::Stat(BattleStat::Accuracy), ValueKind::Number)
        }
        (ValueKind::Pet, "evasion") => (Extractor::Stat(BattleStat::Evasion), ValueKind::Number),
        (ValueKind::Pet, "critRate") => {
            (Extractor::Stat(BattleStat::CritRate), ValueKind::Number)
        }
        (ValueKind::Player, "activePet") => (Extractor::ActivePet, ValueKind::Pet),
        (ValueKind::Player, "rage") => (Extractor::Rage, ValueKind::Number),
        (ValueKind::Mark, "stack") => (Extractor::Stack, ValueKind::Number),
        (ValueKind::Mark, "duration") => (Extractor::Duration, ValueKind::Number),
        (ValueKind::Mark, "baseId") => (Extractor::BaseId, ValueKind::Str),
        (ValueKind::Mark, "tags") => (Extractor::Tags, ValueKind::Str),
        (ValueKind::SkillUse, "power") => (Extractor::Power, ValueKind::Number),
        (ValueKind::SkillUse, "priority") => (Extractor::Priority, ValueKind::Number),
        (ValueKind::SkillUse, "accuracy") => (Extractor::Accuracy, ValueKind::Number),
        (ValueKind::SkillUse, "rageCost") => (Extractor::RageCost, ValueKind::Number),
        (ValueKind::SkillUse, "element") => (Extractor::SkillElement, ValueKind::Element),
        (ValueKind::Damage, "value") => (Extractor::DamageValue, ValueKind::Number),
        (kind, field) => {
            return Err(CompileError::UnknownField {
                kind: kind.name(),
                field: field.to_string(),
            });
        }
    };
    Ok(entry)
}

fn prop_lookup(kind: ValueKind, prop: &str) -> Result<PropName, CompileError> {
    Ok(match (kind, prop) {
        (ValueKind::Pet, "hp" | "currentHp") => PropName::Hp,
        (ValueKind::Pet, "stunned") => PropName::Stunned,
        (ValueKind::Mark, "stack") => PropName::Stack,
        (ValueKind::Mark, "duration") => PropName::Duration,
        (ValueKind::SkillUse, "power") => PropName::Power,
        (ValueKind::SkillUse, "accuracy") => PropName::Accuracy,
        (ValueKind::SkillUse, "priority") => PropName::Priority,
        (ValueKind::Damage, "value") => PropName::DamageValue,
        (kind, prop) => {
            return Err(CompileError::UnknownProp {
                kind: kind.name(),
                prop: prop.to_string(),
            });
        }
    })
}

pub fn compile_value(doc: &ValueDoc) -> Result<(ValueIr, ValueKind), CompileError> {
    Ok(match doc {
        ValueDoc::Bool(b) => (ValueIr::Bool(*b), ValueKind::Bool),
        ValueDoc::Number(n) => (ValueIr::Number(*n), ValueKind::Number),
        ValueDoc::Str(s) => (ValueIr::Str(s.clone()), ValueKind::Str),
        ValueDoc::List(items) => {
            let mut compiled = Vec::with_capacity(items.len());
            let mut list_kind = None;
            for item in items {
                let (value, kind) = compile_value(item)?;
                match list_kind {
                    None => list_kind = Some(kind),
                    Some(expected) if expected != kind => {
                        return Err(CompileError::KindMismatch {
                            step: "value list",
                            expected: expected.name(),
                            got: kind.name(),
                        });
                    }
                    Some(_) => {}
                }
                compiled.push(value);
            }
            (ValueIr::List(compiled), list_kind.unwrap_or(ValueKind::Number))
        }
        ValueDoc::Tagged(tagged) => match &**tagged {
            TaggedValueDoc::Dynamic { selector } => {
                let (selector, kind) = compile_selector(selector)?;
                (ValueIr::Dynamic(Box::new(selector)), kind)
            }
            // base mark references resolve to the base id string; effects
            // compare them against mark `baseId` extractions
            TaggedValueDoc::BaseMark { value } => {
                (ValueIr::BaseMark(BaseMarkId::new(&**value)), ValueKind::Str)
            }
            TaggedValueDoc::Element { value } => {
                (ValueIr::Element(*value), ValueKind::Element)
            }
            TaggedValueDoc::Conditional {
                condition,
                true_value,
                false_value,
            } => {
                let condition = compile_condition(condition)?;
                let (then_value, then_kind) = compile_value(true_value)?;
                let else_value = match false_value {
                    Some(v) => {
                        let (value, kind) = compile_value(v)?;
                        if kind != then_kind {
                            return Err(CompileError::BranchKindMismatch {
                                then: then_kind.name(),
                                otherwise: kind.name(),
                            });
                        }
                        Some(Box::new(value))
                    }
                    None => None,
                };
                (
                    ValueIr::Conditional {
                        condition: Box::new(condition),
                        then_value: Box::new(then_value),
                        else_value,
                    },
                    then_kind,
                )
            }
        },
    })
}

fn number_value(step: &'static str, doc: &ValueDoc) -> Result<ValueIr, CompileError> {
    let (value, kind) = compile_value(doc)?;
    require_kind(step, ValueKind::Number, kind)?;
    Ok(value)
}

pub fn compile_evaluator(
    doc: &EvaluatorDoc,
    input: ValueKind,
) -> Result<EvaluatorIr, CompileError> {
    Ok(match doc {
        EvaluatorDoc::Compare { operator, value } => {
            require_kind("compare", ValueKind::Number, input)?;
            let op = parse_compare_op(operator)?;
            let value = number_value("compare", value)?;
            EvaluatorIr::Compare { op, value }
        }
        EvaluatorDoc::Same { value } => {
            let (value, kind) = compile_value(value)?;
            require_kind("same", input, kind)?;
            EvaluatorIr::Same(value)
        }
        EvaluatorDoc::NotSame { value } => {
            let (value, kind) = compile_value(value)?;
            require_kind("notSame", input, kind)?;
            EvaluatorIr::NotSame(value)
        }
        EvaluatorDoc::Probability { percent } => {
            EvaluatorIr::Probability(number_value("probability", percent)?)
        }
        EvaluatorDoc::Contain { tag } => {
            require_kind("contain", ValueKind::Str, input)?;
            EvaluatorIr::Contain(tag.clone())
        }
        EvaluatorDoc::Exist => EvaluatorIr::Exist,
        EvaluatorDoc::Any { evaluators } => {
            let mut parts = Vec::new();
            for part in evaluators {
                parts.push(compile_evaluator(part, input)?);
            }
            EvaluatorIr::Any(parts)
        }
        EvaluatorDoc::All { evaluators } => {
            let mut parts = Vec::new();
            for part in evaluators {
                parts.push(compile_evaluator(part, input)?);
            }
            EvaluatorIr::All(parts)
        }
        EvaluatorDoc::Not { evaluator } => {
            EvaluatorIr::Not(Box::new(compile_evaluator(evaluator, input)?))
        }
    })
}

fn parse_compare_op(op: &str) -> Result<CompareOp, CompileError> {
    Ok(match op {
        ">" => CompareOp::Gt,
        ">=" => CompareOp::Ge,
        "<" => CompareOp::Lt,
        "<=" => CompareOp::Le,
        "==" => CompareOp::Eq,
        "!=" => CompareOp::Ne,
        other => return Err(CompileError::UnknownCompareOp(other.to_string())),
    })
}

pub fn compile_condition(doc: &ConditionDoc) -> Result<ConditionIr, CompileError> {
    Ok(match doc {
        ConditionDoc::Evaluate { target, evaluator } => {
            let (target, kind) = compile_selector(target)?;
            let evaluator = compile_evaluator(evaluator, kind)?;
            ConditionIr::Evaluate { target, evaluator }
        }
        ConditionDoc::SelfUseSkill => ConditionIr::SelfUseSkill,
        ConditionDoc::FoeUseSkill => ConditionIr::FoeUseSkill,
        ConditionDoc::SelfBeDamaged => ConditionIr::SelfBeDamaged,
        ConditionDoc::SelfAddMark => ConditionIr::SelfAddMark,
        ConditionDoc::FoeAddMark => ConditionIr::FoeAddMark,
        ConditionDoc::SelfBeAddMark => ConditionIr::SelfBeAddMark,
        ConditionDoc::FoeBeAddMark => ConditionIr::FoeBeAddMark,
        ConditionDoc::ContinuousUseSkill { times, strategy } => ConditionIr::ContinuousUseSkill {
            times: *times,
            strategy: match strategy {
                ContinuousStrategyDoc::Periodic => ContinuousStrategy::Periodic,
                ContinuousStrategyDoc::Once => ContinuousStrategy::Once,
                ContinuousStrategyDoc::Continuous => ContinuousStrategy::Continuous,
            },
        },
        ConditionDoc::StatStageChange { direction } => ConditionIr::StatStageChange {
            direction: match direction {
                StageDirectionDoc::Up => StageDirection::Up,
                StageDirectionDoc::Down => StageDirection::Down,
                StageDirectionDoc::All => StageDirection::All,
            },
        },
        ConditionDoc::IsFirstSkillUsedThisTurn => ConditionIr::IsFirstSkillUsedThisTurn,
        ConditionDoc::IsLastSkillUsedThisTurn => ConditionIr::IsLastSkillUsedThisTurn,
        ConditionDoc::PetIsActive => ConditionIr::PetIsActive,
        ConditionDoc::SomeOf { conditions } => {
            ConditionIr::SomeOf(compile_conditions(conditions)?)
        }
        ConditionDoc::EveryOf { conditions } => {
            ConditionIr::EveryOf(compile_conditions(conditions)?)
        }
        ConditionDoc::Not { condition } => {
            ConditionIr::Not(Box::new(compile_condition(condition)?))
        }
    })
}

fn compile_conditions(docs: &[ConditionDoc]) -> Result<Vec<ConditionIr>, CompileError> {
    docs.iter().map(compile_condition).collect()
}

pub fn compile_operator(doc: &OperatorDoc) -> Result<OperatorIr, CompileError> {
    Ok(match doc {
        OperatorDoc::DealDamage { target, value } => OperatorIr::DealDamage {
            target: selector_of_kind("dealDamage", target, ValueKind::Pet)?,
            value: number_value("dealDamage", value)?,
        },
        OperatorDoc::Heal { target, value } => OperatorIr::Heal {
            target: selector_of_kind("heal", target, ValueKind::Pet)?,
            value: number_value("heal", value)?,
        },
        OperatorDoc::AddMark {
            target,
            mark,
            stack,
            duration,
        } => OperatorIr::AddMark {
            target: selector_of_kind("addMark", target, ValueKind::Pet)?,
            mark: BaseMarkId::new(&**mark),
            stack: optional_number("addMark", stack)?,
            duration: optional_number("addMark", duration)?,
        },
        OperatorDoc::DestroyMark { target } => OperatorIr::DestroyMark {
            target: selector_of_kind("destroyMark", target, ValueKind::Mark)?,
        },
        OperatorDoc::TransferMark { target, to } => OperatorIr::TransferMark {
            target: selector_of_kind("transferMark", target, ValueKind::Mark)?,
            to: selector_of_kind("transferMark", to, ValueKind::Pet)?,
        },
        OperatorDoc::AddStacks { target, value } => OperatorIr::AddStacks {
            target: selector_of_kind("addStacks", target, ValueKind::Mark)?,
            value: number_value("addStacks", value)?,
        },
        OperatorDoc::ConsumeStacks { target, value } => OperatorIr::ConsumeStacks {
            target: selector_of_kind("consumeStacks", target, ValueKind::Mark)?,
            value: number_value("consumeStacks", value)?,
        },
        OperatorDoc::StatStageBuff {
            target,
            stat,
            value,
        } => OperatorIr::StatStageBuff {
            target: selector_of_kind("statStageBuff", target, ValueKind::Pet)?,
            stat: *stat,
            value: number_value("statStageBuff", value)?,
        },
        OperatorDoc::ClearStatStage { target, stat } => OperatorIr::ClearStatStage {
            target: selector_of_kind("clearStatStage", target, ValueKind::Pet)?,
            stat: *stat,
        },
        OperatorDoc::ModifyStat {
            target,
            stat,
            delta,
            percent,
        } => OperatorIr::ModifyStat {
            target: selector_of_kind("modifyStat", target, ValueKind::Pet)?,
            stat: *stat,
            delta: optional_number("modifyStat", delta)?,
            percent: optional_number("modifyStat", percent)?,
        },
        OperatorDoc::AddAttributeModifier {
            target,
            stat,
            modifier_type,
            value,
            priority,
        } => OperatorIr::AddAttributeModifier {
            target: selector_of_kind("addAttributeModifier", target, ValueKind::Pet)?,
            stat: *stat,
            modifier: *modifier_type,
            value: number_value("addAttributeModifier", value)?,
            priority: *priority,
        },
        OperatorDoc::AddClampMaxModifier {
            target,
            stat,
            max_value,
            priority,
        } => OperatorIr::AddClampMaxModifier {
            target: selector_of_kind("addClampMaxModifier", target, ValueKind::Pet)?,
            stat: *stat,
            max: number_value("addClampMaxModifier", max_value)?,
            priority: *priority,
        },
        OperatorDoc::AddClampMinModifier {
            target,
            stat,
            min_value,
            priority,
        } => OperatorIr::AddClampMinModifier {
            target: selector_of_kind("addClampMinModifier", target, ValueKind::Pet)?,
            stat: *stat,
            min: number_value("addClampMinModifier", min_value)?,
            priority: *priority,
        },
        OperatorDoc::AddClampModifier {
            target,
            stat,
            min_value,
            max_value,
            priority,
        } => OperatorIr::AddClampModifier {
            target: selector_of_kind("addClampModifier", target, ValueKind::Pet)?,
            stat: *stat,
            min: number_value("addClampModifier", min_value)?,
            max: number_value("addClampModifier", max_value)?,
            priority: *priority,
        },
        OperatorDoc::AddRage { target, value } => OperatorIr::AddRage {
            target: selector_of_kind("addRage", target, ValueKind::Player)?,
            value: number_value("addRage", value)?,
        },
        OperatorDoc::AmplifyPower { value } => OperatorIr::AmplifyPower {
            value: number_value("amplifyPower", value)?,
        },
        OperatorDoc::AddPower { value } => OperatorIr::AddPower {
            value: number_value("addPower", value)?,
        },
        OperatorDoc::AddCritRate { value } => OperatorIr::AddCritRate {
            value: number_value("addCritRate", value)?,
        },
        OperatorDoc::AddAccuracy { value } => OperatorIr::AddAccuracy {
            value: number_value("addAccuracy", value)?,
        },
        OperatorDoc::SetMultihit { min, max } => OperatorIr::SetMultihit {
            min: number_value("setMultihit", min)?,
            max: optional_number("setMultihit", max)?,
        },
        OperatorDoc::AddMultihitResult { value } => OperatorIr::AddMultihitResult {
            value: number_value("addMultihitResult", value)?,
        },
        OperatorDoc::Stun { target } => OperatorIr::Stun {
            target: selector_of_kind("stun", target, ValueKind::Pet)?,
        },
        OperatorDoc::SetSureHit { priority } => OperatorIr::SetSureHit {
            priority: *priority,
        },
        OperatorDoc::SetSureCrit { priority } => OperatorIr::SetSureCrit {
            priority: *priority,
        },
        OperatorDoc::SetSureMiss { priority } => OperatorIr::SetSureMiss {
            priority: *priority,
        },
        OperatorDoc::SetSureNoCrit { priority } => OperatorIr::SetSureNoCrit {
            priority: *priority,
        },
        OperatorDoc::PreventDamage => OperatorIr::PreventDamage,
        OperatorDoc::AddDamageModified { percent, delta } => OperatorIr::AddDamageModified {
            percent: number_value("addDamageModified", percent)?,
            delta: number_value("addDamageModified", delta)?,
        },
        OperatorDoc::AddDamageThreshold { min, max } => OperatorIr::AddDamageThreshold {
            min: optional_number("addDamageThreshold", min)?,
            max: optional_number("addDamageThreshold", max)?,
        },
        OperatorDoc::SetActualTarget { target } => OperatorIr::SetActualTarget {
            target: selector_of_kind("setActualTarget", target, ValueKind::Pet)?,
        },
        OperatorDoc::SetValue { target, value } => OperatorIr::SetValue {
            target: selector_of_kind("setValue", target, ValueKind::Prop)?,
            value: number_value("setValue", value)?,
        },
        OperatorDoc::AddValue { target, value } => OperatorIr::AddValue {
            target: selector_of_kind("addValue", target, ValueKind::Prop)?,
            value: number_value("addValue", value)?,
        },
        OperatorDoc::Toggle { target } => OperatorIr::Toggle {
            target: selector_of_kind("toggle", target, ValueKind::Prop)?,
        },
        OperatorDoc::SetMarkStack { value } => {
            OperatorIr::SetMarkStack(number_value("setMarkStack", value)?)
        }
        OperatorDoc::SetMarkDuration { value } => {
            OperatorIr::SetMarkDuration(number_value("setMarkDuration", value)?)
        }
        OperatorDoc::SetMarkMaxStack { value } => {
            OperatorIr::SetMarkMaxStack(number_value("setMarkMaxStack", value)?)
        }
        OperatorDoc::SetMarkPersistent { value } => OperatorIr::SetMarkPersistent(*value),
        OperatorDoc::SetMarkStackable { value } => OperatorIr::SetMarkStackable(*value),
        OperatorDoc::SetMarkStackStrategy { value } => OperatorIr::SetMarkStackStrategy(*value),
        OperatorDoc::SetMarkDestroyable { value } => OperatorIr::SetMarkDestroyable(*value),
        OperatorDoc::SetMarkIsShield { value } => OperatorIr::SetMarkIsShield(*value),
        OperatorDoc::SetMarkKeepOnSwitchOut { value } => {
            OperatorIr::SetMarkKeepOnSwitchOut(*value)
        }
        OperatorDoc::SetMarkTransferOnSwitch { value } => {
            OperatorIr::SetMarkTransferOnSwitch(*value)
        }
        OperatorDoc::SetMarkInheritOnFaint { value } => OperatorIr::SetMarkInheritOnFaint(*value),
        OperatorDoc::PreventAddMark => OperatorIr::PreventAddMark,
        OperatorDoc::Transform {
            target,
            to_base,
            permanent,
            priority,
        } => OperatorIr::Transform {
            target: selector_of_kind("transform", target, ValueKind::Pet)?,
            to: SpeciesId::new(&**to_base),
            permanent: *permanent,
            priority: *priority,
        },
        OperatorDoc::RemoveTransformation { target } => OperatorIr::RemoveTransformation {
            target: selector_of_kind("removeTransformation", target, ValueKind::Pet)?,
        },
        OperatorDoc::Conditional {
            condition,
            true_operator,
            false_operator,
        } => {
            let condition = compile_condition(condition)?;
            let mut then_ops = Vec::new();
            for op in true_operator.iter() {
                then_ops.push(compile_operator(op)?);
            }
            let mut else_ops = Vec::new();
            if let Some(false_operator) = false_operator {
                for op in false_operator.iter() {
                    else_ops.push(compile_operator(op)?);
                }
            }
            OperatorIr::Conditional {
                condition,
                then_ops,
                else_ops,
            }
        }
    })
}

fn selector_of_kind(
    step: &'static str,
    doc: &SelectorDoc,
    expected: ValueKind,
) -> Result<SelectorIr, CompileError> {
    let (selector, kind) = compile_selector(doc)?;
    require_kind(step, expected, kind)?;
    Ok(selector)
}

fn optional_number(
    step: &'static str,
    doc: &Option<ValueDoc>,
) -> Result<Option<ValueIr>, CompileError> {
    match doc {
        Some(v) => Ok(Some(number_value(step, v)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(json: &str) -> Result<(SelectorIr, ValueKind), CompileError> {
        let doc: SelectorDoc = serde_json::from_str(json).unwrap();
        compile_selector(&doc)
    }

    #[test]
    fn test_bare_base_selector() {
        let (sel, kind) = selector(r#""foe""#).unwrap();
        let SelectorIr::Chain { base, chain } = sel else {
            panic!("expected a chain selector");
        };
        assert_eq!(base, BaseSelectorIr::Foe);
        assert!(chain.is_empty());
        assert_eq!(kind, ValueKind::Pet);
    }

    #[test]
    fn test_conditional_selector_branch_kinds() {
        let (sel, kind) = selector(
            r#"{
                "condition": {"type": "selfUseSkill"},
                "trueSelector": "foe",
                "falseSelector": "self"
            }"#,
        )
        .unwrap();
        assert!(matches!(sel, SelectorIr::Conditional { .. }));
        assert_eq!(kind, ValueKind::Pet);

        let err = selector(
            r#"{
                "condition": {"type": "selfUseSkill"},
                "trueSelector": "foe",
                "falseSelector": "selfMarks"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::BranchKindMismatch {
                then: "pet",
                otherwise: "mark",
            }
        ));
    }

    #[test]
    fn test_value_list_requires_uniform_kind() {
        let doc: ValueDoc = serde_json::from_str(r#"[1, 2, 3]"#).unwrap();
        let (_, kind) = compile_value(&doc).unwrap();
        assert_eq!(kind, ValueKind::Number);

        let doc: ValueDoc = serde_json::from_str(r#"[1, "poison"]"#).unwrap();
        let err = compile_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            CompileError::KindMismatch {
                step: "value list",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_base_selector() {
        let err = selector(r#""everyone""#).unwrap_err();
        assert!(matches!(err, CompileError::UnknownBaseSelector(ref s) if s == "everyone"));
    }

    #[test]
    fn test_chain_kind_threading() {
        let (_, kind) = selector(
            r#"{"base": "foe", "chain": [
                {"type": "select", "arg": "hp"},
                {"type": "multiply", "arg": 0.25}
            ]}"#,
        )
        .unwrap();
        assert_eq!(kind, ValueKind::Number);
    }

    #[test]
    fn test_arithmetic_on_pets_rejected() {
        let err = selector(
            r#"{"base": "foe", "chain": [{"type": "add", "arg": 1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::NonNumericArithmetic("add")));
    }

    #[test]
    fn test_unknown_field() {
        let err = selector(
            r#"{"base": "self", "chain": [{"type": "select", "arg": "mana"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownField { kind: "pet", ref field } if field == "mana"
        ));
    }

    #[test]
    fn test_compare_requires_numbers() {
        let doc: EvaluatorDoc =
            serde_json::from_str(r#"{"type": "compare", "operator": ">", "value": 50}"#).unwrap();
        assert!(compile_evaluator(&doc, ValueKind::Number).is_ok());
        let err = compile_evaluator(&doc, ValueKind::Pet).unwrap_err();
        assert!(matches!(err, CompileError::KindMismatch { step: "compare", .. }));
    }

    #[test]
    fn test_operator_target_kinds() {
        let doc: OperatorDoc = serde_json::from_str(
            r#"{"type": "destroyMark", "target": "selfMarks"}"#,
        )
        .unwrap();
        assert!(compile_operator(&doc).is_ok());

        let doc: OperatorDoc = serde_json::from_str(
            r#"{"type": "destroyMark", "target": "self"}"#,
        )
        .unwrap();
        let err = compile_operator(&doc).unwrap_err();
        assert!(matches!(
            err,
            CompileError::KindMismatch { step: "destroyMark", expected: "mark", got: "pet" }
        ));
    }

    #[test]
    fn test_conditional_branch_kinds_must_match() {
        let doc: ValueDoc = serde_json::from_str(
            r#"{
                "type": "conditional",
                "condition": {"type": "selfUseSkill"},
                "trueValue": 10,
                "falseValue": "oops"
            }"#,
        )
        .unwrap();
        let err = compile_value(&doc).unwrap_err();
        assert!(matches!(err, CompileError::BranchKindMismatch { .. }));
    }
}
