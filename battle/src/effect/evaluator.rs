//! Evaluators: predicates over resolved selections.
//!
//! An evaluator is used two ways: as a set-level test inside conditions
//! (does any element pass) and as a per-element filter behind `where`
//! steps.

use crate::battle::Battle;
use crate::context::{EffectSource, ParentCtx};
use crate::effect::selector;
use crate::effect::value::{ActionError, RuntimeVal, ValueIr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn test(&self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EvaluatorIr {
    /// Numeric comparison against a resolved value
    Compare { op: CompareOp, value: ValueIr },
    /// Identity/equality with a resolved value
    Same(ValueIr),
    NotSame(ValueIr),
    /// Independent roll per element with the given percent chance
    Probability(ValueIr),
    /// String selections: contains the given entry
    Contain(String),
    /// The selection is non-empty
    Exist,
    Any(Vec<EvaluatorIr>),
    All(Vec<EvaluatorIr>),
    Not(Box<EvaluatorIr>),
}

/// Indices of elements that pass the evaluator, for `where` filtering
pub fn filter_indices(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    value: &RuntimeVal,
    eval: &EvaluatorIr,
) -> Result<Vec<usize>, ActionError> {
    let mut keep = Vec::new();
    for i in 0..value.len() {
        let mut single = value.clone();
        single.retain_indices(&[i]);
        if eval_set(battle, source, parent, &single, eval)? {
            keep.push(i);
        }
    }
    Ok(keep)
}

/// Set-level evaluation: true when any element satisfies the predicate
pub fn eval_set(
    battle: &mut Battle,
    source: &EffectSource,
    parent: &ParentCtx<'_>,
    value: &RuntimeVal,
    eval: &EvaluatorIr,
) -> Result<bool, ActionError> {
    match eval {
        EvaluatorIr::Exist => Ok(!value.is_empty()),
        EvaluatorIr::Compare { op, value: rhs } => {
            let rhs = selector::eval_number(battle, source, parent, rhs)?;
            Ok(value.numbers()?.iter().any(|&n| op.test(n, rhs)))
        }
        EvaluatorIr::Same(rhs) => {
            let rhs = selector::eval_value(battle, source, parent, rhs)?;
            same_any(value, &rhs)
        }
        EvaluatorIr::NotSame(rhs) => {
            let rhs = selector::eval_value(battle, source, parent, rhs)?;
            Ok(!same_any(value, &rhs)?)
        }
        EvaluatorIr::Probability(percent) => {
            let percent = selector::eval_number(battle, source, parent, percent)?;
            let mut passed = false;
            for _ in 0..value.len() {
                if battle.rng.chance(percent) {
                    passed = true;
                }
            }
            Ok(passed)
        }
        EvaluatorIr::Contain(entry) => match value {
            RuntimeVal::Strings(items) => Ok(items.iter().any(|s| s == entry)),
            other => Err(ActionError::KindMismatch {
                expected: "string",
                got: other.kind_name(),
            }),
        },
        EvaluatorIr::Any(parts) => {
            for part in parts {
                if eval_set(battle, source, parent, value, part)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        EvaluatorIr::All(parts) => {
            for part in parts {
                if !eval_set(battle, source, parent, value, part)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        EvaluatorIr::Not(inner) => Ok(!eval_set(battle, source, parent, value, inner)?),
    }
}

/// Whether any element of `value` equals any element of `rhs`
fn same_any(value: &RuntimeVal, rhs: &RuntimeVal) -> Result<bool, ActionError> {
    match (value, rhs) {
        (RuntimeVal::Numbers(a), RuntimeVal::Numbers(b)) => {
            Ok(a.iter().any(|x| b.contains(x)))
        }
        (RuntimeVal::Strings(a), RuntimeVal::Strings(b)) => {
            Ok(a.iter().any(|x| b.contains(x)))
        }
        (RuntimeVal::Bools(a), RuntimeVal::Bools(b)) => Ok(a.iter().any(|x| b.contains(x))),
        (RuntimeVal::Elements(a), RuntimeVal::Elements(b)) => {
            Ok(a.iter().any(|x| b.contains(x)))
        }
        (RuntimeVal::Pets(a), RuntimeVal::Pets(b)) => Ok(a.iter().any(|x| b.contains(x))),
        (RuntimeVal::Players(a), RuntimeVal::Players(b)) => Ok(a.iter().any(|x| b.contains(x))),
        (RuntimeVal::Marks(a), RuntimeVal::Marks(b)) => Ok(a.iter().any(|x| b.contains(x))),
        (a, b) => Err(ActionError::KindMismatch {
            expected: a.kind_name(),
            got: b.kind_name(),
        }),
    }
}
