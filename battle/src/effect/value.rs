//! Runtime values, extractors, and writable property handles.

use tamer_protocol::{BaseMarkId, BattleStat, Element, MarkId, PetId, PlayerId};
use thiserror::Error;

use crate::effect::condition::ConditionIr;
use crate::effect::selector::SelectorIr;
use crate::rng::BattleRng;

/// Errors raised while an effect runs. They abort the single effect,
/// never the surrounding turn.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("expected {expected} values, got {got}")]
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("no {0} context for this trigger")]
    MissingContext(&'static str),
    #[error("entity no longer exists: {0}")]
    UnknownEntity(String),
    #[error("division by zero")]
    DivideByZero,
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// A value literal or a deferred selector inside an effect program
#[derive(Debug, Clone)]
pub enum ValueIr {
    Number(f64),
    Str(String),
    Bool(bool),
    BaseMark(BaseMarkId),
    Element(Element),
    /// Resolved against the live battle at execution time
    Dynamic(Box<SelectorIr>),
    Conditional {
        condition: Box<ConditionIr>,
        then_value: Box<ValueIr>,
        else_value: Option<Box<ValueIr>>,
    },
    /// Elements evaluate independently and concatenate
    List(Vec<ValueIr>),
}

/// Extracts a derived value from each element of a selection
#[derive(Debug, Clone, PartialEq)]
pub enum Extractor {
    // pet
    Hp,
    MaxHp,
    Level,
    PetElement,
    PetId,
    Marks,
    Owner,
    Stat(BattleStat),
    // player
    ActivePet,
    Rage,
    // mark
    Stack,
    Duration,
    BaseId,
    Tags,
    // skill use context
    Power,
    Priority,
    Accuracy,
    RageCost,
    SkillElement,
    // damage context
    DamageValue,
}

/// Writable handle produced by property selection; `setValue`/`addValue`/
/// `toggle` write through these.
#[derive(Debug, Clone, PartialEq)]
pub enum PropRef {
    PetHp(PetId),
    PetStunned(PetId),
    MarkStack(MarkId),
    MarkDuration(MarkId),
    SkillPower,
    SkillAccuracy,
    SkillPriority,
    DamageValue,
}

/// A resolved selection flowing through a selector chain
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeVal {
    Pets(Vec<PetId>),
    Players(Vec<PlayerId>),
    Marks(Vec<MarkId>),
    /// Marker for the skill-use context in flight (0 or 1)
    SkillUses(usize),
    /// Marker for the damage context in flight (0 or 1)
    Damages(usize),
    /// Marker for the mark-application context in flight (0 or 1)
    MarkAdds(usize),
    Numbers(Vec<f64>),
    Strings(Vec<String>),
    Bools(Vec<bool>),
    Elements(Vec<Element>),
    Props(Vec<PropRef>),
}

impl RuntimeVal {
    pub fn len(&self) -> usize {
        match self {
            RuntimeVal::Pets(v) => v.len(),
            RuntimeVal::Players(v) => v.len(),
            RuntimeVal::Marks(v) => v.len(),
            RuntimeVal::SkillUses(n) | RuntimeVal::Damages(n) | RuntimeVal::MarkAdds(n) => *n,
            RuntimeVal::Numbers(v) => v.len(),
            RuntimeVal::Strings(v) => v.len(),
            RuntimeVal::Bools(v) => v.len(),
            RuntimeVal::Elements(v) => v.len(),
            RuntimeVal::Props(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RuntimeVal::Pets(_) => "pet",
            RuntimeVal::Players(_) => "player",
            RuntimeVal::Marks(_) => "mark",
            RuntimeVal::SkillUses(_) => "skill-use",
            RuntimeVal::Damages(_) => "damage",
            RuntimeVal::MarkAdds(_) => "mark-add",
            RuntimeVal::Numbers(_) => "number",
            RuntimeVal::Strings(_) => "string",
            RuntimeVal::Bools(_) => "boolean",
            RuntimeVal::Elements(_) => "element",
            RuntimeVal::Props(_) => "prop",
        }
    }

    /// Keep only the elements at the given (sorted, deduplicated) indices
    pub fn retain_indices(&mut self, keep: &[usize]) {
        fn filter<T>(items: &mut Vec<T>, keep: &[usize]) {
            let mut i = 0;
            items.retain(|_| {
                let keep_it = keep.contains(&i);
                i += 1;
                keep_it
            });
        }
        match self {
            RuntimeVal::Pets(v) => filter(v, keep),
            RuntimeVal::Players(v) => filter(v, keep),
            RuntimeVal::Marks(v) => filter(v, keep),
            RuntimeVal::SkillUses(n) | RuntimeVal::Damages(n) | RuntimeVal::MarkAdds(n) => {
                *n = keep.iter().filter(|&&i| i < *n).count();
            }
            RuntimeVal::Numbers(v) => filter(v, keep),
            RuntimeVal::Strings(v) => filter(v, keep),
            RuntimeVal::Bools(v) => filter(v, keep),
            RuntimeVal::Elements(v) => filter(v, keep),
            RuntimeVal::Props(v) => filter(v, keep),
        }
    }

    /// Pick `count` random elements, discarding the rest
    pub fn random_pick(&mut self, rng: &mut BattleRng, count: usize) {
        let len = self.len();
        if count >= len {
            return;
        }
        let mut indices: Vec<usize> = (0..len).collect();
        rng.shuffle(&mut indices);
        indices.truncate(count);
        self.retain_indices(&indices);
    }

    pub fn shuffle(&mut self, rng: &mut BattleRng) {
        match self {
            RuntimeVal::Pets(v) => rng.shuffle(v),
            RuntimeVal::Players(v) => rng.shuffle(v),
            RuntimeVal::Marks(v) => rng.shuffle(v),
            RuntimeVal::Numbers(v) => rng.shuffle(v),
            RuntimeVal::Strings(v) => rng.shuffle(v),
            RuntimeVal::Bools(v) => rng.shuffle(v),
            RuntimeVal::Elements(v) => rng.shuffle(v),
            RuntimeVal::Props(v) => rng.shuffle(v),
            RuntimeVal::SkillUses(_) | RuntimeVal::Damages(_) | RuntimeVal::MarkAdds(_) => {}
        }
    }

    /// Concatenate another selection of the same kind
    pub fn union(&mut self, other: RuntimeVal, duplicate: bool) -> Result<(), ActionError> {
        fn merge<T: PartialEq>(into: &mut Vec<T>, from: Vec<T>, duplicate: bool) {
            for item in from {
                if duplicate || !into.contains(&item) {
                    into.push(item);
                }
            }
        }
        match (self, other) {
            (RuntimeVal::Pets(a), RuntimeVal::Pets(b)) => merge(a, b, duplicate),
            (RuntimeVal::Players(a), RuntimeVal::Players(b)) => merge(a, b, duplicate),
            (RuntimeVal::Marks(a), RuntimeVal::Marks(b)) => merge(a, b, duplicate),
            (RuntimeVal::Numbers(a), RuntimeVal::Numbers(b)) => a.extend(b),
            (RuntimeVal::Strings(a), RuntimeVal::Strings(b)) => merge(a, b, duplicate),
            (RuntimeVal::Elements(a), RuntimeVal::Elements(b)) => merge(a, b, duplicate),
            (a, b) => {
                return Err(ActionError::KindMismatch {
                    expected: a.kind_name(),
                    got: b.kind_name(),
                });
            }
        }
        Ok(())
    }

    /// The selection as numbers, or a kind error
    pub fn numbers(&self) -> Result<&Vec<f64>, ActionError> {
        match self {
            RuntimeVal::Numbers(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "number",
                got: other.kind_name(),
            }),
        }
    }

    pub fn numbers_mut(&mut self) -> Result<&mut Vec<f64>, ActionError> {
        match self {
            RuntimeVal::Numbers(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "number",
                got: other.kind_name(),
            }),
        }
    }

    /// First number in the selection, if any
    pub fn first_number(&self) -> Result<f64, ActionError> {
        self.numbers()?
            .first()
            .copied()
            .ok_or(ActionError::EmptySelection)
    }

    pub fn pets(&self) -> Result<&Vec<PetId>, ActionError> {
        match self {
            RuntimeVal::Pets(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "pet",
                got: other.kind_name(),
            }),
        }
    }

    pub fn players(&self) -> Result<&Vec<PlayerId>, ActionError> {
        match self {
            RuntimeVal::Players(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "player",
                got: other.kind_name(),
            }),
        }
    }

    pub fn marks(&self) -> Result<&Vec<MarkId>, ActionError> {
        match self {
            RuntimeVal::Marks(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "mark",
                got: other.kind_name(),
            }),
        }
    }

    pub fn props(&self) -> Result<&Vec<PropRef>, ActionError> {
        match self {
            RuntimeVal::Props(v) => Ok(v),
            other => Err(ActionError::KindMismatch {
                expected: "prop",
                got: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_indices() {
        let mut v = RuntimeVal::Numbers(vec![10.0, 20.0, 30.0, 40.0]);
        v.retain_indices(&[0, 2]);
        assert_eq!(v, RuntimeVal::Numbers(vec![10.0, 30.0]));
    }

    #[test]
    fn test_union_dedup() {
        let mut a = RuntimeVal::Pets(vec![PetId::new("x"), PetId::new("y")]);
        let b = RuntimeVal::Pets(vec![PetId::new("y"), PetId::new("z")]);
        a.union(b, false).unwrap();
        assert_eq!(a.len(), 3);

        let mut a = RuntimeVal::Pets(vec![PetId::new("x")]);
        let b = RuntimeVal::Pets(vec![PetId::new("x")]);
        a.union(b, true).unwrap();
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_union_kind_mismatch() {
        let mut a = RuntimeVal::Pets(vec![PetId::new("x")]);
        let b = RuntimeVal::Numbers(vec![1.0]);
        assert!(a.union(b, false).is_err());
    }

    #[test]
    fn test_random_pick_bounds() {
        let mut rng = BattleRng::seeded(3);
        let mut v = RuntimeVal::Numbers(vec![1.0, 2.0, 3.0]);
        v.random_pick(&mut rng, 5);
        assert_eq!(v.len(), 3);
        v.random_pick(&mut rng, 1);
        assert_eq!(v.len(), 1);
    }
}
