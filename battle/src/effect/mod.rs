//! The effect engine: triggers, compiled effect programs, and their
//! evaluation machinery.
//!
//! Effects are data. Skills and marks carry a list of [`Effect`]s, each
//! bound to a [`Trigger`]; when the engine reaches a trigger site it
//! collects every matching effect on the field, orders them by priority,
//! and runs each one's condition and operators against the action context.

pub mod condition;
pub mod evaluator;
pub mod operator;
pub mod selector;
pub mod value;

pub use condition::{ConditionIr, ContinuousStrategy, StageDirection};
pub use evaluator::{CompareOp, EvaluatorIr};
pub use operator::OperatorIr;
pub use selector::{BaseSelectorIr, ChainStep, SelectorIr};
pub use value::{ActionError, Extractor, PropRef, RuntimeVal, ValueIr};

use serde::{Deserialize, Serialize};
use tamer_protocol::EffectId;

/// Every site in the battle flow where effects can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Trigger {
    OnBattleStart,
    TurnStart,
    TurnEnd,
    /// Before action ordering; priority changes land here
    BeforeSort,
    /// May cancel the skill use before rage is spent
    BeforeUseSkillCheck,
    AfterUseSkillCheck,
    BeforeHit,
    OnCritPreDamage,
    PreDamage,
    OnDamage,
    /// Shield marks absorb here, after OnDamage modifiers
    Shield,
    PostDamage,
    OnCritPostDamage,
    OnHit,
    OnMiss,
    OnDefeat,
    /// May cancel or rewrite the pending mark application
    OnBeforeAddMark,
    OnAddMark,
    OnMarkCreated,
    OnRemoveMark,
    OnMarkDestroy,
    OnMarkDurationEnd,
    OnStack,
    OnHeal,
    OnRageGain,
    OnRageLoss,
    OnSwitchIn,
    OnSwitchOut,
    OnOwnerSwitchIn,
    OnOwnerSwitchOut,
    OnStatStageChange,
    BeforeTransform,
    AfterTransform,
}

/// One compiled effect program
#[derive(Debug, Clone)]
pub struct Effect {
    pub id: EffectId,
    pub trigger: Trigger,
    pub priority: i32,
    pub condition: Option<ConditionIr>,
    pub ops: Vec<OperatorIr>,
    /// When set, the carrying mark must hold at least this many stacks;
    /// they are consumed on a successful application.
    pub consumes_stacks: Option<u32>,
}

impl Effect {
    pub fn new(id: impl Into<EffectId>, trigger: Trigger, priority: i32) -> Self {
        Self {
            id: id.into(),
            trigger,
            priority,
            condition: None,
            ops: Vec::new(),
            consumes_stacks: None,
        }
    }

    pub fn with_condition(mut self, condition: ConditionIr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_op(mut self, op: OperatorIr) -> Self {
        self.ops.push(op);
        self
    }

    pub fn with_consumes_stacks(mut self, stacks: u32) -> Self {
        self.consumes_stacks = Some(stacks);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_serde_names() {
        let json = serde_json::to_string(&Trigger::OnDamage).unwrap();
        assert_eq!(json, "\"OnDamage\"");
        let back: Trigger = serde_json::from_str("\"BeforeUseSkillCheck\"").unwrap();
        assert_eq!(back, Trigger::BeforeUseSkillCheck);
    }
}
