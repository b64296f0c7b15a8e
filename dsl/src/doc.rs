//! Document shapes for authored effect data.
//!
//! These types mirror the JSON an effect author writes. They deserialize
//! leniently (single values where lists are allowed, bare strings for
//! plain base selectors) and carry no battle semantics of their own; the
//! compiler in [`crate::compile`] validates and lowers them.

use serde::{Deserialize, Serialize};
use tamer_battle::{ModifierType, StackStrategy, Trigger};
use tamer_protocol::{BattleStat, Element};

/// A single value or a list of them; authors may write either
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

/// The top-level authored effect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDoc {
    pub id: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub priority: i32,
    pub apply: OneOrMany<OperatorDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumes_stacks: Option<u32>,
}

/// A selector: either a bare base name or a base plus a chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorDoc {
    Base(String),
    Chained {
        base: String,
        #[serde(default)]
        chain: Vec<StepDoc>,
    },
    Conditional {
        condition: Box<ConditionDoc>,
        #[serde(rename = "trueSelector")]
        true_selector: Box<SelectorDoc>,
        #[serde(
            rename = "falseSelector",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        false_selector: Option<Box<SelectorDoc>>,
    },
}

/// One chain step as written in a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepDoc {
    Select {
        arg: String,
    },
    /// Dotted multi-hop field access, e.g. `owner.activePet`
    SelectPath {
        arg: String,
    },
    SelectProp {
        arg: String,
    },
    Where {
        arg: EvaluatorDoc,
    },
    WhereAttr {
        extractor: String,
        evaluator: EvaluatorDoc,
    },
    And {
        arg: Box<SelectorDoc>,
    },
    Or {
        arg: Box<SelectorDoc>,
        #[serde(default)]
        duplicate: bool,
    },
    RandomPick {
        arg: u32,
    },
    RandomSample {
        arg: ValueDoc,
    },
    Sum,
    Add {
        arg: ValueDoc,
    },
    Multiply {
        arg: ValueDoc,
    },
    Divide {
        arg: ValueDoc,
    },
    Shuffled,
    ClampMax {
        arg: ValueDoc,
    },
    ClampMin {
        arg: ValueDoc,
    },
    Flat,
    Length,
}

/// A literal, a tagged entity reference, or a deferred selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDoc {
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<ValueDoc>),
    Tagged(Box<TaggedValueDoc>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TaggedValueDoc {
    Dynamic {
        selector: SelectorDoc,
    },
    #[serde(rename = "entity:baseMark")]
    BaseMark {
        value: String,
    },
    Element {
        value: Element,
    },
    Conditional {
        condition: ConditionDoc,
        true_value: ValueDoc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        false_value: Option<ValueDoc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EvaluatorDoc {
    Compare {
        operator: String,
        value: ValueDoc,
    },
    Same {
        value: ValueDoc,
    },
    NotSame {
        value: ValueDoc,
    },
    Probability {
        percent: ValueDoc,
    },
    Contain {
        tag: String,
    },
    Exist,
    Any {
        evaluators: Vec<EvaluatorDoc>,
    },
    All {
        evaluators: Vec<EvaluatorDoc>,
    },
    Not {
        evaluator: Box<EvaluatorDoc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuousStrategyDoc {
    Periodic,
    Once,
    #[default]
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageDirectionDoc {
    Up,
    Down,
    #[default]
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConditionDoc {
    Evaluate {
        target: SelectorDoc,
        evaluator: EvaluatorDoc,
    },
    SelfUseSkill,
    FoeUseSkill,
    SelfBeDamaged,
    SelfAddMark,
    FoeAddMark,
    SelfBeAddMark,
    FoeBeAddMark,
    ContinuousUseSkill {
        #[serde(default = "default_continuous_times")]
        times: u32,
        #[serde(default)]
        strategy: ContinuousStrategyDoc,
    },
    StatStageChange {
        #[serde(default)]
        direction: StageDirectionDoc,
    },
    IsFirstSkillUsedThisTurn,
    IsLastSkillUsedThisTurn,
    PetIsActive,
    #[serde(rename = "some")]
    SomeOf {
        conditions: Vec<ConditionDoc>,
    },
    #[serde(rename = "every")]
    EveryOf {
        conditions: Vec<ConditionDoc>,
    },
    Not {
        condition: Box<ConditionDoc>,
    },
}

fn default_continuous_times() -> u32 {
    2
}

/// One operator as written in a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperatorDoc {
    DealDamage {
        target: SelectorDoc,
        value: ValueDoc,
    },
    Heal {
        target: SelectorDoc,
        value: ValueDoc,
    },
    AddMark {
        target: SelectorDoc,
        mark: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<ValueDoc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<ValueDoc>,
    },
    DestroyMark {
        target: SelectorDoc,
    },
    TransferMark {
        target: SelectorDoc,
        to: SelectorDoc,
    },
    AddStacks {
        target: SelectorDoc,
        value: ValueDoc,
    },
    ConsumeStacks {
        target: SelectorDoc,
        value: ValueDoc,
    },
    StatStageBuff {
        target: SelectorDoc,
        stat: BattleStat,
        value: ValueDoc,
    },
    ClearStatStage {
        target: SelectorDoc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stat: Option<BattleStat>,
    },
    ModifyStat {
        target: SelectorDoc,
        stat: BattleStat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<ValueDoc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<ValueDoc>,
    },
    AddAttributeModifier {
        target: SelectorDoc,
        stat: BattleStat,
        modifier_type: ModifierType,
        value: ValueDoc,
        #[serde(default)]
        priority: i32,
    },
    AddClampMaxModifier {
        target: SelectorDoc,
        stat: BattleStat,
        max_value: ValueDoc,
        #[serde(default)]
        priority: i32,
    },
    AddClampMinModifier {
        target: SelectorDoc,
        stat: BattleStat,
        min_value: ValueDoc,
        #[serde(default)]
        priority: i32,
    },
    AddClampModifier {
        target: SelectorDoc,
        stat: BattleStat,
        min_value: ValueDoc,
        max_value: ValueDoc,
        #[serde(default)]
        priority: i32,
    },
    AddRage {
        target: SelectorDoc,
        value: ValueDoc,
    },
    AmplifyPower {
        value: ValueDoc,
    },
    AddPower {
        value: ValueDoc,
    },
    AddCritRate {
        value: ValueDoc,
    },
    AddAccuracy {
        value: ValueDoc,
    },
    SetMultihit {
        min: ValueDoc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<ValueDoc>,
    },
    AddMultihitResult {
        value: ValueDoc,
    },
    Stun {
        target: SelectorDoc,
    },
    SetSureHit {
        #[serde(default)]
        priority: i32,
    },
    SetSureCrit {
        #[serde(default)]
        priority: i32,
    },
    SetSureMiss {
        #[serde(default)]
        priority: i32,
    },
    SetSureNoCrit {
        #[serde(default)]
        priority: i32,
    },
    PreventDamage,
    AddDamageModified {
        percent: ValueDoc,
        delta: ValueDoc,
    },
    AddDamageThreshold {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<ValueDoc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<ValueDoc>,
    },
    SetActualTarget {
        target: SelectorDoc,
    },
    SetValue {
        target: SelectorDoc,
        value: ValueDoc,
    },
    AddValue {
        target: SelectorDoc,
        value: ValueDoc,
    },
    Toggle {
        target: SelectorDoc,
    },
    SetMarkStack {
        value: ValueDoc,
    },
    SetMarkDuration {
        value: ValueDoc,
    },
    SetMarkMaxStack {
        value: ValueDoc,
    },
    SetMarkPersistent {
        value: bool,
    },
    SetMarkStackable {
        value: bool,
    },
    SetMarkStackStrategy {
        value: StackStrategy,
    },
    SetMarkDestroyable {
        value: bool,
    },
    SetMarkIsShield {
        value: bool,
    },
    SetMarkKeepOnSwitchOut {
        value: bool,
    },
    SetMarkTransferOnSwitch {
        value: bool,
    },
    SetMarkInheritOnFaint {
        value: bool,
    },
    PreventAddMark,
    Transform {
        target: SelectorDoc,
        to_base: String,
        #[serde(default)]
        permanent: bool,
        #[serde(default)]
        priority: i32,
    },
    RemoveTransformation {
        target: SelectorDoc,
    },
    Conditional {
        condition: ConditionDoc,
        true_operator: Box<OneOrMany<OperatorDoc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        false_operator: Option<Box<OneOrMany<OperatorDoc>>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_doc_single_operator() {
        let doc: EffectDoc = serde_json::from_str(
            r#"{
                "id": "burn_tick",
                "trigger": "TurnEnd",
                "apply": {
                    "type": "dealDamage",
                    "target": "self",
                    "value": 10
                }
            }"#,
        )
        .unwrap();
        assert_eq!(doc.id, "burn_tick");
        assert_eq!(doc.trigger, Trigger::TurnEnd);
        assert_eq!(doc.priority, 0);
        assert_eq!(doc.apply.iter().count(), 1);
    }

    #[test]
    fn test_selector_doc_bare_and_chained() {
        let bare: SelectorDoc = serde_json::from_str(r#""foe""#).unwrap();
        assert!(matches!(bare, SelectorDoc::Base(ref b) if b == "foe"));

        let chained: SelectorDoc = serde_json::from_str(
            r#"{
                "base": "self",
                "chain": [
                    {"type": "select", "arg": "hp"},
                    {"type": "multiply", "arg": 0.5}
                ]
            }"#,
        )
        .unwrap();
        let SelectorDoc::Chained { base, chain } = chained else {
            panic!("expected chained selector");
        };
        assert_eq!(base, "self");
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_value_doc_variants() {
        let n: ValueDoc = serde_json::from_str("42.5").unwrap();
        assert!(matches!(n, ValueDoc::Number(v) if v == 42.5));

        let b: ValueDoc = serde_json::from_str("true").unwrap();
        assert!(matches!(b, ValueDoc::Bool(true)));

        let dynamic: ValueDoc = serde_json::from_str(
            r#"{"type": "dynamic", "selector": {"base": "foe", "chain": [{"type": "select", "arg": "hp"}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            dynamic,
            ValueDoc::Tagged(ref t) if matches!(**t, TaggedValueDoc::Dynamic { .. })
        ));

        let mark: ValueDoc =
            serde_json::from_str(r#"{"type": "entity:baseMark", "value": "mark_burn"}"#).unwrap();
        assert!(matches!(
            mark,
            ValueDoc::Tagged(ref t) if matches!(**t, TaggedValueDoc::BaseMark { .. })
        ));
    }

    #[test]
    fn test_condition_doc_defaults() {
        let cond: ConditionDoc =
            serde_json::from_str(r#"{"type": "continuousUseSkill", "times": 3}"#).unwrap();
        let ConditionDoc::ContinuousUseSkill { times, strategy } = cond else {
            panic!("expected continuousUseSkill");
        };
        assert_eq!(times, 3);
        assert_eq!(strategy, ContinuousStrategyDoc::Continuous);
    }

    #[test]
    fn test_conditional_operator_field_names() {
        let op: OperatorDoc = serde_json::from_str(
            r#"{
                "type": "conditional",
                "condition": {"type": "selfUseSkill"},
                "trueOperator": {"type": "setSureCrit", "priority": 1},
                "falseOperator": [{"type": "preventDamage"}]
            }"#,
        )
        .unwrap();
        let OperatorDoc::Conditional {
            true_operator,
            false_operator,
            ..
        } = op
        else {
            panic!("expected conditional");
        };
        assert_eq!(true_operator.iter().count(), 1);
        assert_eq!(false_operator.unwrap().into_vec().len(), 1);
    }
}
