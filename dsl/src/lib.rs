//! Effect document compiler.
//!
//! Skills and marks are authored as JSON documents describing when an
//! effect fires, what it selects, and what it does. This crate holds the
//! serde shapes for those documents ([`doc`]) and the compiler that
//! lowers them into the battle engine's executable IR ([`compile`]),
//! rejecting malformed programs before a battle ever runs them:
//!
//! ```
//! let effect = tamer_dsl::parse_effect(r#"{
//!     "id": "burn_tick",
//!     "trigger": "TurnEnd",
//!     "apply": {"type": "dealDamage", "target": "self", "value": 10}
//! }"#).unwrap();
//! assert_eq!(effect.id.as_str(), "burn_tick");
//! ```

pub mod compile;
pub mod doc;
pub mod error;

pub use compile::{
    compile_condition, compile_effect, compile_evaluator, compile_operator, compile_selector,
    compile_value, ValueKind,
};
pub use doc::{
    ConditionDoc, EffectDoc, EvaluatorDoc, OneOrMany, OperatorDoc, SelectorDoc, StepDoc,
    TaggedValueDoc, ValueDoc,
};
pub use error::{CompileError, DslError};

use tamer_battle::Effect;

/// Parse and compile a single effect document from JSON
pub fn parse_effect(json: &str) -> Result<Effect, DslError> {
    let doc: EffectDoc = serde_json::from_str(json)?;
    Ok(compile_effect(&doc)?)
}

/// Parse and compile a JSON array of effect documents
pub fn parse_effects(json: &str) -> Result<Vec<Effect>, DslError> {
    let docs: Vec<EffectDoc> = serde_json::from_str(json)?;
    docs.iter()
        .map(|doc| compile_effect(doc).map_err(DslError::from))
        .collect()
}
