use thiserror::Error;

/// Static validation failures while lowering a document to the engine IR
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown base selector: {0}")]
    UnknownBaseSelector(String),
    #[error("unknown field `{field}` on a {kind} selection")]
    UnknownField { kind: &'static str, field: String },
    #[error("unknown property `{prop}` on a {kind} selection")]
    UnknownProp { kind: &'static str, prop: String },
    #[error("`{step}` expects a {expected} selection, chain produces {got}")]
    KindMismatch {
        step: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    #[error("`{0}` is only valid on a numeric chain")]
    NonNumericArithmetic(&'static str),
    #[error("unknown comparison operator: {0}")]
    UnknownCompareOp(String),
    #[error("branches of a conditional produce different kinds: {then} vs {otherwise}")]
    BranchKindMismatch {
        then: &'static str,
        otherwise: &'static str,
    },
}

/// Parse or compile failure for a whole document
#[derive(Debug, Error)]
pub enum DslError {
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Compile(#[from] CompileError),
}
