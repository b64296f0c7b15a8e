//! Attribute modifiers: stat adjustments that stack independently of
//! stat stages and are re-applied on every read. A pet carries its live
//! modifiers; [`modified_stat`] folds them over the staged base value,
//! highest priority first, so the effective reading always reflects the
//! current modifier set.

use serde::{Deserialize, Serialize};
use tamer_protocol::{BattleStat, MarkId};

/// How one modifier reshapes a stat reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierOp {
    /// Multiply by value / 100 (150 reads as x1.5)
    Percent(f64),
    /// Add a flat amount
    Delta(f64),
    /// Replace the reading outright
    Override(f64),
    ClampMax(f64),
    ClampMin(f64),
    Clamp { min: f64, max: f64 },
}

impl ModifierOp {
    pub fn apply(self, current: f64) -> f64 {
        match self {
            ModifierOp::Percent(p) => current * p / 100.0,
            ModifierOp::Delta(d) => current + d,
            ModifierOp::Override(v) => v,
            ModifierOp::ClampMax(max) => current.min(max),
            ModifierOp::ClampMin(min) => current.max(min),
            ModifierOp::Clamp { min, max } => current.max(min).min(max),
        }
    }
}

/// Modifier flavors a document names directly; clamps have their own
/// operators carrying the bound values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierType {
    Percent,
    Delta,
    Override,
}

impl ModifierType {
    pub fn with_value(self, value: f64) -> ModifierOp {
        match self {
            ModifierType::Percent => ModifierOp::Percent(value),
            ModifierType::Delta => ModifierOp::Delta(value),
            ModifierType::Override => ModifierOp::Override(value),
        }
    }
}

/// One live modifier on a pet stat
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModifier {
    pub stat: BattleStat,
    pub op: ModifierOp,
    /// Higher priority applies first
    pub priority: i32,
    /// Set when a mark added the modifier; removed with the mark
    pub source: Option<MarkId>,
}

/// Fold every modifier for `stat` over a base reading
pub fn modified_stat(mods: &[AttributeModifier], stat: BattleStat, base: f64) -> f64 {
    let mut applicable: Vec<&AttributeModifier> = mods.iter().filter(|m| m.stat == stat).collect();
    applicable.sort_by_key(|m| std::cmp::Reverse(m.priority));
    applicable
        .into_iter()
        .fold(base, |value, m| m.op.apply(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier(op: ModifierOp, priority: i32) -> AttributeModifier {
        AttributeModifier {
            stat: BattleStat::Atk,
            op,
            priority,
            source: None,
        }
    }

    #[test]
    fn test_modifiers_apply_by_priority() {
        // delta first (priority 1), then the halving percent
        let mods = vec![
            modifier(ModifierOp::Percent(50.0), 0),
            modifier(ModifierOp::Delta(20.0), 1),
        ];
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 100.0), 60.0);
        // swapped priorities: halve first, then add
        let mods = vec![
            modifier(ModifierOp::Percent(50.0), 1),
            modifier(ModifierOp::Delta(20.0), 0),
        ];
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 100.0), 70.0);
    }

    #[test]
    fn test_clamps_and_override() {
        let mods = vec![modifier(ModifierOp::ClampMax(80.0), 0)];
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 100.0), 80.0);
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 50.0), 50.0);

        let mods = vec![modifier(
            ModifierOp::Clamp {
                min: 40.0,
                max: 80.0,
            },
            0,
        )];
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 10.0), 40.0);
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 200.0), 80.0);

        let mods = vec![modifier(ModifierOp::Override(1.0), 0)];
        assert_eq!(modified_stat(&mods, BattleStat::Atk, 100.0), 1.0);
    }

    #[test]
    fn test_other_stats_untouched() {
        let mods = vec![modifier(ModifierOp::Delta(50.0), 0)];
        assert_eq!(modified_stat(&mods, BattleStat::Def, 100.0), 100.0);
    }
}
