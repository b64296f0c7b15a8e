//! The battle message stream.
//!
//! The engine emits one [`BattleMessage`] per observable mutation; transport
//! relays them verbatim and presentation clients reconstruct the battle from
//! them. Messages carry an increasing sequence id assigned by the engine so
//! consumers can detect gaps and order replays.

use serde::{Deserialize, Serialize};

use crate::ids::{BaseMarkId, EffectId, MarkId, PetId, PlayerId, SkillId};
use crate::stat::BattleStat;

/// An event record plus its position in the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleMessage {
    pub seq: u64,
    #[serde(flatten)]
    pub event: BattleEvent,
}

/// How damage was inflicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageKind {
    Physical,
    Special,
    /// Direct damage from an effect, bypasses the skill formula
    Effect,
}

/// Why a skill use was rejected or fizzled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillFailReason {
    NoRage,
    Disabled,
    NoTarget,
    Fainted,
}

/// Why the battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    AllPetFainted,
    Surrender,
    Abandon,
}

/// Tagged union of every event the engine can emit.
///
/// `TurnAction`, `ForcedSwitch`, and `FaintSwitch` require a reply selection
/// from the named player(s) before the state machine proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BattleEvent {
    BattleStart {
        players: Vec<PlayerId>,
    },
    TurnStart {
        turn: u32,
    },
    TurnEnd {
        turn: u32,
    },
    SkillUse {
        user: PetId,
        target: PetId,
        skill: SkillId,
        rage_cost: u32,
    },
    SkillMiss {
        user: PetId,
        target: PetId,
        skill: SkillId,
    },
    SkillUseFail {
        user: PetId,
        skill: SkillId,
        reason: SkillFailReason,
    },
    SkillUseEnd {
        user: PetId,
        skill: SkillId,
    },
    Damage {
        /// Absent for field damage with no originating pet
        source: Option<PetId>,
        target: PetId,
        damage: u32,
        current_hp: u32,
        max_hp: u32,
        is_crit: bool,
        effectiveness: f64,
        kind: DamageKind,
    },
    DamageFail {
        target: PetId,
        reason: String,
    },
    Heal {
        target: PetId,
        amount: u32,
        current_hp: u32,
    },
    HealFail {
        target: PetId,
        reason: String,
    },
    MarkApply {
        base: BaseMarkId,
        mark: MarkId,
        target: PetId,
        stack: u32,
        duration: i32,
    },
    MarkDestroy {
        mark: MarkId,
        target: PetId,
    },
    MarkExpire {
        mark: MarkId,
        target: PetId,
    },
    MarkUpdate {
        mark: MarkId,
        stack: u32,
        duration: i32,
    },
    EffectApply {
        effect: EffectId,
    },
    EffectApplyFail {
        effect: EffectId,
        reason: String,
    },
    PetSwitch {
        player: PlayerId,
        from_pet: PetId,
        to_pet: PetId,
        current_hp: u32,
    },
    PetDefeated {
        pet: PetId,
        killer: Option<PetId>,
    },
    PetRevive {
        pet: PetId,
    },
    StatChange {
        pet: PetId,
        stat: BattleStat,
        delta: i8,
        stage: i8,
    },
    /// An attribute modifier landed or a base stat was rewritten;
    /// `value` is the new effective reading
    AttributeChange {
        pet: PetId,
        stat: BattleStat,
        value: f64,
    },
    RageChange {
        player: PlayerId,
        before: u32,
        after: u32,
        reason: String,
    },
    Transform {
        target: String,
        from_base: String,
        to_base: String,
        permanent: bool,
        priority: i32,
    },
    TransformEnd {
        target: String,
        from_base: String,
        to_base: String,
        reason: String,
    },
    /// The named players must pick their battle team and starter
    TeamSelection {
        players: Vec<PlayerId>,
    },
    /// Both players must submit a turn selection
    TurnAction {
        players: Vec<PlayerId>,
    },
    /// The named players must switch before the battle continues
    ForcedSwitch {
        players: Vec<PlayerId>,
    },
    /// The named player may take a bonus switch after a kill
    FaintSwitch {
        player: PlayerId,
    },
    InvalidAction {
        player: PlayerId,
        reason: String,
    },
    Info {
        message: String,
    },
    Error {
        message: String,
    },
    BattleEnd {
        winner: Option<PlayerId>,
        reason: EndReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tagging() {
        let msg = BattleMessage {
            seq: 7,
            event: BattleEvent::TurnStart { turn: 3 },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["type"], "turnStart");
        assert_eq!(json["turn"], 3);
    }

    #[test]
    fn test_skill_fail_reason_snake_case() {
        let event = BattleEvent::SkillUseFail {
            user: PetId::new("p1"),
            skill: SkillId::new("s1"),
            reason: SkillFailReason::NoRage,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "no_rage");
    }

    #[test]
    fn test_battle_end_roundtrip() {
        let event = BattleEvent::BattleEnd {
            winner: Some(PlayerId::new("alice")),
            reason: EndReason::Surrender,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BattleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
