//! Compiling authored documents and running them through a live battle.

use anyhow::Result;
use tamer_battle::{
    Battle, Category, DataStore, MarkConfig, MarkDef, Nature, PetBlueprint, PlayerSetup, SkillDef,
    Species, StatSpread, Trigger,
};
use tamer_dsl::{CompileError, DslError, SelectorDoc, ValueKind};
use tamer_protocol::message::DamageKind;
use tamer_protocol::{BaseMarkId, BattleEvent, Element, PetId, PlayerId, PlayerSelection, SpeciesId};

fn store() -> DataStore {
    let mut store = DataStore::new();
    store
        .register_species(Species::new(
            "wolf",
            "Wolf",
            Element::Normal,
            StatSpread {
                hp: 140,
                atk: 95,
                def: 45,
                spa: 95,
                spd: 45,
                spe: 70,
            },
        ))
        .unwrap();
    store
        .register_skill(SkillDef::new(
            "tackle",
            "Tackle",
            Category::Physical,
            Element::Normal,
            0,
            100.0,
            0,
        ))
        .unwrap();
    store
}

fn blueprint(id: &str) -> PetBlueprint {
    PetBlueprint {
        id: PetId::new(id),
        name: id.to_uppercase(),
        species: SpeciesId::new("wolf"),
        level: 50,
        nature: Nature::Hardy,
        ivs: StatSpread::uniform(0),
        evs: StatSpread::uniform(0),
        skills: vec!["tackle".into()],
    }
}

fn battle(store: DataStore) -> Battle {
    Battle::new(
        store,
        PlayerSetup {
            id: PlayerId::new("p1"),
            name: "P1".into(),
            team: vec![blueprint("a1")],
        },
        PlayerSetup {
            id: PlayerId::new("p2"),
            name: "P2".into(),
            team: vec![blueprint("b1")],
        },
        Some(8),
    )
    .unwrap()
}

fn compile_selector(json: &str) -> Result<ValueKind, CompileError> {
    let doc: SelectorDoc = serde_json::from_str(json).unwrap();
    tamer_dsl::compile_selector(&doc).map(|(_, kind)| kind)
}

#[test]
fn test_compiled_effect_runs_in_battle() -> Result<()> {
    // 5% of max HP per turn, at least 1
    let effect = tamer_dsl::parse_effect(
        r#"{
            "id": "poison_tick",
            "trigger": "TurnEnd",
            "condition": {
                "type": "evaluate",
                "target": {"base": "self", "chain": [{"type": "select", "arg": "hp"}]},
                "evaluator": {"type": "compare", "operator": ">", "value": 0}
            },
            "apply": {
                "type": "dealDamage",
                "target": "self",
                "value": {
                    "type": "dynamic",
                    "selector": {
                        "base": "self",
                        "chain": [
                            {"type": "select", "arg": "maxHp"},
                            {"type": "multiply", "arg": 0.05},
                            {"type": "clampMin", "arg": 1}
                        ]
                    }
                }
            }
        }"#,
    )?;
    assert_eq!(effect.trigger, Trigger::TurnEnd);

    let mut store = store();
    store.register_mark(
        MarkDef::new(
            "poison",
            "Poison",
            MarkConfig {
                duration: 5,
                ..MarkConfig::default()
            },
        )
        .with_effect(effect),
    )?;

    let mut battle = battle(store);
    battle.advance();
    battle.add_mark(None, PetId::new("b1"), BaseMarkId::new("poison"), None, None)?;
    battle.drain_messages();

    battle.submit(PlayerSelection::DoNothing {
        player: PlayerId::new("p1"),
    })?;
    battle.submit(PlayerSelection::DoNothing {
        player: PlayerId::new("p2"),
    })?;
    battle.advance();

    let events: Vec<BattleEvent> = battle
        .drain_messages()
        .into_iter()
        .map(|m| m.event)
        .collect();
    assert!(events.iter().any(|e| matches!(
        e,
        BattleEvent::Damage {
            kind: DamageKind::Effect,
            damage: 10,
            ..
        }
    )));
    assert_eq!(battle.pet(&PetId::new("b1")).unwrap().current_hp, 190);
    Ok(())
}

#[test]
fn test_unknown_base_selector_is_a_compile_error() {
    let err = compile_selector(r#""everybody""#).unwrap_err();
    assert!(matches!(err, CompileError::UnknownBaseSelector(ref s) if s == "everybody"));
}

#[test]
fn test_unknown_step_is_a_parse_error() {
    let err = tamer_dsl::parse_effect(
        r#"{
            "id": "broken",
            "trigger": "TurnEnd",
            "apply": {
                "type": "dealDamage",
                "target": {"base": "self", "chain": [{"type": "frobnicate"}]},
                "value": 1
            }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, DslError::Parse(_)));
}

#[test]
fn test_arithmetic_on_non_numeric_chain() {
    let err = compile_selector(
        r#"{"base": "selfMarks", "chain": [{"type": "multiply", "arg": 2}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::NonNumericArithmetic("multiply")));
}

#[test]
fn test_select_path_walks_kinds() {
    // pet -> owner (player) -> activePet (pet)
    let kind = compile_selector(
        r#"{"base": "self", "chain": [{"type": "selectPath", "arg": "owner.activePet"}]}"#,
    )
    .unwrap();
    assert_eq!(kind, ValueKind::Pet);

    let err = compile_selector(
        r#"{"base": "self", "chain": [{"type": "selectPath", "arg": "owner.activePet.mana"}]}"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnknownField { kind: "pet", ref field } if field == "mana"
    ));
}

#[test]
fn test_operator_rejects_wrong_target_kind() {
    let doc: tamer_dsl::OperatorDoc = serde_json::from_str(
        r#"{"type": "addRage", "target": "self", "value": 10}"#,
    )
    .unwrap();
    let err = tamer_dsl::compile_operator(&doc).unwrap_err();
    assert!(matches!(
        err,
        CompileError::KindMismatch {
            step: "addRage",
            expected: "player",
            got: "pet",
        }
    ));
}

#[test]
fn test_attribute_modifier_operators_compile_and_run() -> Result<()> {
    use tamer_protocol::BattleStat;

    let effect = tamer_dsl::parse_effect(
        r#"{
            "id": "bulwark",
            "trigger": "OnMarkCreated",
            "apply": [
                {
                    "type": "addAttributeModifier",
                    "target": "self",
                    "stat": "def",
                    "modifierType": "percent",
                    "value": 200,
                    "priority": 1
                },
                {
                    "type": "addClampMaxModifier",
                    "target": "self",
                    "stat": "def",
                    "maxValue": 80
                },
                {
                    "type": "modifyStat",
                    "target": "self",
                    "stat": "atk",
                    "delta": 20,
                    "percent": 50
                }
            ]
        }"#,
    )?;
    assert_eq!(effect.ops.len(), 3);

    let mut store = store();
    store.register_mark(
        MarkDef::new(
            "bulwark",
            "Bulwark",
            MarkConfig {
                duration: -1,
                persistent: true,
                ..MarkConfig::default()
            },
        )
        .with_effect(effect),
    )?;
    let mut battle = battle(store);
    battle.advance();
    battle.add_mark(None, PetId::new("b1"), BaseMarkId::new("bulwark"), None, None)?;

    let pet = battle.pet(&PetId::new("b1")).unwrap();
    // def 50 doubled by the higher-priority percent, then clamped to 80
    assert_eq!(pet.effective_stat(BattleStat::Def), 80.0);
    // atk base rewritten to floor((100 + 20) * 1.5)
    assert_eq!(pet.effective_stat(BattleStat::Atk), 180.0);
    Ok(())
}

#[test]
fn test_full_document_shape() -> Result<()> {
    let effect = tamer_dsl::parse_effect(
        r#"{
            "id": "overdrive",
            "trigger": "BeforeHit",
            "priority": 3,
            "consumesStacks": 2,
            "condition": {
                "type": "every",
                "conditions": [
                    {"type": "selfUseSkill"},
                    {"type": "continuousUseSkill", "times": 2, "strategy": "continuous"}
                ]
            },
            "apply": [
                {"type": "amplifyPower", "value": 1.5},
                {"type": "setSureCrit", "priority": 1}
            ]
        }"#,
    )?;
    assert_eq!(effect.id.as_str(), "overdrive");
    assert_eq!(effect.trigger, Trigger::BeforeHit);
    assert_eq!(effect.priority, 3);
    assert_eq!(effect.consumes_stacks, Some(2));
    assert!(effect.condition.is_some());
    assert_eq!(effect.ops.len(), 2);
    Ok(())
}
