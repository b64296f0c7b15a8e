//! End-to-end battles driven through the public submit/advance surface.

use tamer_battle::effect::{BaseSelectorIr, OperatorIr, SelectorIr, ValueIr};
use tamer_battle::{
    Advance, Battle, Category, DataStore, Effect, EntityRef, MarkConfig, MarkDef, Nature,
    PetBlueprint, PlayerSetup, SkillDef, Species, StackStrategy, StatSpread, Trigger,
};
use tamer_protocol::message::{DamageKind, SkillFailReason};
use tamer_protocol::{
    BaseMarkId, BattleEvent, BattleStat, Element, EndReason, PetId, PlayerId, PlayerSelection,
    SpeciesId,
};

// Level-50 pets with zero ivs/evs and a neutral nature give round stats:
// atk base 95 -> 100, def base 45 -> 50, hp base 140 -> 200. A 75-power
// physical hit then has a base damage of 68 before multipliers.
const BASE_DAMAGE: f64 = 68.0;

fn species(id: &str, element: Element, spe: u32) -> Species {
    Species::new(
        id,
        id.to_uppercase(),
        element,
        StatSpread {
            hp: 140,
            atk: 95,
            def: 45,
            spa: 95,
            spd: 45,
            spe,
        },
    )
}

fn blueprint(id: &str, species: &str, skills: &[&str]) -> PetBlueprint {
    PetBlueprint {
        id: PetId::new(id),
        name: id.to_uppercase(),
        species: SpeciesId::new(species),
        level: 50,
        nature: Nature::Hardy,
        ivs: StatSpread::uniform(0),
        evs: StatSpread::uniform(0),
        skills: skills.iter().map(|s| (*s).into()).collect(),
    }
}

fn base_store() -> DataStore {
    let mut store = DataStore::new();
    // fast normal attacker, slow normal defender, a fire form to turn into
    store.register_species(species("slugger", Element::Normal, 70)).unwrap();
    store.register_species(species("tank", Element::Normal, 40)).unwrap();
    store.register_species(species("pyron", Element::Fire, 70)).unwrap();
    store
        .register_skill(SkillDef::new(
            "scorch",
            "Scorch",
            Category::Physical,
            Element::Fire,
            75,
            100.0,
            15,
        ))
        .unwrap();
    let mut judgment = SkillDef::new(
        "judgment",
        "Judgment",
        Category::Physical,
        Element::Fire,
        75,
        100.0,
        15,
    );
    judgment.sure_crit = true;
    store.register_skill(judgment).unwrap();
    store
        .register_skill(SkillDef::new(
            "overreach",
            "Overreach",
            Category::Physical,
            Element::Fire,
            75,
            100.0,
            25,
        ))
        .unwrap();
    store
}

fn setup(player: &str, pets: Vec<PetBlueprint>) -> PlayerSetup {
    PlayerSetup {
        id: PlayerId::new(player),
        name: player.to_uppercase(),
        team: pets,
    }
}

fn duel(store: DataStore, seed: u64) -> Battle {
    Battle::new(
        store,
        setup("p1", vec![blueprint("a1", "slugger", &["scorch", "judgment", "overreach"])]),
        setup("p2", vec![blueprint("b1", "tank", &["scorch"])]),
        Some(seed),
    )
    .unwrap()
}

fn use_skill(player: &str, skill: &str, target: &str) -> PlayerSelection {
    PlayerSelection::UseSkill {
        player: PlayerId::new(player),
        skill: skill.into(),
        target: PetId::new(target),
    }
}

fn do_nothing(player: &str) -> PlayerSelection {
    PlayerSelection::DoNothing {
        player: PlayerId::new(player),
    }
}

fn run_turn(battle: &mut Battle, a: PlayerSelection, b: PlayerSelection) -> Advance {
    battle.advance();
    battle.submit(a).unwrap();
    battle.submit(b).unwrap();
    battle.advance()
}

fn events(battle: &mut Battle) -> Vec<BattleEvent> {
    battle.drain_messages().into_iter().map(|m| m.event).collect()
}

#[test]
fn test_damage_formula_range() {
    let mut battle = duel(base_store(), 11);
    run_turn(&mut battle, use_skill("p1", "scorch", "b1"), do_nothing("p2"));

    let events = events(&mut battle);
    let damage = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::Damage {
                damage,
                current_hp,
                max_hp,
                is_crit,
                effectiveness,
                kind,
                ..
            } => Some((*damage, *current_hp, *max_hp, *is_crit, *effectiveness, *kind)),
            _ => None,
        })
        .expect("a damage event");

    let (dealt, current_hp, max_hp, is_crit, effectiveness, kind) = damage;
    assert_eq!(kind, DamageKind::Physical);
    assert_eq!(effectiveness, 1.0);
    assert_eq!(max_hp, 200);
    // base x crit x random spread in [0.85, 1.0), floored
    let mult = if is_crit { 1.5 } else { 1.0 };
    let low = (BASE_DAMAGE * mult * 0.85).floor() as u32;
    let high = (BASE_DAMAGE * mult).floor() as u32;
    assert!(
        (low..=high).contains(&dealt),
        "damage {dealt} outside [{low}, {high}] (crit: {is_crit})"
    );
    assert_eq!(current_hp, 200 - dealt);
}

#[test]
fn test_stab_and_crit_multipliers() {
    let mut store = base_store();
    store.register_species(species("ember_cat", Element::Fire, 70)).unwrap();
    let battle = Battle::new(
        store,
        setup("p1", vec![blueprint("a1", "ember_cat", &["judgment"])]),
        setup("p2", vec![blueprint("b1", "tank", &["scorch"])]),
        Some(5),
    );
    let mut battle = battle.unwrap();
    run_turn(&mut battle, use_skill("p1", "judgment", "b1"), do_nothing("p2"));

    let events = events(&mut battle);
    let (dealt, is_crit) = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::Damage { damage, is_crit, .. } => Some((*damage, *is_crit)),
            _ => None,
        })
        .expect("a damage event");

    assert!(is_crit, "sure-crit skill must crit");
    // 68 x 1.5 STAB x 1.5 crit, spread in [0.85, 1.0)
    let low = (BASE_DAMAGE * 1.5 * 1.5 * 0.85).floor() as u32;
    let high = (BASE_DAMAGE * 1.5 * 1.5).floor() as u32 - 1;
    assert!(
        (low..=high).contains(&dealt),
        "damage {dealt} outside [{low}, {high}]"
    );
}

#[test]
fn test_no_rage_fails_skill() {
    // overreach costs 25, starting rage is 20
    let mut battle = duel(base_store(), 3);
    run_turn(&mut battle, use_skill("p1", "overreach", "b1"), do_nothing("p2"));

    let events = events(&mut battle);
    assert!(events.iter().any(|e| matches!(
        e,
        BattleEvent::SkillUseFail {
            reason: SkillFailReason::NoRage,
            ..
        }
    )));
    assert!(!events.iter().any(|e| matches!(e, BattleEvent::Damage { .. })));
}

#[test]
fn test_rage_accounting_over_a_turn() {
    let mut battle = duel(base_store(), 7);
    run_turn(&mut battle, use_skill("p1", "scorch", "b1"), do_nothing("p2"));

    // 20 initial - 15 cost + 15 on-hit + 15 turn income
    assert_eq!(battle.players[0].rage, 35);
    // defender gains half the damage taken plus turn income, clamped later
    assert!(battle.players[1].rage > 35);
    assert!(battle.players[1].rage <= 100);
}

#[test]
fn test_mark_stack_clamp_and_duration_expiry() {
    let mut store = base_store();
    store
        .register_mark(MarkDef::new(
            "venom",
            "Venom",
            MarkConfig {
                duration: 2,
                stackable: true,
                max_stacks: 4,
                stack_strategy: StackStrategy::Stack,
                ..MarkConfig::default()
            },
        ))
        .unwrap();
    let mut battle = duel(store, 13);
    battle.advance();

    battle
        .add_mark(None, PetId::new("b1"), BaseMarkId::new("venom"), Some(10), None)
        .unwrap();
    let applied = events(&mut battle)
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkApply { mark, stack, .. } => Some((mark.clone(), *stack)),
            _ => None,
        })
        .expect("mark applied");
    assert_eq!(applied.1, 4, "stacks clamp to max_stacks");

    run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
    assert!(battle.mark(&applied.0).is_some(), "one turn left");

    run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
    let events = events(&mut battle);
    assert!(events.iter().any(|e| matches!(e, BattleEvent::MarkExpire { .. })));
    assert!(battle.mark(&applied.0).is_none());
}

#[test]
fn test_shield_absorbs_before_hp() {
    let mut store = base_store();
    store
        .register_mark(MarkDef::new(
            "aegis",
            "Aegis",
            MarkConfig {
                duration: -1,
                persistent: true,
                stackable: true,
                max_stacks: 200,
                stack_strategy: StackStrategy::Stack,
                is_shield: true,
                ..MarkConfig::default()
            },
        ))
        .unwrap();
    let mut battle = duel(store, 21);
    battle.advance();
    battle
        .add_mark(None, PetId::new("b1"), BaseMarkId::new("aegis"), Some(150), None)
        .unwrap();
    events(&mut battle);

    run_turn(&mut battle, use_skill("p1", "scorch", "b1"), do_nothing("p2"));

    let events = events(&mut battle);
    let dealt = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::Damage { damage, .. } => Some(*damage),
            _ => None,
        })
        .expect("a damage event");
    assert_eq!(dealt, 0, "shield soaks the whole hit");
    assert_eq!(battle.pet(&PetId::new("b1")).unwrap().current_hp, 200);
    let remaining = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkUpdate { stack, .. } => Some(*stack),
            _ => None,
        })
        .expect("shield stack update");
    assert!(remaining < 150);
}

#[test]
fn test_stat_stage_boost_and_clamp() {
    let mut battle = duel(base_store(), 17);
    battle.advance();
    let pet = PetId::new("a1");

    battle.boost_stat(&pet, BattleStat::Atk, 2);
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Atk), 200.0);

    battle.boost_stat(&pet, BattleStat::Atk, 8);
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Atk), 400.0);

    let stat_events = events(&mut battle);
    let stages: Vec<i8> = stat_events
        .iter()
        .filter_map(|e| match e {
            BattleEvent::StatChange { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec![2, 6]);

    // already at the cap, no event
    battle.boost_stat(&pet, BattleStat::Atk, 1);
    assert!(events(&mut battle).is_empty());
}

#[test]
fn test_speed_tie_resolved_by_coin_flip() {
    let mut saw_first: Vec<String> = Vec::new();
    for seed in 0..32 {
        let store = base_store();
        let mut battle = Battle::new(
            store,
            setup("p1", vec![blueprint("a1", "slugger", &["scorch"])]),
            setup("p2", vec![blueprint("b1", "slugger", &["scorch"])]),
            Some(seed),
        )
        .unwrap();
        run_turn(
            &mut battle,
            use_skill("p1", "scorch", "b1"),
            use_skill("p2", "scorch", "a1"),
        );
        if let Some(user) = events(&mut battle).iter().find_map(|e| match e {
            BattleEvent::SkillUse { user, .. } => Some(user.to_string()),
            _ => None,
        }) {
            saw_first.push(user);
        }
    }
    assert!(saw_first.iter().any(|u| u == "a1"));
    assert!(saw_first.iter().any(|u| u == "b1"));
}

#[test]
fn test_faint_interrupts_turn_and_forces_switch() {
    let store = base_store();
    let mut battle = Battle::new(
        store,
        setup(
            "p1",
            vec![
                blueprint("a1", "slugger", &["scorch"]),
                blueprint("a2", "slugger", &["scorch"]),
            ],
        ),
        setup(
            "p2",
            vec![
                blueprint("b1", "tank", &["scorch"]),
                blueprint("b2", "tank", &["scorch"]),
            ],
        ),
        Some(9),
    )
    .unwrap();
    battle.advance();
    battle.pet_mut(&PetId::new("b1")).unwrap().current_hp = 1;

    let advance = run_turn(
        &mut battle,
        use_skill("p1", "scorch", "b1"),
        use_skill("p2", "scorch", "a1"),
    );
    assert_eq!(advance, Advance::AwaitingForcedSwitch(vec![PlayerId::new("p2")]));

    let turn_events = events(&mut battle);
    let uses = turn_events
        .iter()
        .filter(|e| matches!(e, BattleEvent::SkillUse { .. }))
        .count();
    assert_eq!(uses, 1, "the fainted pet never acts");
    assert!(turn_events.iter().any(|e| matches!(
        e,
        BattleEvent::PetDefeated { killer: Some(k), .. } if k.as_str() == "a1"
    )));

    battle
        .submit(PlayerSelection::SwitchPet {
            player: PlayerId::new("p2"),
            pet: PetId::new("b2"),
        })
        .unwrap();
    // the killer's owner gets the bonus switch offer
    assert_eq!(battle.advance(), Advance::AwaitingFaintSwitch(PlayerId::new("p1")));
    battle.submit(do_nothing("p1")).unwrap();
    assert!(matches!(battle.advance(), Advance::AwaitingSelections(_)));
    assert_eq!(battle.players[1].active_pet().id.as_str(), "b2");
}

#[test]
fn test_surrender_ends_battle() {
    let mut battle = duel(base_store(), 2);
    battle.advance();
    battle
        .submit(PlayerSelection::Surrender {
            player: PlayerId::new("p2"),
        })
        .unwrap();
    assert_eq!(
        battle.advance(),
        Advance::Ended {
            winner: Some(PlayerId::new("p1")),
            reason: EndReason::Surrender,
        }
    );
}

#[test]
fn test_abandon_faints_whole_team() {
    let mut battle = duel(base_store(), 2);
    battle.advance();
    battle.abandon(&PlayerId::new("p1"));

    assert!(battle.has_ended());
    assert!(battle.players[0].team.iter().all(|p| !p.is_alive()));
    assert_eq!(
        battle.advance(),
        Advance::Ended {
            winner: Some(PlayerId::new("p2")),
            reason: EndReason::Abandon,
        }
    );
}

#[test]
fn test_skill_effect_applies_mark_that_ticks() {
    let mut store = base_store();
    store
        .register_mark(
            MarkDef::new(
                "burn",
                "Burn",
                MarkConfig {
                    duration: 3,
                    ..MarkConfig::default()
                },
            )
            .with_effect(Effect::new("burn_tick", Trigger::TurnEnd, 0).with_op(
                OperatorIr::DealDamage {
                    target: SelectorIr::base(BaseSelectorIr::SelfPet),
                    value: ValueIr::Number(10.0),
                },
            )),
        )
        .unwrap();
    store
        .register_skill(
            SkillDef::new("igniter", "Igniter", Category::Physical, Element::Fire, 75, 100.0, 15)
                .with_effect(Effect::new("ignite", Trigger::OnHit, 0).with_op(
                    OperatorIr::AddMark {
                        target: SelectorIr::base(BaseSelectorIr::Target),
                        mark: BaseMarkId::new("burn"),
                        stack: None,
                        duration: None,
                    },
                )),
        )
        .unwrap();

    let mut battle = Battle::new(
        store,
        setup("p1", vec![blueprint("a1", "slugger", &["igniter"])]),
        setup("p2", vec![blueprint("b1", "tank", &["scorch"])]),
        Some(31),
    )
    .unwrap();
    run_turn(&mut battle, use_skill("p1", "igniter", "b1"), do_nothing("p2"));

    let events = events(&mut battle);
    let skill_damage = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::Damage {
                kind: DamageKind::Physical,
                damage,
                ..
            } => Some(*damage),
            _ => None,
        })
        .expect("skill damage");
    assert!(events.iter().any(|e| matches!(
        e,
        BattleEvent::MarkApply { target, .. } if target.as_str() == "b1"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        BattleEvent::Damage {
            kind: DamageKind::Effect,
            damage: 10,
            source: None,
            ..
        }
    )));
    assert_eq!(
        battle.pet(&PetId::new("b1")).unwrap().current_hp,
        200 - skill_damage - 10
    );
}

#[test]
fn test_consumes_stacks_gates_and_spends() {
    let mut store = base_store();
    store
        .register_mark(
            MarkDef::new(
                "charges",
                "Charges",
                MarkConfig {
                    duration: 10,
                    stackable: true,
                    max_stacks: 5,
                    stack_strategy: StackStrategy::Stack,
                    ..MarkConfig::default()
                },
            )
            .with_effect(
                Effect::new("spend", Trigger::TurnEnd, 0)
                    .with_consumes_stacks(2)
                    .with_op(OperatorIr::AddRage {
                        target: SelectorIr::base(BaseSelectorIr::PetOwners),
                        value: ValueIr::Number(1.0),
                    }),
            ),
        )
        .unwrap();
    let mut battle = duel(store, 19);
    battle.advance();
    battle
        .add_mark(None, PetId::new("b1"), BaseMarkId::new("charges"), Some(3), None)
        .unwrap();
    let mark_id = events(&mut battle)
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkApply { mark, .. } => Some(mark.clone()),
            _ => None,
        })
        .expect("mark applied");

    let fired = |events: &[BattleEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, BattleEvent::EffectApply { effect } if effect.as_str() == "spend"))
            .count()
    };

    run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
    assert_eq!(fired(&events(&mut battle)), 1);
    assert_eq!(battle.mark(&mark_id).unwrap().stack, 1);

    // one stack left, requirement is two: silently skipped, mark survives
    run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
    let second = events(&mut battle);
    assert_eq!(fired(&second), 0);
    assert!(!second.iter().any(|e| matches!(e, BattleEvent::EffectApplyFail { .. })));
    assert_eq!(battle.mark(&mark_id).unwrap().stack, 1);
}

#[test]
fn test_transformation_stack_and_restore() {
    let mut battle = duel(base_store(), 23);
    battle.advance();
    let pet = PetId::new("a1");
    let target = EntityRef::Pet(pet.clone());

    assert!(!battle.transformation_state(&target).is_transformed);

    assert!(battle.transform_pet(&pet, &SpeciesId::new("pyron"), false, 1, None));
    assert!(battle.transformation_state(&target).is_transformed);
    assert_eq!(battle.pet(&pet).unwrap().element, Element::Fire);

    // a higher-priority form takes over; removing it falls back
    assert!(battle.transform_pet(&pet, &SpeciesId::new("tank"), false, 5, None));
    assert_eq!(battle.pet(&pet).unwrap().species.as_str(), "tank");
    assert!(battle.remove_transformation(&pet));
    assert_eq!(battle.pet(&pet).unwrap().species.as_str(), "pyron");
    assert!(battle.remove_transformation(&pet));
    assert_eq!(battle.pet(&pet).unwrap().species.as_str(), "slugger");
    assert_eq!(battle.pet(&pet).unwrap().element, Element::Normal);
    assert!(!battle.transformation_state(&target).is_transformed);

    // unknown species is rejected, nothing to clean up is a no-op
    assert!(!battle.transform_pet(&pet, &SpeciesId::new("ghost"), false, 1, None));
    battle.cleanup_mark_transformations(&tamer_protocol::MarkId::new("absent"));
}

#[test]
fn test_transform_rejected_after_battle_ends() {
    let mut battle = duel(base_store(), 23);
    battle.advance();
    battle.abandon(&PlayerId::new("p1"));
    assert!(!battle.transform_pet(&PetId::new("a1"), &SpeciesId::new("pyron"), false, 1, None));
}

#[test]
fn test_invalid_switch_rejected() {
    let mut battle = duel(base_store(), 2);
    battle.advance();
    let err = battle.submit(PlayerSelection::SwitchPet {
        player: PlayerId::new("p1"),
        pet: PetId::new("a1"),
    });
    assert!(err.is_err());
    assert!(events(&mut battle)
        .iter()
        .any(|e| matches!(e, BattleEvent::InvalidAction { .. })));
}

#[test]
fn test_team_selection_flow() {
    let store = base_store();
    let mut battle = Battle::new(
        store,
        setup(
            "p1",
            vec![
                blueprint("a1", "slugger", &["scorch"]),
                blueprint("a2", "tank", &["scorch"]),
            ],
        ),
        setup("p2", vec![blueprint("b1", "tank", &["scorch"])]),
        Some(41),
    )
    .unwrap()
    .with_team_selection();

    let advance = battle.advance();
    assert_eq!(
        advance,
        Advance::AwaitingTeamSelection(vec![PlayerId::new("p1"), PlayerId::new("p2")])
    );

    battle
        .submit(PlayerSelection::TeamSelection {
            player: PlayerId::new("p1"),
            selected_pets: vec![PetId::new("a2")],
            starter_pet_id: PetId::new("a2"),
        })
        .unwrap();
    // a starter outside the selected pets is rejected
    assert!(battle
        .submit(PlayerSelection::TeamSelection {
            player: PlayerId::new("p2"),
            selected_pets: vec![PetId::new("b1")],
            starter_pet_id: PetId::new("missing"),
        })
        .is_err());
    battle
        .submit(PlayerSelection::TeamSelection {
            player: PlayerId::new("p2"),
            selected_pets: vec![PetId::new("b1")],
            starter_pet_id: PetId::new("b1"),
        })
        .unwrap();

    assert!(matches!(battle.advance(), Advance::AwaitingSelections(_)));
    assert_eq!(battle.players[0].team.len(), 1);
    assert_eq!(battle.players[0].active_pet().id.as_str(), "a2");
}

#[test]
fn test_first_and_last_skill_flags_skip_passing_players() {
    use tamer_battle::effect::ConditionIr;

    // a lone skill in a turn where the other player passes is both the
    // first and the last skill of that turn
    let mut store = base_store();
    store
        .register_skill(
            SkillDef::new("finisher", "Finisher", Category::Physical, Element::Fire, 75, 100.0, 15)
                .with_effect(
                    Effect::new("opener", Trigger::OnHit, 0)
                        .with_condition(ConditionIr::IsFirstSkillUsedThisTurn)
                        .with_op(OperatorIr::AddRage {
                            target: SelectorIr::base(BaseSelectorIr::PetOwners),
                            value: ValueIr::Number(1.0),
                        }),
                )
                .with_effect(
                    Effect::new("closer", Trigger::OnHit, 0)
                        .with_condition(ConditionIr::IsLastSkillUsedThisTurn)
                        .with_op(OperatorIr::AddRage {
                            target: SelectorIr::base(BaseSelectorIr::PetOwners),
                            value: ValueIr::Number(1.0),
                        }),
                ),
        )
        .unwrap();

    let fired = |events: &[BattleEvent], id: &str| {
        events
            .iter()
            .filter(|e| matches!(e, BattleEvent::EffectApply { effect } if effect.as_str() == id))
            .count()
    };

    let mut battle = Battle::new(
        store.clone(),
        setup("p1", vec![blueprint("a1", "slugger", &["finisher"])]),
        setup("p2", vec![blueprint("b1", "tank", &["scorch"])]),
        Some(37),
    )
    .unwrap();
    run_turn(&mut battle, use_skill("p1", "finisher", "b1"), do_nothing("p2"));
    let solo = events(&mut battle);
    assert_eq!(fired(&solo, "opener"), 1);
    assert_eq!(fired(&solo, "closer"), 1);

    // two skills in one turn: the faster actor opens, the slower closes
    let mut battle = Battle::new(
        store,
        setup("p1", vec![blueprint("a1", "slugger", &["finisher"])]),
        setup("p2", vec![blueprint("b1", "tank", &["finisher"])]),
        Some(37),
    )
    .unwrap();
    run_turn(
        &mut battle,
        use_skill("p1", "finisher", "b1"),
        use_skill("p2", "finisher", "a1"),
    );
    let both = events(&mut battle);
    assert_eq!(fired(&both, "opener"), 1);
    assert_eq!(fired(&both, "closer"), 1);
}

#[test]
fn test_negative_duration_mark_survives_turn_ends() {
    let mut store = base_store();
    store
        .register_mark(MarkDef::new(
            "brand",
            "Brand",
            MarkConfig {
                duration: -1,
                persistent: false,
                ..MarkConfig::default()
            },
        ))
        .unwrap();
    let mut battle = duel(store, 29);
    battle.advance();
    battle
        .add_mark(None, PetId::new("b1"), BaseMarkId::new("brand"), None, None)
        .unwrap();
    let id = events(&mut battle)
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkApply { mark, .. } => Some(mark.clone()),
            _ => None,
        })
        .expect("mark applied");

    for _ in 0..3 {
        run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
        let turn = events(&mut battle);
        assert!(!turn.iter().any(|e| matches!(e, BattleEvent::MarkExpire { .. })));
        assert!(!turn.iter().any(|e| matches!(e, BattleEvent::MarkDestroy { .. })));
    }
    let mark = battle.mark(&id).expect("mark still on the field");
    assert_eq!(mark.duration, -1);
}

#[test]
fn test_transfer_to_missing_pet_keeps_mark() {
    let mut store = base_store();
    store
        .register_mark(MarkDef::new("curse", "Curse", MarkConfig::default()))
        .unwrap();
    let mut battle = duel(store, 29);
    battle.advance();
    battle
        .add_mark(None, PetId::new("b1"), BaseMarkId::new("curse"), None, None)
        .unwrap();
    let id = events(&mut battle)
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkApply { mark, .. } => Some(mark.clone()),
            _ => None,
        })
        .expect("mark applied");

    battle.transfer_mark(&id, &PetId::new("nobody"));
    assert!(battle.mark(&id).is_some());
    assert!(battle
        .pet(&PetId::new("b1"))
        .unwrap()
        .marks
        .iter()
        .any(|m| m.id == id));
    assert!(events(&mut battle).is_empty(), "a failed transfer is silent");
}

#[test]
fn test_attribute_modifier_follows_its_mark() {
    use tamer_battle::ModifierType;

    let mut store = base_store();
    store
        .register_mark(
            MarkDef::new(
                "ironhide",
                "Ironhide",
                MarkConfig {
                    duration: -1,
                    persistent: true,
                    ..MarkConfig::default()
                },
            )
            .with_effect(Effect::new("harden", Trigger::OnMarkCreated, 0).with_op(
                OperatorIr::AddAttributeModifier {
                    target: SelectorIr::base(BaseSelectorIr::SelfPet),
                    stat: BattleStat::Def,
                    modifier: ModifierType::Percent,
                    value: ValueIr::Number(200.0),
                    priority: 0,
                },
            )),
        )
        .unwrap();
    let mut battle = duel(store, 43);
    battle.advance();
    let pet = PetId::new("b1");
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Def), 50.0);

    battle
        .add_mark(None, pet.clone(), BaseMarkId::new("ironhide"), None, None)
        .unwrap();
    let applied = events(&mut battle);
    let id = applied
        .iter()
        .find_map(|e| match e {
            BattleEvent::MarkApply { mark, .. } => Some(mark.clone()),
            _ => None,
        })
        .expect("mark applied");
    assert!(applied.iter().any(|e| matches!(
        e,
        BattleEvent::AttributeChange {
            stat: BattleStat::Def,
            value,
            ..
        } if *value == 100.0
    )));
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Def), 100.0);

    // the modifier dies with the mark
    battle.destroy_mark(&id);
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Def), 50.0);
    assert!(battle.pet(&pet).unwrap().attribute_mods.is_empty());
}

#[test]
fn test_modify_stat_rewrites_the_base_stat() {
    let mut store = base_store();
    store
        .register_mark(
            MarkDef::new(
                "surge",
                "Surge",
                MarkConfig {
                    duration: -1,
                    persistent: true,
                    ..MarkConfig::default()
                },
            )
            .with_effect(Effect::new("surge_up", Trigger::TurnEnd, 0).with_op(
                OperatorIr::ModifyStat {
                    target: SelectorIr::base(BaseSelectorIr::SelfPet),
                    stat: BattleStat::Atk,
                    delta: Some(ValueIr::Number(20.0)),
                    percent: Some(ValueIr::Number(50.0)),
                },
            )),
        )
        .unwrap();
    let mut battle = duel(store, 43);
    battle.advance();
    let pet = PetId::new("b1");
    battle
        .add_mark(None, pet.clone(), BaseMarkId::new("surge"), None, None)
        .unwrap();
    events(&mut battle);

    run_turn(&mut battle, do_nothing("p1"), do_nothing("p2"));
    // floor((100 + 20) x 1.5) applied to the base itself
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Atk), 180.0);
    assert!(events(&mut battle).iter().any(|e| matches!(
        e,
        BattleEvent::AttributeChange {
            stat: BattleStat::Atk,
            value,
            ..
        } if *value == 180.0
    )));

    // a stage boost multiplies the rewritten base
    battle.boost_stat(&pet, BattleStat::Atk, 2);
    assert_eq!(battle.pet(&pet).unwrap().effective_stat(BattleStat::Atk), 360.0);
}

#[test]
fn test_where_filter_is_idempotent() {
    use tamer_battle::effect::evaluator::{CompareOp, EvaluatorIr};
    use tamer_battle::effect::selector::eval_selector;
    use tamer_battle::effect::value::{Extractor, RuntimeVal};
    use tamer_battle::effect::ChainStep;
    use tamer_battle::{EffectSource, ParentCtx};
    use tamer_protocol::MarkId;

    let mut battle = duel(base_store(), 5);
    battle.advance();

    let alive = ChainStep::WhereAttr {
        extract: Extractor::Hp,
        eval: EvaluatorIr::Compare {
            op: CompareOp::Gt,
            value: ValueIr::Number(0.0),
        },
    };
    let once = SelectorIr::base(BaseSelectorIr::AllPetsOnField).step(alive.clone());
    let twice = SelectorIr::base(BaseSelectorIr::AllPetsOnField)
        .step(alive.clone())
        .step(alive);

    let source = EffectSource::Mark {
        mark: MarkId::new("lens"),
        owner: Some(PetId::new("a1")),
    };
    let first = eval_selector(&mut battle, &source, &ParentCtx::Turn, &once).unwrap();
    let second = eval_selector(&mut battle, &source, &ParentCtx::Turn, &twice).unwrap();
    let RuntimeVal::Pets(first) = first else {
        panic!("expected a pet selection");
    };
    let RuntimeVal::Pets(second) = second else {
        panic!("expected a pet selection");
    };
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}
