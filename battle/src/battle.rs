//! The battle engine: entity storage, the turn state machine, and the
//! skill and damage pipelines.

use thiserror::Error;
use tracing::debug;

use tamer_protocol::{
    BaseMarkId, BaseSkillId, BattleEvent, BattleMessage, BattleStat, DamageKind, EndReason, MarkId,
    PetId, PlayerId, PlayerSelection, SkillFailReason, SkillId, SpeciesId,
};

use crate::config;
use crate::context::{
    AddMarkCtx, DamageCtx, DamageSource, EffectSource, HealCtx, ParentCtx, RageCtx, SkillCtx,
    resolve_overrides,
};
use crate::effect::{Effect, Trigger};
use crate::mark::{Mark, MarkOwner};
use crate::pet::{Pet, PetBlueprint};
use crate::player::{Player, RageReason};
use crate::rng::BattleRng;
use crate::skill::{Category, Multihit, Skill};
use crate::store::{DataStore, StoreError};
use crate::transform::{EntityRef, TransformationState, TransformationSystem};

#[derive(Debug, Error)]
pub enum BattleError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("player {0} has an empty team")]
    EmptyTeam(PlayerId),
    #[error("both players share the id {0}")]
    DuplicatePlayer(PlayerId),
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("selection not accepted in the current phase")]
    WrongPhase,
    #[error("player {0} already selected this phase")]
    AlreadySelected(PlayerId),
    #[error("pet {0} is not a valid switch target")]
    InvalidSwitchTarget(PetId),
    #[error("active pet does not know skill {0}")]
    UnknownSkill(BaseSkillId),
    #[error("a forced switch is required")]
    SwitchRequired,
    #[error("invalid team selection: {0}")]
    InvalidTeam(String),
    #[error("the battle has ended")]
    Ended,
}

/// Where the battle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    Start,
    /// Waiting for both players to pick their battle team and starter
    TeamSelection,
    /// Waiting for both players' turn actions
    Selection,
    /// Waiting for replacements after faints
    Switch,
    /// The last killer's owner may swap in a fresh pet for free
    FaintSwitch,
    Ended,
}

/// What the engine is waiting for after an [`Battle::advance`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    AwaitingTeamSelection(Vec<PlayerId>),
    AwaitingSelections(Vec<PlayerId>),
    AwaitingForcedSwitch(Vec<PlayerId>),
    AwaitingFaintSwitch(PlayerId),
    Ended {
        winner: Option<PlayerId>,
        reason: EndReason,
    },
}

/// One player's setup handed to [`Battle::new`]
#[derive(Debug, Clone)]
pub struct PlayerSetup {
    pub id: PlayerId,
    pub name: String,
    pub team: Vec<PetBlueprint>,
}

/// An ordered action within a turn
#[derive(Debug, Clone)]
enum TurnAction {
    Switch { player: usize, to: PetId },
    UseSkill { player: usize, ctx: SkillCtx },
    DoNothing,
}

pub struct Battle {
    pub store: DataStore,
    pub players: [Player; 2],
    /// Field-wide marks (weather and similar)
    pub battle_marks: Vec<Mark>,
    pub rng: BattleRng,
    pub turn: u32,
    phase: BattlePhase,
    messages: Vec<BattleMessage>,
    seq: u64,
    next_uid: u64,
    transformations: TransformationSystem,
    selections: [Option<PlayerSelection>; 2],
    pending_switch: Vec<usize>,
    pending_faint_switch: Option<usize>,
    last_killer: Option<PetId>,
    ended: Option<(Option<PlayerId>, EndReason)>,
    prompt_emitted: bool,
    team_selection_pending: bool,
}

impl Battle {
    pub fn new(
        store: DataStore,
        a: PlayerSetup,
        b: PlayerSetup,
        seed: Option<u64>,
    ) -> Result<Self, BattleError> {
        if a.id == b.id {
            return Err(BattleError::DuplicatePlayer(a.id));
        }
        let rng = match seed {
            Some(seed) => BattleRng::seeded(seed),
            None => BattleRng::from_entropy(),
        };
        let mut battle = Self {
            store,
            players: [
                Player::new(a.id.clone(), a.name.clone(), Vec::new()),
                Player::new(b.id.clone(), b.name.clone(), Vec::new()),
            ],
            battle_marks: Vec::new(),
            rng,
            turn: 0,
            phase: BattlePhase::Start,
            messages: Vec::new(),
            seq: 0,
            next_uid: 0,
            transformations: TransformationSystem::with_default_strategies(),
            selections: [None, None],
            pending_switch: Vec::new(),
            pending_faint_switch: None,
            last_killer: None,
            ended: None,
            prompt_emitted: false,
            team_selection_pending: false,
        };
        for (idx, setup) in [a, b].into_iter().enumerate() {
            if setup.team.is_empty() {
                return Err(BattleError::EmptyTeam(setup.id));
            }
            let mut team = Vec::with_capacity(setup.team.len());
            for blueprint in &setup.team {
                team.push(battle.instantiate_pet(blueprint, &setup.id)?);
            }
            battle.players[idx].team = team;
        }
        Ok(battle)
    }

    fn instantiate_pet(
        &mut self,
        blueprint: &PetBlueprint,
        owner: &PlayerId,
    ) -> Result<Pet, BattleError> {
        let species = self.store.species(&blueprint.species)?.clone();
        let mut skills = Vec::with_capacity(blueprint.skills.len());
        for base in &blueprint.skills {
            let def = self.store.skill(base)?.clone();
            let id = SkillId::new(self.fresh_uid("skill"));
            skills.push(Skill::instantiate(&def, id));
        }
        Ok(Pet::new(blueprint, &species, owner.clone(), skills))
    }

    /// Require both players to pick a battle team and starter before the
    /// first turn
    pub fn with_team_selection(mut self) -> Self {
        self.team_selection_pending = true;
        self
    }

    fn fresh_uid(&mut self, prefix: &str) -> String {
        self.next_uid += 1;
        format!("{prefix}-{}", self.next_uid)
    }

    // ---- lookups ------------------------------------------------------

    pub fn has_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn messages(&self) -> &[BattleMessage] {
        &self.messages
    }

    pub fn drain_messages(&mut self) -> Vec<BattleMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn player_index(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    pub fn player_by_id(
        &self,
        id: &PlayerId,
    ) -> Result<&Player, crate::effect::ActionError> {
        self.players
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| crate::effect::ActionError::UnknownEntity(id.to_string()))
    }

    pub fn opponent_id(
        &self,
        id: &PlayerId,
    ) -> Result<PlayerId, crate::effect::ActionError> {
        let idx = self
            .player_index(id)
            .ok_or_else(|| crate::effect::ActionError::UnknownEntity(id.to_string()))?;
        Ok(self.players[1 - idx].id.clone())
    }

    pub fn opponent_active_pet(
        &self,
        id: &PlayerId,
    ) -> Result<PetId, crate::effect::ActionError> {
        let idx = self
            .player_index(id)
            .ok_or_else(|| crate::effect::ActionError::UnknownEntity(id.to_string()))?;
        Ok(self.players[1 - idx].active_pet().id.clone())
    }

    pub fn owner_of(&self, pet: &PetId) -> Result<PlayerId, crate::effect::ActionError> {
        self.pet(pet)
            .map(|p| p.owner.clone())
            .ok_or_else(|| crate::effect::ActionError::UnknownEntity(pet.to_string()))
    }

    pub fn pet(&self, id: &PetId) -> Option<&Pet> {
        self.players.iter().find_map(|p| p.pet(id))
    }

    pub fn pet_mut(&mut self, id: &PetId) -> Option<&mut Pet> {
        self.players.iter_mut().find_map(|p| p.pet_mut(id))
    }

    pub fn active_pet_ids(&self) -> Vec<PetId> {
        self.players
            .iter()
            .map(|p| p.active_pet().id.clone())
            .collect()
    }

    pub fn marks_on(&self, pet: &PetId) -> Vec<MarkId> {
        self.pet(pet)
            .map(|p| {
                p.marks
                    .iter()
                    .filter(|m| m.active)
                    .map(|m| m.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn mark(&self, id: &MarkId) -> Option<&Mark> {
        self.battle_marks
            .iter()
            .find(|m| &m.id == id)
            .or_else(|| {
                self.players
                    .iter()
                    .flat_map(|p| p.team.iter())
                    .flat_map(|pet| pet.marks.iter())
                    .find(|m| &m.id == id)
            })
    }

    pub fn mark_mut(&mut self, id: &MarkId) -> Option<&mut Mark> {
        if self.battle_marks.iter().any(|m| &m.id == id) {
            return self.battle_marks.iter_mut().find(|m| &m.id == id);
        }
        self.players
            .iter_mut()
            .flat_map(|p| p.team.iter_mut())
            .flat_map(|pet| pet.marks.iter_mut())
            .find(|m| &m.id == id)
    }

    pub fn mark_owner_pet(&self, id: &MarkId) -> Option<PetId> {
        match &self.mark(id)?.owner {
            MarkOwner::Pet(pet) => Some(pet.clone()),
            MarkOwner::Battle => None,
        }
    }

    pub fn find_skill(&self, id: &SkillId) -> Option<&Skill> {
        self.players
            .iter()
            .flat_map(|p| p.team.iter())
            .flat_map(|pet| pet.skills.iter())
            .find(|s| &s.id == id)
    }

    pub fn find_skill_mut(&mut self, id: &SkillId) -> Option<&mut Skill> {
        self.players
            .iter_mut()
            .flat_map(|p| p.team.iter_mut())
            .flat_map(|pet| pet.skills.iter_mut())
            .find(|s| &s.id == id)
    }

    pub fn emit(&mut self, event: BattleEvent) {
        self.seq += 1;
        debug!(seq = self.seq, ?event, "battle event");
        self.messages.push(BattleMessage {
            seq: self.seq,
            event,
        });
    }

    // ---- state machine ------------------------------------------------

    /// Validate and store a player's selection for the current phase
    pub fn submit(&mut self, selection: PlayerSelection) -> Result<(), SelectionError> {
        if self.has_ended() {
            return Err(SelectionError::Ended);
        }
        let player_id = selection.player().clone();
        let idx = self
            .player_index(&player_id)
            .ok_or(SelectionError::UnknownPlayer(player_id.clone()))?;

        let result = self.validate_selection(idx, &selection);
        if let Err(err) = &result {
            self.emit(BattleEvent::InvalidAction {
                player: player_id,
                reason: err.to_string(),
            });
            return result;
        }
        self.selections[idx] = Some(selection);
        Ok(())
    }

    fn validate_selection(
        &self,
        idx: usize,
        selection: &PlayerSelection,
    ) -> Result<(), SelectionError> {
        match self.phase {
            BattlePhase::Selection => {
                if self.selections[idx].is_some() {
                    return Err(SelectionError::AlreadySelected(
                        self.players[idx].id.clone(),
                    ));
                }
                match selection {
                    PlayerSelection::UseSkill { skill, .. } => {
                        let pet = self.players[idx].active_pet();
                        if pet.skill_by_base(skill).is_none() {
                            return Err(SelectionError::UnknownSkill(skill.clone()));
                        }
                        Ok(())
                    }
                    PlayerSelection::SwitchPet { pet, .. } => {
                        self.validate_switch_target(idx, pet)
                    }
                    PlayerSelection::DoNothing { .. } | PlayerSelection::Surrender { .. } => Ok(()),
                    PlayerSelection::TeamSelection { .. } => Err(SelectionError::WrongPhase),
                }
            }
            BattlePhase::Switch => {
                if !self.pending_switch.contains(&idx) {
                    return Err(SelectionError::WrongPhase);
                }
                if self.selections[idx].is_some() {
                    return Err(SelectionError::AlreadySelected(
                        self.players[idx].id.clone(),
                    ));
                }
                match selection {
                    PlayerSelection::SwitchPet { pet, .. } => {
                        self.validate_switch_target(idx, pet)
                    }
                    _ => Err(SelectionError::SwitchRequired),
                }
            }
            BattlePhase::FaintSwitch => {
                if self.pending_faint_switch != Some(idx) {
                    return Err(SelectionError::WrongPhase);
                }
                match selection {
                    PlayerSelection::SwitchPet { pet, .. } => {
                        self.validate_switch_target(idx, pet)
                    }
                    PlayerSelection::DoNothing { .. } => Ok(()),
                    _ => Err(SelectionError::WrongPhase),
                }
            }
            BattlePhase::TeamSelection => {
                if self.selections[idx].is_some() {
                    return Err(SelectionError::AlreadySelected(
                        self.players[idx].id.clone(),
                    ));
                }
                let PlayerSelection::TeamSelection {
                    selected_pets,
                    starter_pet_id,
                    ..
                } = selection
                else {
                    return Err(SelectionError::WrongPhase);
                };
                if selected_pets.is_empty() {
                    return Err(SelectionError::InvalidTeam("no pets selected".into()));
                }
                let player = &self.players[idx];
                for pet in selected_pets {
                    if player.pet(pet).is_none() {
                        return Err(SelectionError::InvalidTeam(format!(
                            "pet {pet} is not on the roster"
                        )));
                    }
                }
                if !selected_pets.contains(starter_pet_id) {
                    return Err(SelectionError::InvalidTeam(
                        "starter is not among the selected pets".into(),
                    ));
                }
                Ok(())
            }
            BattlePhase::Start | BattlePhase::Ended => Err(SelectionError::WrongPhase),
        }
    }

    fn validate_switch_target(&self, idx: usize, pet: &PetId) -> Result<(), SelectionError> {
        let player = &self.players[idx];
        match player.pet_index(pet) {
            Some(i) if i != player.active || !player.active_pet().is_alive() => {
                if player.team[i].is_alive() {
                    Ok(())
                } else {
                    Err(SelectionError::InvalidSwitchTarget(pet.clone()))
                }
            }
            _ => Err(SelectionError::InvalidSwitchTarget(pet.clone())),
        }
    }

    /// Drive the battle as far as it can go without further input
    pub fn advance(&mut self) -> Advance {
        loop {
            if let Some((winner, reason)) = self.ended.clone() {
                self.phase = BattlePhase::Ended;
                return Advance::Ended { winner, reason };
            }
            match self.phase {
                BattlePhase::Start => {
                    if self.team_selection_pending {
                        self.phase = BattlePhase::TeamSelection;
                    } else {
                        self.start();
                    }
                }
                BattlePhase::TeamSelection => {
                    let missing: Vec<PlayerId> = self
                        .selections
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_none())
                        .map(|(i, _)| self.players[i].id.clone())
                        .collect();
                    if !missing.is_empty() {
                        if !self.prompt_emitted {
                            self.prompt_emitted = true;
                            self.emit(BattleEvent::TeamSelection {
                                players: missing.clone(),
                            });
                        }
                        return Advance::AwaitingTeamSelection(missing);
                    }
                    self.prompt_emitted = false;
                    for idx in 0..2 {
                        if let Some(PlayerSelection::TeamSelection {
                            selected_pets,
                            starter_pet_id,
                            ..
                        }) = self.selections[idx].take()
                        {
                            self.apply_team_selection(idx, &selected_pets, &starter_pet_id);
                        }
                    }
                    self.team_selection_pending = false;
                    self.start();
                }
                BattlePhase::Selection => {
                    if let Some(surrender_idx) = self.find_surrender() {
                        self.end_battle(
                            Some(self.players[1 - surrender_idx].id.clone()),
                            EndReason::Surrender,
                        );
                        continue;
                    }
                    let missing: Vec<PlayerId> = self
                        .selections
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_none())
                        .map(|(i, _)| self.players[i].id.clone())
                        .collect();
                    if !missing.is_empty() {
                        if !self.prompt_emitted {
                            self.prompt_emitted = true;
                            self.emit(BattleEvent::TurnAction {
                                players: missing.clone(),
                            });
                        }
                        return Advance::AwaitingSelections(missing);
                    }
                    self.prompt_emitted = false;
                    self.perform_turn();
                    self.after_turn_transition();
                }
                BattlePhase::Switch => {
                    let missing: Vec<PlayerId> = self
                        .pending_switch
                        .iter()
                        .filter(|&&i| self.selections[i].is_none())
                        .map(|&i| self.players[i].id.clone())
                        .collect();
                    if !missing.is_empty() {
                        if !self.prompt_emitted {
                            self.prompt_emitted = true;
                            self.emit(BattleEvent::ForcedSwitch {
                                players: missing.clone(),
                            });
                        }
                        return Advance::AwaitingForcedSwitch(missing);
                    }
                    self.prompt_emitted = false;
                    for idx in std::mem::take(&mut self.pending_switch) {
                        if let Some(PlayerSelection::SwitchPet { pet, .. }) =
                            self.selections[idx].take()
                        {
                            self.switch_pet(idx, &pet, false);
                        }
                    }
                    self.after_turn_transition();
                }
                BattlePhase::FaintSwitch => {
                    let Some(idx) = self.pending_faint_switch else {
                        self.phase = BattlePhase::Selection;
                        continue;
                    };
                    let Some(selection) = self.selections[idx].take() else {
                        if !self.prompt_emitted {
                            self.prompt_emitted = true;
                            self.emit(BattleEvent::FaintSwitch {
                                player: self.players[idx].id.clone(),
                            });
                        }
                        return Advance::AwaitingFaintSwitch(self.players[idx].id.clone());
                    };
                    self.prompt_emitted = false;
                    self.pending_faint_switch = None;
                    if let PlayerSelection::SwitchPet { pet, .. } = selection {
                        self.switch_pet(idx, &pet, false);
                    }
                    self.phase = BattlePhase::Selection;
                }
                BattlePhase::Ended => {
                    let (winner, reason) = self
                        .ended
                        .clone()
                        .unwrap_or((None, EndReason::AllPetFainted));
                    return Advance::Ended { winner, reason };
                }
            }
        }
    }

    fn find_surrender(&self) -> Option<usize> {
        self.selections.iter().position(|s| {
            matches!(s, Some(PlayerSelection::Surrender { .. }))
        })
    }

    /// Forfeit by walkover: the player's whole team faints
    pub fn abandon(&mut self, player: &PlayerId) {
        let Some(idx) = self.player_index(player) else {
            return;
        };
        for pet in &mut self.players[idx].team {
            pet.current_hp = 0;
        }
        self.players[idx].surrendered = true;
        self.end_battle(Some(self.players[1 - idx].id.clone()), EndReason::Abandon);
        self.phase = BattlePhase::Ended;
    }

    /// Narrow the roster to the selected pets and put the starter in front
    fn apply_team_selection(&mut self, idx: usize, selected: &[PetId], starter: &PetId) {
        let player = &mut self.players[idx];
        let mut team: Vec<Pet> = Vec::with_capacity(selected.len());
        for id in selected {
            if let Some(pos) = player.team.iter().position(|p| &p.id == id) {
                team.push(player.team.remove(pos));
            }
        }
        player.team = team;
        player.active = player.pet_index(starter).unwrap_or(0);
    }

    fn start(&mut self) {
        self.emit(BattleEvent::BattleStart {
            players: self.players.iter().map(|p| p.id.clone()).collect(),
        });
        self.apply_effects(Trigger::OnBattleStart, &mut ParentCtx::Battle);
        self.phase = BattlePhase::Selection;
    }

    fn after_turn_transition(&mut self) {
        if self.check_battle_end() {
            return;
        }
        self.pending_switch = (0..2)
            .filter(|&i| self.players[i].needs_forced_switch())
            .collect();
        if !self.pending_switch.is_empty() {
            self.phase = BattlePhase::Switch;
            return;
        }
        // the opposing player of a defeated pet may swap in for free
        if let Some(killer) = self.last_killer.take() {
            if let Ok(owner) = self.owner_of(&killer) {
                let idx = self.player_index(&owner).unwrap_or(0);
                let player = &self.players[idx];
                if player.active_pet().is_alive() && !player.switch_candidates().is_empty() {
                    self.pending_faint_switch = Some(idx);
                    self.phase = BattlePhase::FaintSwitch;
                    return;
                }
            }
        }
        self.phase = BattlePhase::Selection;
    }

    fn check_battle_end(&mut self) -> bool {
        let alive: Vec<bool> = self.players.iter().map(|p| p.has_alive_pet()).collect();
        match (alive[0], alive[1]) {
            (true, true) => false,
            (true, false) => {
                self.end_battle(Some(self.players[0].id.clone()), EndReason::AllPetFainted);
                true
            }
            (false, true) => {
                self.end_battle(Some(self.players[1].id.clone()), EndReason::AllPetFainted);
                true
            }
            (false, false) => {
                self.end_battle(None, EndReason::AllPetFainted);
                true
            }
        }
    }

    fn end_battle(&mut self, winner: Option<PlayerId>, reason: EndReason) {
        if self.ended.is_some() {
            return;
        }
        self.ended = Some((winner.clone(), reason));
        self.emit(BattleEvent::BattleEnd { winner, reason });
    }

    // ---- turn execution -----------------------------------------------

    fn perform_turn(&mut self) {
        self.turn += 1;
        self.emit(BattleEvent::TurnStart { turn: self.turn });
        self.apply_effects(Trigger::TurnStart, &mut ParentCtx::Turn);

        let mut actions = self.build_actions();
        self.sort_actions(&mut actions);

        // first/last flags count skill actions only, not switches or passes
        let skill_indices: Vec<usize> = actions
            .iter()
            .enumerate()
            .filter(|(_, a)| matches!(a, TurnAction::UseSkill { .. }))
            .map(|(i, _)| i)
            .collect();
        let first_skill = skill_indices.first().copied();
        let last_skill = skill_indices.last().copied();
        for (i, action) in actions.into_iter().enumerate() {
            if self.has_ended() {
                break;
            }
            // a faint interrupts the rest of the turn
            if self.players.iter().any(|p| !p.active_pet().is_alive()) {
                break;
            }
            match action {
                TurnAction::Switch { player, to } => {
                    self.switch_pet(player, &to, true);
                }
                TurnAction::UseSkill { player, mut ctx } => {
                    ctx.first_of_turn = first_skill == Some(i);
                    ctx.last_of_turn = last_skill == Some(i);
                    self.use_skill(player, ctx);
                }
                TurnAction::DoNothing => {}
            }
        }

        if !self.has_ended() {
            self.apply_effects(Trigger::TurnEnd, &mut ParentCtx::Turn);
            for idx in 0..2 {
                let id = self.players[idx].id.clone();
                self.add_rage(&id, config::RAGE_PER_TURN as i32, RageReason::TurnIncome);
            }
            self.update_mark_durations();
            self.emit(BattleEvent::TurnEnd { turn: self.turn });
            self.check_battle_end();
        }

        self.selections = [None, None];
    }

    fn build_actions(&mut self) -> Vec<TurnAction> {
        let mut actions = Vec::new();
        for idx in 0..2 {
            let Some(selection) = self.selections[idx].clone() else {
                continue;
            };
            match selection {
                PlayerSelection::SwitchPet { pet, .. } => {
                    actions.push(TurnAction::Switch {
                        player: idx,
                        to: pet,
                    });
                }
                PlayerSelection::UseSkill { skill, target, .. } => {
                    if let Some(ctx) = self.build_skill_ctx(idx, &skill, target) {
                        actions.push(TurnAction::UseSkill { player: idx, ctx });
                    }
                }
                PlayerSelection::DoNothing { .. } => actions.push(TurnAction::DoNothing),
                PlayerSelection::Surrender { .. } | PlayerSelection::TeamSelection { .. } => {}
            }
        }
        actions
    }

    fn build_skill_ctx(
        &mut self,
        player_idx: usize,
        base: &BaseSkillId,
        target: PetId,
    ) -> Option<SkillCtx> {
        let player = &self.players[player_idx];
        let pet = player.active_pet();
        let skill = pet.skill_by_base(base)?.clone();
        let crit_rate = pet.effective_stat(BattleStat::CritRate);
        let mut ctx = SkillCtx {
            player: player.id.clone(),
            user: pet.id.clone(),
            skill: skill.id.clone(),
            base: skill.base.clone(),
            available: true,
            priority: skill.priority,
            category: skill.category,
            element: skill.element,
            power: skill.power,
            accuracy: skill.accuracy,
            rage_cost: skill.rage_cost,
            crit_rate,
            actual_target: Some(target),
            hit_overrides: Vec::new(),
            crit_overrides: Vec::new(),
            multihit: skill.multihit,
            multihit_result: 1,
            ignore_shield: skill.ignore_shield,
            hit: false,
            crit: false,
            first_of_turn: false,
            last_of_turn: false,
        };
        if skill.sure_hit {
            ctx.hit_overrides.push(crate::context::Override {
                value: true,
                priority: i32::MIN,
            });
        }
        if skill.sure_crit {
            ctx.crit_overrides.push(crate::context::Override {
                value: true,
                priority: i32::MIN,
            });
        }
        // priority-altering effects run before ordering
        self.apply_effects(Trigger::BeforeSort, &mut ParentCtx::Skill(&mut ctx));
        Some(ctx)
    }

    fn sort_actions(&mut self, actions: &mut Vec<TurnAction>) {
        // switches resolve before skills; skills by priority, then speed,
        // then a coin flip
        let rank = |battle: &Battle, action: &TurnAction| -> (i32, i32, f64) {
            match action {
                TurnAction::Switch { .. } => (0, 0, 0.0),
                TurnAction::UseSkill { player, ctx } => {
                    let speed = battle.players[*player].active_pet().effective_speed();
                    (1, -ctx.priority, -speed)
                }
                TurnAction::DoNothing => (2, 0, 0.0),
            }
        };
        if actions.len() == 2 {
            let a = rank(self, &actions[0]);
            let b = rank(self, &actions[1]);
            let swap = match a.0.cmp(&b.0).then(a.1.cmp(&b.1)) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => {
                    if a.2 < b.2 {
                        false
                    } else if a.2 > b.2 {
                        true
                    } else {
                        self.rng.coin_flip()
                    }
                }
            };
            if swap {
                actions.swap(0, 1);
            }
        }
    }

    fn use_skill(&mut self, player_idx: usize, mut ctx: SkillCtx) {
        let user = ctx.user.clone();
        let base = ctx.base.clone();

        // the pet may have been switched out since selection
        if self.players[player_idx].active_pet().id != user {
            return;
        }
        if self.players[player_idx].active_pet().stunned {
            self.players[player_idx].active_pet_mut().stunned = false;
            self.emit(BattleEvent::SkillUseFail {
                user,
                skill: ctx.skill.clone(),
                reason: SkillFailReason::Disabled,
            });
            return;
        }

        self.apply_effects(Trigger::BeforeUseSkillCheck, &mut ParentCtx::Skill(&mut ctx));
        if !ctx.available {
            self.emit(BattleEvent::SkillUseFail {
                user,
                skill: ctx.skill.clone(),
                reason: SkillFailReason::Disabled,
            });
            return;
        }
        if self.players[player_idx].rage < ctx.rage_cost {
            self.emit(BattleEvent::SkillUseFail {
                user,
                skill: ctx.skill.clone(),
                reason: SkillFailReason::NoRage,
            });
            return;
        }

        let target = match ctx.actual_target.clone() {
            Some(t) if self.pet(&t).is_some_and(|p| p.is_alive()) => t,
            _ => {
                self.emit(BattleEvent::SkillUseFail {
                    user,
                    skill: ctx.skill.clone(),
                    reason: SkillFailReason::NoTarget,
                });
                return;
            }
        };

        // consecutive-use bookkeeping
        {
            let pet = self.players[player_idx].active_pet_mut();
            pet.skill_streak = match pet.skill_streak.take() {
                Some((streak_base, count)) if streak_base == base => {
                    Some((streak_base, count + 1))
                }
                _ => Some((base.clone(), 1)),
            };
            pet.last_skill = Some(ctx.skill.clone());
        }

        self.emit(BattleEvent::SkillUse {
            user: user.clone(),
            target: target.clone(),
            skill: ctx.skill.clone(),
            rage_cost: ctx.rage_cost,
        });
        let player_id = self.players[player_idx].id.clone();
        self.add_rage(&player_id, -(ctx.rage_cost as i32), RageReason::SkillCost);

        // one hit roll and one crit roll cover the whole use
        ctx.hit = match resolve_overrides(&ctx.hit_overrides) {
            Some(v) => v,
            None => {
                let user_accuracy =
                    self.pet(&user).map_or(100.0, |p| p.effective_stat(BattleStat::Accuracy));
                let evasion =
                    self.pet(&target).map_or(0.0, |p| p.effective_stat(BattleStat::Evasion));
                let percent =
                    ctx.accuracy * (user_accuracy / 100.0) * ((100.0 - evasion) / 100.0);
                self.rng.chance(percent)
            }
        };
        ctx.multihit_result = match ctx.multihit {
            Multihit::Fixed(n) => n.max(1),
            Multihit::Range(min, max) => self.rng.range(min.max(1), max),
        };
        ctx.crit = match resolve_overrides(&ctx.crit_overrides) {
            Some(v) => v,
            None => self.rng.chance(ctx.crit_rate),
        };

        self.apply_effects(Trigger::AfterUseSkillCheck, &mut ParentCtx::Skill(&mut ctx));
        if !ctx.available {
            self.emit(BattleEvent::SkillUseFail {
                user,
                skill: ctx.skill.clone(),
                reason: SkillFailReason::Disabled,
            });
            return;
        }

        if !ctx.hit {
            self.emit(BattleEvent::SkillMiss {
                user: user.clone(),
                target: target.clone(),
                skill: ctx.skill.clone(),
            });
            self.apply_effects(Trigger::OnMiss, &mut ParentCtx::Skill(&mut ctx));
        } else {
            let mut landed = false;
            for _ in 0..ctx.multihit_result {
                if !self.pet(&target).is_some_and(|p| p.is_alive()) {
                    break;
                }
                self.apply_effects(Trigger::BeforeHit, &mut ParentCtx::Skill(&mut ctx));
                if !ctx.available {
                    break;
                }
                if ctx.category != Category::Status && ctx.power > 0 {
                    let value = self.compute_skill_damage(&ctx, &target);
                    let mut damage = DamageCtx {
                        source: DamageSource::Skill {
                            skill: ctx.skill.clone(),
                            user: user.clone(),
                        },
                        target: target.clone(),
                        value,
                        kind: match ctx.category {
                            Category::Special => DamageKind::Special,
                            _ => DamageKind::Physical,
                        },
                        crit: ctx.crit,
                        effectiveness: self.effectiveness(&ctx, &target),
                        ignore_shield: ctx.ignore_shield,
                        available: true,
                        modified: (0.0, 0.0),
                        min_threshold: None,
                        max_threshold: None,
                    };
                    let dealt = self.run_damage_pipeline(&mut damage, Some(&ctx));
                    if dealt > 0 {
                        landed = true;
                    }
                }
                self.apply_effects(Trigger::OnHit, &mut ParentCtx::Skill(&mut ctx));
            }
            if landed {
                let player_id = self.players[player_idx].id.clone();
                self.add_rage(&player_id, config::RAGE_ON_HIT as i32, RageReason::SkillHit);
            }
        }

        self.emit(BattleEvent::SkillUseEnd {
            user,
            skill: ctx.skill.clone(),
        });
    }

    fn effectiveness(&self, ctx: &SkillCtx, target: &PetId) -> f64 {
        self.pet(target)
            .map(|t| ctx.element.effectiveness(t.element))
            .unwrap_or(1.0)
    }

    fn compute_skill_damage(&mut self, ctx: &SkillCtx, target: &PetId) -> f64 {
        let Some(user) = self.pet(&ctx.user) else {
            return 0.0;
        };
        let Some(defender) = self.pet(target) else {
            return 0.0;
        };
        let (attack, defense) = match ctx.category {
            Category::Physical => (
                user.effective_stat(BattleStat::Atk),
                defender.effective_stat(BattleStat::Def),
            ),
            Category::Special => (
                user.effective_stat(BattleStat::Spa),
                defender.effective_stat(BattleStat::Spd),
            ),
            Category::Climax => {
                let physical = user.effective_stat(BattleStat::Atk);
                let special = user.effective_stat(BattleStat::Spa);
                if physical >= special {
                    (physical, defender.effective_stat(BattleStat::Def))
                } else {
                    (special, defender.effective_stat(BattleStat::Spd))
                }
            }
            Category::Status => return 0.0,
        };
        let level = user.level as f64;
        let stab = if user.element == ctx.element {
            config::STAB_MULTIPLIER
        } else {
            1.0
        };
        let effectiveness = ctx.element.effectiveness(defender.element);
        let crit = if ctx.crit { config::CRIT_MULTIPLIER } else { 1.0 };

        let base = ((2.0 * level / 5.0 + 2.0) * ctx.power as f64 * (attack / defense) / 50.0
            + 2.0)
            .floor();
        let spread = 0.85 + self.rng.unit() * 0.15;
        (base * effectiveness * stab * crit * spread).floor()
    }

    // ---- damage / heal / rage pipelines -------------------------------

    /// Damage caused by an effect operator rather than a skill hit
    pub fn deal_effect_damage(&mut self, source: DamageSource, target: PetId, amount: f64) {
        if !self.pet(&target).is_some_and(|p| p.is_alive()) {
            self.emit(BattleEvent::DamageFail {
                target,
                reason: "fainted".into(),
            });
            return;
        }
        let mut damage = DamageCtx {
            source,
            target,
            value: amount.max(0.0),
            kind: DamageKind::Effect,
            crit: false,
            effectiveness: 1.0,
            ignore_shield: false,
            available: true,
            modified: (0.0, 0.0),
            min_threshold: None,
            max_threshold: None,
        };
        self.run_damage_pipeline(&mut damage, None);
    }

    fn run_damage_pipeline(&mut self, damage: &mut DamageCtx, skill: Option<&SkillCtx>) -> u32 {
        if damage.crit {
            self.apply_effects(
                Trigger::OnCritPreDamage,
                &mut ParentCtx::Damage { damage: &mut *damage, skill },
            );
        }
        self.apply_effects(Trigger::PreDamage, &mut ParentCtx::Damage { damage: &mut *damage, skill });
        if !damage.available {
            self.emit(BattleEvent::DamageFail {
                target: damage.target.clone(),
                reason: "prevented".into(),
            });
            return 0;
        }
        self.apply_effects(Trigger::OnDamage, &mut ParentCtx::Damage { damage: &mut *damage, skill });

        let mut remaining = damage.final_damage();

        if !damage.ignore_shield && remaining > 0 {
            self.apply_effects(Trigger::Shield, &mut ParentCtx::Damage { damage: &mut *damage, skill });
            remaining = self.absorb_with_shields(&damage.target, remaining);
        }

        let target = damage.target.clone();
        let (dealt, current_hp, max_hp) = {
            let Some(pet) = self.pet_mut(&target) else {
                return 0;
            };
            let dealt = pet.apply_damage(remaining);
            (dealt, pet.current_hp, pet.stats.max_hp)
        };

        self.emit(BattleEvent::Damage {
            source: damage.source.source_pet().cloned(),
            target: target.clone(),
            damage: dealt,
            current_hp,
            max_hp,
            is_crit: damage.crit,
            effectiveness: damage.effectiveness,
            kind: damage.kind,
        });

        if dealt > 0 {
            let defender_owner = self.owner_of(&target).ok();
            if let Some(owner) = defender_owner {
                let gained = (dealt as f64 * config::RAGE_PER_DAMAGE).floor() as i32;
                if gained > 0 {
                    self.add_rage(&owner, gained, RageReason::DamageTaken);
                }
            }
        }

        self.apply_effects(Trigger::PostDamage, &mut ParentCtx::Damage { damage: &mut *damage, skill });
        if damage.crit {
            self.apply_effects(
                Trigger::OnCritPostDamage,
                &mut ParentCtx::Damage { damage: &mut *damage, skill },
            );
        }

        if current_hp == 0 {
            self.handle_defeat(&target, damage.source.source_pet().cloned());
        }
        dealt
    }

    fn absorb_with_shields(&mut self, target: &PetId, mut damage: u32) -> u32 {
        let shield_ids: Vec<MarkId> = self
            .pet(target)
            .map(|p| {
                p.marks
                    .iter()
                    .filter(|m| m.active && m.config.is_shield && m.stack > 0)
                    .map(|m| m.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        for id in shield_ids {
            if damage == 0 {
                break;
            }
            let absorbed = {
                let Some(mark) = self.mark_mut(&id) else {
                    continue;
                };
                mark.consume_stacks(damage.min(mark.stack))
            };
            damage -= absorbed;
            let depleted = self.mark(&id).is_some_and(|m| m.stack == 0);
            if depleted {
                self.destroy_mark_forced(&id);
            } else if let Some(mark) = self.mark(&id) {
                let (stack, duration) = (mark.stack, mark.duration);
                self.emit(BattleEvent::MarkUpdate {
                    mark: id,
                    stack,
                    duration,
                });
            }
        }
        damage
    }

    fn handle_defeat(&mut self, pet: &PetId, killer: Option<PetId>) {
        self.emit(BattleEvent::PetDefeated {
            pet: pet.clone(),
            killer: killer.clone(),
        });
        self.apply_effects(Trigger::OnDefeat, &mut ParentCtx::Battle);
        if killer.as_ref().is_some_and(|k| self.pet(k).is_some()) {
            self.last_killer = killer;
        }
        // marks that do not transfer to the next pet die with this one
        let doomed: Vec<MarkId> = self
            .pet(pet)
            .map(|p| {
                p.marks
                    .iter()
                    .filter(|m| !m.config.inherit_on_faint)
                    .map(|m| m.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        for id in doomed {
            self.destroy_mark_forced(&id);
        }
    }

    pub fn heal_pet(&mut self, source: Option<PetId>, target: PetId, amount: f64) {
        if !self.pet(&target).is_some_and(|p| p.is_alive()) {
            self.emit(BattleEvent::HealFail {
                target,
                reason: "fainted".into(),
            });
            return;
        }
        let mut ctx = HealCtx {
            source,
            target: target.clone(),
            value: amount.max(0.0),
            available: true,
            modified: (0.0, 0.0),
        };
        self.apply_effects(Trigger::OnHeal, &mut ParentCtx::Heal(&mut ctx));
        if !ctx.available {
            self.emit(BattleEvent::HealFail {
                target,
                reason: "prevented".into(),
            });
            return;
        }
        let amount = ctx.final_amount();
        let (healed, current_hp) = {
            let Some(pet) = self.pet_mut(&target) else {
                return;
            };
            let healed = pet.apply_heal(amount);
            (healed, pet.current_hp)
        };
        self.emit(BattleEvent::Heal {
            target,
            amount: healed,
            current_hp,
        });
    }

    pub fn add_rage(&mut self, player: &PlayerId, delta: i32, reason: RageReason) {
        if delta == 0 {
            return;
        }
        let mut ctx = RageCtx {
            player: player.clone(),
            delta,
            reason,
            available: true,
            modified: (0.0, 0.0),
        };
        let trigger = if delta > 0 {
            Trigger::OnRageGain
        } else {
            Trigger::OnRageLoss
        };
        self.apply_effects(trigger, &mut ParentCtx::Rage(&mut ctx));
        if !ctx.available {
            return;
        }
        let final_delta = ctx.final_delta();
        let Some(idx) = self.player_index(player) else {
            return;
        };
        let (before, after) = self.players[idx].adjust_rage(final_delta);
        if before != after {
            self.emit(BattleEvent::RageChange {
                player: player.clone(),
                before,
                after,
                reason: reason.as_str().to_string(),
            });
        }
    }

    // ---- marks --------------------------------------------------------

    pub fn add_mark(
        &mut self,
        applier: Option<PetId>,
        target: PetId,
        base: BaseMarkId,
        stack: Option<u32>,
        duration: Option<i32>,
    ) -> Result<(), crate::effect::ActionError> {
        let def = self
            .store
            .mark(&base)
            .map_err(|e| crate::effect::ActionError::UnknownEntity(e.to_string()))?
            .clone();
        let mut ctx = AddMarkCtx {
            target: target.clone(),
            applier,
            base: base.clone(),
            stack: stack.unwrap_or(1).max(1),
            duration: duration.unwrap_or(def.config.duration),
            config: def.config.clone(),
            available: true,
        };
        self.apply_effects(Trigger::OnBeforeAddMark, &mut ParentCtx::AddMark(&mut ctx));
        if !ctx.available {
            return Ok(());
        }

        // merge into an existing instance of the same base, if any
        let existing = self
            .pet(&ctx.target)
            .and_then(|p| p.marks.iter().find(|m| m.active && m.base == ctx.base))
            .map(|m| m.id.clone());
        if let Some(id) = existing {
            let outcome = {
                let Some(mark) = self.mark_mut(&id) else {
                    return Ok(());
                };
                match mark.try_stack(ctx.stack, ctx.duration) {
                    Some(outcome) => outcome,
                    None => {
                        // unstackable marks refresh their duration
                        mark.duration = mark.duration.max(ctx.duration);
                        crate::mark::StackOutcome {
                            stack: mark.stack,
                            duration: mark.duration,
                            changed: true,
                        }
                    }
                }
            };
            self.emit(BattleEvent::MarkUpdate {
                mark: id.clone(),
                stack: outcome.stack,
                duration: outcome.duration,
            });
            self.apply_effects(Trigger::OnStack, &mut ParentCtx::Stack { mark: id });
            return Ok(());
        }

        let id = MarkId::new(self.fresh_uid("mark"));
        let mut mark = Mark::instantiate(&def, id.clone(), MarkOwner::Pet(ctx.target.clone()));
        mark.config = ctx.config.clone();
        mark.stack = ctx.stack.min(mark.config.max_stacks);
        mark.duration = ctx.duration;
        let (stack, duration) = (mark.stack, mark.duration);
        let stat_stage = mark.stat_stage;

        let Some(pet) = self.pet_mut(&ctx.target) else {
            return Ok(());
        };
        pet.marks.push(mark);

        self.emit(BattleEvent::MarkApply {
            base,
            mark: id.clone(),
            target: ctx.target.clone(),
            stack,
            duration,
        });
        if let Some((stat, per_stack)) = stat_stage {
            let delta = per_stack.saturating_mul(stack.min(i8::MAX as u32) as i8);
            self.boost_stat(&ctx.target.clone(), stat, delta);
        }
        self.apply_effects(Trigger::OnMarkCreated, &mut ParentCtx::Battle);
        self.apply_effects(Trigger::OnAddMark, &mut ParentCtx::AddMark(&mut ctx));
        Ok(())
    }

    /// Destroy a mark through effects; indestructible marks shrug it off
    pub fn destroy_mark(&mut self, id: &MarkId) {
        if self.mark(id).is_some_and(|m| !m.config.destroyable) {
            return;
        }
        self.destroy_mark_forced(id);
    }

    fn destroy_mark_forced(&mut self, id: &MarkId) {
        let Some(mark) = self.mark(id) else {
            return;
        };
        let owner = mark.owner.clone();
        let stat_stage = mark.stat_stage;
        let stack = mark.stack;

        self.apply_effects(
            Trigger::OnMarkDestroy,
            &mut ParentCtx::RemoveMark { mark: id.clone() },
        );
        self.apply_effects(
            Trigger::OnRemoveMark,
            &mut ParentCtx::RemoveMark { mark: id.clone() },
        );

        let target = match &owner {
            MarkOwner::Pet(pet) => Some(pet.clone()),
            MarkOwner::Battle => None,
        };
        match &owner {
            MarkOwner::Pet(pet_id) => {
                if let Some(pet) = self.pet_mut(pet_id) {
                    pet.marks.retain(|m| &m.id != id);
                }
            }
            MarkOwner::Battle => {
                self.battle_marks.retain(|m| &m.id != id);
            }
        }
        if let (Some(target), Some((stat, per_stack))) = (&target, stat_stage) {
            let delta = per_stack.saturating_mul(stack.min(i8::MAX as u32) as i8);
            self.boost_stat(&target.clone(), stat, -delta);
        }
        // modifiers die with the mark that added them
        for player in self.players.iter_mut() {
            for pet in player.team.iter_mut() {
                pet.clear_mark_modifiers(id);
            }
        }
        self.emit(BattleEvent::MarkDestroy {
            mark: id.clone(),
            target: target.unwrap_or_else(|| PetId::new("")),
        });
        self.cleanup_mark_transformations(id);
    }

    pub fn transfer_mark(&mut self, id: &MarkId, to: &PetId) {
        // never detach into the void
        if self.pet(to).is_none() {
            return;
        }
        let Some(mut mark) = ({
            let mut taken = None;
            for player in self.players.iter_mut() {
                for pet in player.team.iter_mut() {
                    if let Some(pos) = pet.marks.iter().position(|m| &m.id == id) {
                        taken = Some(pet.marks.remove(pos));
                        break;
                    }
                }
            }
            taken
        }) else {
            return;
        };
        mark.owner = MarkOwner::Pet(to.clone());
        let (base, stack, duration) = (mark.base.clone(), mark.stack, mark.duration);
        if let Some(pet) = self.pet_mut(to) {
            pet.marks.push(mark);
            self.emit(BattleEvent::MarkApply {
                base,
                mark: id.clone(),
                target: to.clone(),
                stack,
                duration,
            });
        }
    }

    pub fn add_mark_stacks(&mut self, id: &MarkId, amount: u32) {
        let Some(mark) = self.mark_mut(id) else {
            return;
        };
        mark.add_stacks(amount);
        let (stack, duration) = (mark.stack, mark.duration);
        self.emit(BattleEvent::MarkUpdate {
            mark: id.clone(),
            stack,
            duration,
        });
        self.apply_effects(Trigger::OnStack, &mut ParentCtx::Stack { mark: id.clone() });
    }

    pub fn consume_mark_stacks(&mut self, id: &MarkId, amount: u32) {
        let Some(mark) = self.mark_mut(id) else {
            return;
        };
        mark.consume_stacks(amount);
        let (stack, duration) = (mark.stack, mark.duration);
        if stack == 0 {
            self.destroy_mark_forced(id);
        } else {
            self.emit(BattleEvent::MarkUpdate {
                mark: id.clone(),
                stack,
                duration,
            });
        }
    }

    fn update_mark_durations(&mut self) {
        let all_marks: Vec<MarkId> = self
            .battle_marks
            .iter()
            .map(|m| m.id.clone())
            .chain(
                self.players
                    .iter()
                    .flat_map(|p| p.team.iter())
                    .flat_map(|pet| pet.marks.iter().map(|m| m.id.clone())),
            )
            .collect();
        for id in all_marks {
            let expired = match self.mark_mut(&id) {
                Some(mark) => mark.tick(),
                None => continue,
            };
            if expired {
                let target = self.mark_owner_pet(&id).unwrap_or_else(|| PetId::new(""));
                self.emit(BattleEvent::MarkExpire {
                    mark: id.clone(),
                    target,
                });
                self.apply_effects(
                    Trigger::OnMarkDurationEnd,
                    &mut ParentCtx::RemoveMark { mark: id.clone() },
                );
                self.destroy_mark_forced(&id);
            }
        }
    }

    // ---- stats / switching --------------------------------------------

    pub fn add_attribute_modifier(&mut self, pet: &PetId, modifier: crate::attribute::AttributeModifier) {
        let stat = modifier.stat;
        let Some(target) = self.pet_mut(pet) else {
            return;
        };
        target.add_attribute_modifier(modifier);
        let value = target.effective_stat(stat);
        self.emit(BattleEvent::AttributeChange {
            pet: pet.clone(),
            stat,
            value,
        });
    }

    /// Rewrite a base stat in place; stages and modifiers still apply on
    /// top of the new base.
    pub fn modify_base_stat(&mut self, pet: &PetId, stat: BattleStat, delta: f64, percent: f64) {
        let Some(target) = self.pet_mut(pet) else {
            return;
        };
        target.modify_base_stat(stat, delta, percent);
        let value = target.effective_stat(stat);
        self.emit(BattleEvent::AttributeChange {
            pet: pet.clone(),
            stat,
            value,
        });
    }

    pub fn boost_stat(&mut self, pet: &PetId, stat: BattleStat, delta: i8) {
        if delta == 0 {
            return;
        }
        let Some(target) = self.pet_mut(pet) else {
            return;
        };
        let actual = target.stat_stages.boost(stat, delta);
        let stage = target.stat_stages.get(stat);
        if actual != 0 {
            self.emit(BattleEvent::StatChange {
                pet: pet.clone(),
                stat,
                delta: actual,
                stage,
            });
            self.apply_effects(
                Trigger::OnStatStageChange,
                &mut ParentCtx::StatStage {
                    pet: pet.clone(),
                    stat,
                    delta: actual,
                },
            );
        }
    }

    pub fn clear_stat_stages(&mut self, pet: &PetId, stat: Option<BattleStat>) {
        let Some(target) = self.pet_mut(pet) else {
            return;
        };
        match stat {
            Some(stat) => {
                let current = target.stat_stages.get(stat);
                if current != 0 {
                    target.stat_stages.set(stat, 0);
                    self.emit(BattleEvent::StatChange {
                        pet: pet.clone(),
                        stat,
                        delta: -current,
                        stage: 0,
                    });
                }
            }
            None => {
                target.stat_stages.clear();
            }
        }
    }

    pub fn stun(&mut self, pet: &PetId) {
        if let Some(target) = self.pet_mut(pet) {
            target.stunned = true;
            let name = target.name.clone();
            self.emit(BattleEvent::Info {
                message: format!("{name} is stunned and will skip its next action"),
            });
        }
    }

    fn switch_pet(&mut self, player_idx: usize, to: &PetId, voluntary: bool) {
        let Some(to_idx) = self.players[player_idx].pet_index(to) else {
            return;
        };
        if !self.players[player_idx].team[to_idx].is_alive() {
            return;
        }
        let from = self.players[player_idx].active_pet().id.clone();
        if from == *to {
            return;
        }

        self.apply_effects(
            Trigger::OnSwitchOut,
            &mut ParentCtx::Switch {
                player: self.players[player_idx].id.clone(),
                from: from.clone(),
                to: to.clone(),
            },
        );
        self.apply_effects(
            Trigger::OnOwnerSwitchOut,
            &mut ParentCtx::Switch {
                player: self.players[player_idx].id.clone(),
                from: from.clone(),
                to: to.clone(),
            },
        );

        // marks that neither persist nor transfer are dropped
        let (dropped, transferred): (Vec<MarkId>, Vec<MarkId>) = {
            let pet = &self.players[player_idx].team[self.players[player_idx].active];
            let mut dropped = Vec::new();
            let mut transferred = Vec::new();
            for mark in &pet.marks {
                if mark.config.transfer_on_switch {
                    transferred.push(mark.id.clone());
                } else if !mark.config.keep_on_switch_out {
                    dropped.push(mark.id.clone());
                }
            }
            (dropped, transferred)
        };
        for id in dropped {
            self.destroy_mark_forced(&id);
        }
        for id in transferred {
            self.transfer_mark(&id, to);
        }

        if voluntary {
            let player = &mut self.players[player_idx];
            let kept = (player.rage as f64 * config::SWITCH_RAGE_RETENTION).floor() as u32;
            let delta = kept as i32 - player.rage as i32;
            if delta != 0 {
                let id = player.id.clone();
                self.add_rage(&id, delta, RageReason::Switch);
            }
        }

        // leaving the field resets volatile state
        {
            let player = &mut self.players[player_idx];
            let outgoing = player.active_pet_mut();
            outgoing.stat_stages.clear();
            outgoing.stunned = false;
            outgoing.skill_streak = None;
            player.active = to_idx;
        }

        let (player_id, current_hp) = {
            let player = &self.players[player_idx];
            (player.id.clone(), player.active_pet().current_hp)
        };
        self.emit(BattleEvent::PetSwitch {
            player: player_id.clone(),
            from_pet: from.clone(),
            to_pet: to.clone(),
            current_hp,
        });

        self.apply_effects(
            Trigger::OnSwitchIn,
            &mut ParentCtx::Switch {
                player: player_id.clone(),
                from: from.clone(),
                to: to.clone(),
            },
        );
        self.apply_effects(
            Trigger::OnOwnerSwitchIn,
            &mut ParentCtx::Switch {
                player: player_id,
                from,
                to: to.clone(),
            },
        );
    }

    // ---- transformations ----------------------------------------------

    pub fn transform_pet(
        &mut self,
        pet: &PetId,
        to: &SpeciesId,
        permanent: bool,
        priority: i32,
        caused_by: Option<MarkId>,
    ) -> bool {
        self.transform_entity(
            EntityRef::Pet(pet.clone()),
            to.to_string(),
            permanent,
            priority,
            caused_by,
        )
    }

    pub fn transform_entity(
        &mut self,
        target: EntityRef,
        to_base: String,
        permanent: bool,
        priority: i32,
        caused_by: Option<MarkId>,
    ) -> bool {
        self.apply_effects(Trigger::BeforeTransform, &mut ParentCtx::Battle);
        let mut system = std::mem::take(&mut self.transformations);
        let from_base = system
            .state(&target)
            .active
            .map(|r| r.to_base)
            .or_else(|| self.entity_base(&target));
        let applied = system.transform(
            self,
            target.clone(),
            to_base.clone(),
            permanent,
            priority,
            caused_by,
            false,
        );
        self.transformations = system;
        if applied {
            if let Some(from_base) = from_base {
                let target = match &target {
                    EntityRef::Pet(id) => id.to_string(),
                    EntityRef::Skill(id) => id.to_string(),
                    EntityRef::Mark(id) => id.to_string(),
                };
                self.emit(BattleEvent::Transform {
                    target,
                    from_base,
                    to_base,
                    permanent,
                    priority,
                });
            }
            self.apply_effects(Trigger::AfterTransform, &mut ParentCtx::Battle);
        }
        applied
    }

    fn entity_base(&self, target: &EntityRef) -> Option<String> {
        match target {
            EntityRef::Pet(id) => self.pet(id).map(|p| p.species.to_string()),
            EntityRef::Skill(id) => self.find_skill(id).map(|s| s.base.to_string()),
            EntityRef::Mark(id) => self.mark(id).map(|m| m.base.to_string()),
        }
    }

    /// Remove the active temporary transformation from a pet
    pub fn remove_transformation(&mut self, pet: &PetId) -> bool {
        self.remove_entity_transformation(&EntityRef::Pet(pet.clone()))
    }

    pub fn remove_entity_transformation(&mut self, target: &EntityRef) -> bool {
        let mut system = std::mem::take(&mut self.transformations);
        let from_base = system.state(target).active.map(|r| r.to_base);
        let restored = system.remove_transformation(self, target);
        self.transformations = system;
        match (restored, from_base) {
            (Some(restored), Some(from_base)) => {
                let target = match target {
                    EntityRef::Pet(id) => id.to_string(),
                    EntityRef::Skill(id) => id.to_string(),
                    EntityRef::Mark(id) => id.to_string(),
                };
                self.emit(BattleEvent::TransformEnd {
                    target,
                    from_base,
                    to_base: restored,
                    reason: "removed".into(),
                });
                true
            }
            _ => false,
        }
    }

    /// Drop transformations caused by a destroyed mark; safe when none were
    pub fn cleanup_mark_transformations(&mut self, mark: &MarkId) {
        let mut system = std::mem::take(&mut self.transformations);
        system.cleanup_mark_transformations(self, mark);
        self.transformations = system;
    }

    pub fn transformation_state(&self, target: &EntityRef) -> TransformationState {
        self.transformations.state(target)
    }

    // ---- effect scheduling --------------------------------------------

    /// Collect every effect on the field matching the trigger, order them
    /// by priority, and run each against the context.
    pub fn apply_effects(&mut self, trigger: Trigger, parent: &mut ParentCtx<'_>) {
        let mut batch: Vec<(i32, Effect, EffectSource)> = Vec::new();

        for mark in &self.battle_marks {
            if !mark.active {
                continue;
            }
            for effect in &mark.effects {
                if effect.trigger == trigger {
                    batch.push((
                        effect.priority,
                        effect.clone(),
                        EffectSource::Mark {
                            mark: mark.id.clone(),
                            owner: None,
                        },
                    ));
                }
            }
        }
        for player in &self.players {
            let pet = player.active_pet();
            for mark in &pet.marks {
                if !mark.active {
                    continue;
                }
                for effect in &mark.effects {
                    if effect.trigger == trigger {
                        batch.push((
                            effect.priority,
                            effect.clone(),
                            EffectSource::Mark {
                                mark: mark.id.clone(),
                                owner: Some(pet.id.clone()),
                            },
                        ));
                    }
                }
            }
        }
        if let Some(ctx) = parent.skill_ctx() {
            if let Some(skill) = self.find_skill(&ctx.skill) {
                for effect in &skill.effects {
                    if effect.trigger == trigger {
                        batch.push((
                            effect.priority,
                            effect.clone(),
                            EffectSource::Skill {
                                skill: ctx.skill.clone(),
                                owner: ctx.user.clone(),
                            },
                        ));
                    }
                }
            }
        }

        batch.sort_by_key(|(priority, _, _)| std::cmp::Reverse(*priority));

        for (_, effect, source) in batch {
            // the carrier may have been destroyed by an earlier effect
            if let EffectSource::Mark { mark, .. } = &source {
                if !self.mark(mark).is_some_and(|m| m.active) {
                    continue;
                }
            }

            if let Some(condition) = &effect.condition {
                match crate::effect::condition::eval_condition(self, &source, parent, condition) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        self.emit(BattleEvent::EffectApplyFail {
                            effect: effect.id.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                }
            }

            // stack cost: insufficient stacks means a silent skip
            if let Some(needed) = effect.consumes_stacks {
                let EffectSource::Mark { mark, .. } = &source else {
                    continue;
                };
                let enough = self.mark(mark).is_some_and(|m| m.stack >= needed);
                if !enough {
                    continue;
                }
                self.consume_mark_stacks(&mark.clone(), needed);
            }

            self.emit(BattleEvent::EffectApply {
                effect: effect.id.clone(),
            });
            for op in &effect.ops {
                if let Err(err) =
                    crate::effect::operator::exec_operator(self, &source, parent, op)
                {
                    tracing::warn!(effect = %effect.id, error = %err, "effect operator failed");
                    self.emit(BattleEvent::EffectApplyFail {
                        effect: effect.id.clone(),
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }
    }
}
