//! Players: a team of pets and a rage pool.

use tamer_protocol::{PetId, PlayerId};

use crate::config;
use crate::pet::Pet;

/// Why a player's rage changed; feeds the RageChange message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RageReason {
    TurnIncome,
    DamageTaken,
    SkillHit,
    SkillCost,
    Switch,
    Effect,
}

impl RageReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RageReason::TurnIncome => "turn",
            RageReason::DamageTaken => "damage",
            RageReason::SkillHit => "hit",
            RageReason::SkillCost => "cost",
            RageReason::Switch => "switch",
            RageReason::Effect => "effect",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub rage: u32,
    pub team: Vec<Pet>,
    pub active: usize,
    pub surrendered: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, team: Vec<Pet>) -> Self {
        Self {
            id,
            name: name.into(),
            rage: config::INITIAL_RAGE,
            team,
            active: 0,
            surrendered: false,
        }
    }

    pub fn active_pet(&self) -> &Pet {
        &self.team[self.active]
    }

    pub fn active_pet_mut(&mut self) -> &mut Pet {
        &mut self.team[self.active]
    }

    pub fn pet(&self, id: &PetId) -> Option<&Pet> {
        self.team.iter().find(|p| &p.id == id)
    }

    pub fn pet_mut(&mut self, id: &PetId) -> Option<&mut Pet> {
        self.team.iter_mut().find(|p| &p.id == id)
    }

    pub fn pet_index(&self, id: &PetId) -> Option<usize> {
        self.team.iter().position(|p| &p.id == id)
    }

    /// Alive pets currently on the bench
    pub fn switch_candidates(&self) -> Vec<&Pet> {
        self.team
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != self.active && p.is_alive())
            .map(|(_, p)| p)
            .collect()
    }

    pub fn has_alive_pet(&self) -> bool {
        !self.surrendered && self.team.iter().any(|p| p.is_alive())
    }

    /// Whether the active pet has fainted and a replacement is available
    pub fn needs_forced_switch(&self) -> bool {
        !self.active_pet().is_alive() && !self.switch_candidates().is_empty()
    }

    /// Adjust rage by a signed delta, clamped to [0, MAX_RAGE].
    /// Returns (before, after).
    pub fn adjust_rage(&mut self, delta: i32) -> (u32, u32) {
        let before = self.rage;
        let after = (before as i64 + delta as i64).clamp(0, config::MAX_RAGE as i64) as u32;
        self.rage = after;
        (before, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::PetBlueprint;
    use crate::species::{Nature, Species, StatSpread};
    use tamer_protocol::Element;

    fn make_pet(id: &str, owner: &PlayerId) -> Pet {
        let species = Species::new("sprout", "Sprout", Element::Grass, StatSpread::uniform(60));
        let bp = PetBlueprint {
            id: PetId::new(id),
            name: id.to_string(),
            species: species.id.clone(),
            level: 50,
            nature: Nature::Hardy,
            ivs: StatSpread::default(),
            evs: StatSpread::default(),
            skills: Vec::new(),
        };
        Pet::new(&bp, &species, owner.clone(), Vec::new())
    }

    #[test]
    fn test_rage_clamps() {
        let id = PlayerId::new("a");
        let mut player = Player::new(id.clone(), "A", vec![make_pet("p1", &id)]);
        assert_eq!(player.adjust_rage(1000), (config::INITIAL_RAGE, config::MAX_RAGE));
        assert_eq!(player.adjust_rage(-1000), (config::MAX_RAGE, 0));
    }

    #[test]
    fn test_forced_switch_detection() {
        let id = PlayerId::new("a");
        let mut player = Player::new(
            id.clone(),
            "A",
            vec![make_pet("p1", &id), make_pet("p2", &id)],
        );
        assert!(!player.needs_forced_switch());
        let hp = player.active_pet().current_hp;
        player.active_pet_mut().apply_damage(hp);
        assert!(player.needs_forced_switch());
        let hp2 = player.team[1].current_hp;
        player.team[1].apply_damage(hp2);
        assert!(!player.needs_forced_switch());
        assert!(!player.has_alive_pet());
    }
}
