//! The selection protocol accepted by the battle state machine.

use serde::{Deserialize, Serialize};

use crate::ids::{BaseSkillId, PetId, PlayerId};

/// One player's answer to a `TurnAction`, `ForcedSwitch`, or `FaintSwitch`
/// prompt. Tagged with the submitting player so the transport can stay dumb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PlayerSelection {
    UseSkill {
        player: PlayerId,
        skill: BaseSkillId,
        target: PetId,
    },
    SwitchPet {
        player: PlayerId,
        pet: PetId,
    },
    DoNothing {
        player: PlayerId,
    },
    Surrender {
        player: PlayerId,
    },
    TeamSelection {
        player: PlayerId,
        selected_pets: Vec<PetId>,
        starter_pet_id: PetId,
    },
}

impl PlayerSelection {
    pub fn player(&self) -> &PlayerId {
        match self {
            PlayerSelection::UseSkill { player, .. }
            | PlayerSelection::SwitchPet { player, .. }
            | PlayerSelection::DoNothing { player }
            | PlayerSelection::Surrender { player }
            | PlayerSelection::TeamSelection { player, .. } => player,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_tag() {
        let sel = PlayerSelection::UseSkill {
            player: PlayerId::new("p1"),
            skill: BaseSkillId::new("ember"),
            target: PetId::new("foe-1"),
        };
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["type"], "use-skill");
        assert_eq!(json["skill"], "ember");
    }

    #[test]
    fn test_team_selection_fields() {
        let sel = PlayerSelection::TeamSelection {
            player: PlayerId::new("p2"),
            selected_pets: vec![PetId::new("a"), PetId::new("b")],
            starter_pet_id: PetId::new("a"),
        };
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["starterPetId"], "a");
        let back: PlayerSelection = serde_json::from_value(json).unwrap();
        assert_eq!(back, sel);
    }
}
