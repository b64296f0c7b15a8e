//! Typed string ids for battle entities.
//!
//! Base ids (`SpeciesId`, `BaseSkillId`, `BaseMarkId`, `EffectId`) name data
//! definitions in the repository; instance ids (`PetId`, `SkillId`, `MarkId`)
//! name live entities inside one battle. Keeping them as distinct newtypes
//! means a skill id can never be passed where a mark id is expected.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Species definition id (data repository key)
    SpeciesId
);
string_id!(
    /// A pet instance inside one battle
    PetId
);
string_id!(
    /// A player identity
    PlayerId
);
string_id!(
    /// Skill definition id (data repository key)
    BaseSkillId
);
string_id!(
    /// A skill instance owned by one pet
    SkillId
);
string_id!(
    /// Mark definition id (data repository key)
    BaseMarkId
);
string_id!(
    /// A mark instance attached to one owner
    MarkId
);
string_id!(
    /// Effect definition id
    EffectId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = PetId::new("pet-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"pet-1\"");
        let back: PetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display() {
        assert_eq!(BaseMarkId::new("mark_burn").to_string(), "mark_burn");
    }
}
