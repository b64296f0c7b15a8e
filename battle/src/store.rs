//! Owned definition registries. Each battle holds its own copies, so a
//! running battle is never affected by later data reloads.

use std::collections::HashMap;

use tamer_protocol::{BaseMarkId, BaseSkillId, SpeciesId};
use thiserror::Error;

use crate::mark::MarkDef;
use crate::skill::SkillDef;
use crate::species::Species;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown species: {0}")]
    UnknownSpecies(SpeciesId),
    #[error("unknown skill: {0}")]
    UnknownSkill(BaseSkillId),
    #[error("unknown mark: {0}")]
    UnknownMark(BaseMarkId),
    #[error("duplicate definition: {0}")]
    Duplicate(String),
}

/// All definitions a battle can reference
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    species: HashMap<SpeciesId, Species>,
    skills: HashMap<BaseSkillId, SkillDef>,
    marks: HashMap<BaseMarkId, MarkDef>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_species(&mut self, species: Species) -> Result<(), StoreError> {
        if self.species.contains_key(&species.id) {
            return Err(StoreError::Duplicate(species.id.to_string()));
        }
        self.species.insert(species.id.clone(), species);
        Ok(())
    }

    pub fn register_skill(&mut self, skill: SkillDef) -> Result<(), StoreError> {
        if self.skills.contains_key(&skill.id) {
            return Err(StoreError::Duplicate(skill.id.to_string()));
        }
        self.skills.insert(skill.id.clone(), skill);
        Ok(())
    }

    pub fn register_mark(&mut self, mark: MarkDef) -> Result<(), StoreError> {
        if self.marks.contains_key(&mark.id) {
            return Err(StoreError::Duplicate(mark.id.to_string()));
        }
        self.marks.insert(mark.id.clone(), mark);
        Ok(())
    }

    pub fn species(&self, id: &SpeciesId) -> Result<&Species, StoreError> {
        self.species
            .get(id)
            .ok_or_else(|| StoreError::UnknownSpecies(id.clone()))
    }

    pub fn skill(&self, id: &BaseSkillId) -> Result<&SkillDef, StoreError> {
        self.skills
            .get(id)
            .ok_or_else(|| StoreError::UnknownSkill(id.clone()))
    }

    pub fn mark(&self, id: &BaseMarkId) -> Result<&MarkDef, StoreError> {
        self.marks
            .get(id)
            .ok_or_else(|| StoreError::UnknownMark(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::StatSpread;
    use tamer_protocol::Element;

    #[test]
    fn test_duplicate_rejected() {
        let mut store = DataStore::new();
        let species = Species::new("dupe", "Dupe", Element::Normal, StatSpread::uniform(50));
        store.register_species(species.clone()).unwrap();
        assert!(matches!(
            store.register_species(species),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn test_missing_lookup() {
        let store = DataStore::new();
        assert!(store.species(&SpeciesId::new("ghost")).is_err());
    }
}
