//! The model: all entity types an application stores
//!
//! A `Model` is built explicitly by the application, synchronized once
//! against the metadata file (which assigns every identity) and then handed
//! to the core engine. There is no process-wide registry.

use crate::error::{Error, Result};
use crate::iduid::IdUid;
use crate::schema::EntityDescriptor;
use crate::traits::Entity;

/// Ordered collection of entity descriptors plus the model-wide ID counters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// Entities in declaration order
    pub entities: Vec<EntityDescriptor>,
    /// Highest entity identity ever assigned
    pub last_entity_identity: IdUid,
    /// Highest index identity ever assigned
    pub last_index_identity: IdUid,
    /// Highest relation identity ever assigned (relations are not modeled)
    pub last_relation_identity: IdUid,
}

impl Model {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntity` if an entity with the same name exists.
    pub fn add_entity(&mut self, entity: EntityDescriptor) -> Result<()> {
        if self.entity(&entity.name).is_some() {
            return Err(Error::DuplicateEntity(entity.name));
        }
        self.entities.push(entity);
        Ok(())
    }

    /// Builder-style [`Model::add_entity`]
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Result<Self> {
        self.add_entity(entity)?;
        Ok(self)
    }

    /// Add the entity declared by a typed struct
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        self.add_entity(T::describe().build()?)
    }

    /// Entity by name
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Entity by assigned ID
    pub fn entity_by_id(&self, id: u32) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.identity.id == id)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the model has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every identity in the model is assigned (true after a successful sync)
    pub fn is_assigned(&self) -> bool {
        self.last_entity_identity.is_assigned() && self.entities.iter().all(|e| e.is_assigned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ValueKind;
    use crate::schema::{EntityBuilder, PropertyBuilder};

    fn entity(name: &str) -> EntityDescriptor {
        EntityBuilder::new(name)
            .property(PropertyBuilder::id("id"))
            .property(PropertyBuilder::new("name", ValueKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let model = Model::new()
            .with_entity(entity("A"))
            .unwrap()
            .with_entity(entity("B"))
            .unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(model.entity("B").unwrap().name, "B");
        assert!(model.entity("C").is_none());
        assert!(!model.is_assigned());
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let mut model = Model::new();
        model.add_entity(entity("A")).unwrap();
        let err = model.add_entity(entity("A")).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntity(ref n) if n == "A"));
    }
}
