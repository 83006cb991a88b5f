//! Schema descriptors and their builders
//!
//! An entity is declared with an explicit, ordered list of properties:
//!
//! ```
//! use ironbox_core::{EntityBuilder, IndexKind, PropertyBuilder, ValueKind};
//!
//! let task = EntityBuilder::new("Task")
//!     .property(PropertyBuilder::id("id"))
//!     .property(PropertyBuilder::new("text", ValueKind::String).index(IndexKind::Hash))
//!     .property(PropertyBuilder::new("done", ValueKind::Bool))
//!     .build()
//!     .unwrap();
//! assert_eq!(task.properties.len(), 3);
//! ```
//!
//! Declaration order is the order new properties receive their IDs (and thus
//! binary slots) in, so it must be stable for a given source declaration.

use crate::error::{Error, Result};
use crate::iduid::IdUid;
use crate::index::{IndexDescriptor, IndexKind};
use crate::kind::{DateRepr, PropertyFlags, ValueKind};
use std::collections::HashSet;

/// One property of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Identity (assigned by the synchronizer)
    pub identity: IdUid,
    /// Property name
    pub name: String,
    /// Declared value kind
    pub kind: ValueKind,
    /// Flags, including those implied by ID and index declarations
    pub flags: PropertyFlags,
    /// Optional index
    pub index: Option<IndexDescriptor>,
    /// Decoded representation of date kinds
    pub date_repr: DateRepr,
}

impl PropertyDescriptor {
    /// True for the primary key property
    pub fn is_id(&self) -> bool {
        self.flags.contains(PropertyFlags::ID)
    }

    /// Binary record slot (`id - 1`), once the identity is assigned
    pub fn slot(&self) -> Option<usize> {
        (self.identity.id > 0).then(|| self.identity.id as usize - 1)
    }
}

/// Builder for [`PropertyDescriptor`]
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    name: String,
    kind: ValueKind,
    uid: u64,
    flags: PropertyFlags,
    index: Option<IndexDescriptor>,
    date_repr: DateRepr,
}

impl PropertyBuilder {
    /// Property of the given kind
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        PropertyBuilder {
            name: name.into(),
            kind,
            uid: 0,
            flags: PropertyFlags::NONE,
            index: None,
            date_repr: DateRepr::default(),
        }
    }

    /// `int64` primary key property
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Long).flags(PropertyFlags::ID)
    }

    /// Pin the property to a UID (required to rename it)
    pub fn uid(mut self, uid: u64) -> Self {
        self.uid = uid;
        self
    }

    /// Add flags
    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Mark values as unique
    pub fn unique(self) -> Self {
        self.flags(PropertyFlags::UNIQUE)
    }

    /// Declare an index
    pub fn index(mut self, kind: IndexKind) -> Self {
        self.index = Some(IndexDescriptor::new(kind));
        self
    }

    /// Declare an index pinned to a UID
    pub fn index_with_uid(mut self, kind: IndexKind, uid: u64) -> Self {
        self.index = Some(IndexDescriptor::new(kind).with_uid(uid));
        self
    }

    /// Representation of decoded dates
    pub fn date_repr(mut self, repr: DateRepr) -> Self {
        self.date_repr = repr;
        self
    }

    fn build(self, entity: &str) -> Result<PropertyDescriptor> {
        let mut flags = self.flags;
        if let Some(index) = &self.index {
            validate_index(entity, &self.name, self.kind, &index.kind)?;
            flags |= index.kind.property_flags();
        }
        if flags.contains(PropertyFlags::UNIQUE) && self.index.is_none() {
            return Err(Error::invalid_index(
                entity,
                &self.name,
                "unique properties require an index",
            ));
        }
        Ok(PropertyDescriptor {
            identity: IdUid::with_uid(self.uid),
            name: self.name,
            kind: self.kind,
            flags,
            index: self.index,
            date_repr: self.date_repr,
        })
    }
}

fn validate_index(entity: &str, property: &str, kind: ValueKind, index: &IndexKind) -> Result<()> {
    match index {
        IndexKind::Value => {
            if kind == ValueKind::Flex || (kind.is_vector() && kind != ValueKind::ByteVector) {
                return Err(Error::invalid_index(
                    entity,
                    property,
                    format!("value index not supported on {}", kind),
                ));
            }
        }
        IndexKind::Hash | IndexKind::Hash64 => {
            if kind != ValueKind::String {
                return Err(Error::invalid_index(
                    entity,
                    property,
                    format!("hash index requires a string property, got {}", kind),
                ));
            }
        }
        IndexKind::Hnsw(params) => {
            if kind != ValueKind::FloatVector {
                return Err(Error::invalid_index(
                    entity,
                    property,
                    format!("HNSW index requires a float32 vector property, got {}", kind),
                ));
            }
            if params.dimensions == 0 {
                return Err(Error::invalid_index(
                    entity,
                    property,
                    "HNSW index requires dimensions > 0",
                ));
            }
            if let Some(p) = params.reparation_backlink_probability {
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::invalid_index(
                        entity,
                        property,
                        format!("reparation backlink probability {} not in [0, 1]", p),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// One entity type of a model
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Identity (assigned by the synchronizer)
    pub identity: IdUid,
    /// Entity name, unique within a model
    pub name: String,
    /// Properties in declaration order
    pub properties: Vec<PropertyDescriptor>,
    /// Highest property identity ever assigned; never decreases
    pub last_property_identity: IdUid,
}

impl EntityDescriptor {
    /// The primary key property (always present for built descriptors)
    pub fn id_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_id())
    }

    /// Property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Property by assigned ID
    pub fn property_by_id(&self, id: u32) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.identity.id == id)
    }

    /// Every identity in this entity (entity, properties, indexes) is assigned
    pub fn is_assigned(&self) -> bool {
        self.identity.is_assigned()
            && self.last_property_identity.is_assigned()
            && self.properties.iter().all(|p| {
                p.identity.is_assigned()
                    && p.index.as_ref().map_or(true, |i| i.identity.is_assigned())
            })
    }
}

/// Builder for [`EntityDescriptor`]
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: String,
    uid: u64,
    properties: Vec<PropertyBuilder>,
}

impl EntityBuilder {
    /// Start declaring an entity
    pub fn new(name: impl Into<String>) -> Self {
        EntityBuilder {
            name: name.into(),
            uid: 0,
            properties: Vec::new(),
        }
    }

    /// Pin the entity to a UID (required to rename it)
    pub fn uid(mut self, uid: u64) -> Self {
        self.uid = uid;
        self
    }

    /// Append a property
    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    /// Validate and build the descriptor
    ///
    /// # Errors
    ///
    /// - `MissingIdProperty` / `DuplicateIdProperty` / `InvalidIdType` for a
    ///   missing, repeated or non-integer primary key
    /// - `DuplicateProperty` for repeated property names
    /// - `InvalidIndex` for an index incompatible with its property
    pub fn build(self) -> Result<EntityDescriptor> {
        let mut properties = Vec::with_capacity(self.properties.len());
        let mut names = HashSet::new();
        let mut id_property: Option<String> = None;

        for builder in self.properties {
            let prop = builder.build(&self.name)?;
            if !names.insert(prop.name.clone()) {
                return Err(Error::DuplicateProperty {
                    entity: self.name,
                    property: prop.name,
                });
            }
            if prop.is_id() {
                if let Some(first) = id_property {
                    return Err(Error::DuplicateIdProperty {
                        entity: self.name,
                        first,
                        second: prop.name,
                    });
                }
                if !prop.kind.is_integer() {
                    return Err(Error::InvalidIdType {
                        entity: self.name,
                        property: prop.name,
                        kind: prop.kind.to_string(),
                    });
                }
                id_property = Some(prop.name.clone());
            }
            properties.push(prop);
        }

        if id_property.is_none() {
            return Err(Error::MissingIdProperty { entity: self.name });
        }

        Ok(EntityDescriptor {
            identity: IdUid::with_uid(self.uid),
            name: self.name,
            properties,
            last_property_identity: IdUid::UNASSIGNED,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HnswParams;

    fn task() -> EntityBuilder {
        EntityBuilder::new("Task")
            .property(PropertyBuilder::id("id"))
            .property(PropertyBuilder::new("text", ValueKind::String))
    }

    #[test]
    fn test_declaration_order_kept() {
        let entity = task()
            .property(PropertyBuilder::new("a", ValueKind::Int))
            .property(PropertyBuilder::new("b", ValueKind::Bool))
            .build()
            .unwrap();
        let names: Vec<_> = entity.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["id", "text", "a", "b"]);
        assert_eq!(entity.id_property().unwrap().name, "id");
        assert!(!entity.is_assigned());
    }

    #[test]
    fn test_missing_id() {
        let err = EntityBuilder::new("NoId")
            .property(PropertyBuilder::new("text", ValueKind::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingIdProperty { ref entity } if entity == "NoId"));
    }

    #[test]
    fn test_duplicate_id() {
        let err = task()
            .property(PropertyBuilder::id("other"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdProperty { ref second, .. } if second == "other"));
    }

    #[test]
    fn test_id_must_be_integer() {
        let err = EntityBuilder::new("Bad")
            .property(PropertyBuilder::new("id", ValueKind::String).flags(PropertyFlags::ID))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdType { .. }));
    }

    #[test]
    fn test_duplicate_property() {
        let err = task()
            .property(PropertyBuilder::new("text", ValueKind::Int))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { .. }));
    }

    #[test]
    fn test_index_flags_applied() {
        let entity = task()
            .property(PropertyBuilder::new("tag", ValueKind::String).index(IndexKind::Hash64))
            .build()
            .unwrap();
        let tag = entity.property("tag").unwrap();
        assert!(tag.flags.contains(PropertyFlags::INDEXED | PropertyFlags::INDEX_HASH64));
        assert_eq!(entity.property("id").unwrap().flags, PropertyFlags::ID);
    }

    #[test]
    fn test_hnsw_validation() {
        let ok = task()
            .property(
                PropertyBuilder::new("vec", ValueKind::FloatVector)
                    .index(IndexKind::Hnsw(HnswParams::new(2))),
            )
            .build();
        assert!(ok.is_ok());

        let zero_dims = task()
            .property(
                PropertyBuilder::new("vec", ValueKind::FloatVector)
                    .index(IndexKind::Hnsw(HnswParams::new(0))),
            )
            .build();
        assert!(matches!(zero_dims, Err(Error::InvalidIndex { .. })));

        let wrong_kind = task()
            .property(
                PropertyBuilder::new("vec", ValueKind::DoubleVector)
                    .index(IndexKind::Hnsw(HnswParams::new(2))),
            )
            .build();
        assert!(matches!(wrong_kind, Err(Error::InvalidIndex { .. })));
    }

    #[test]
    fn test_hash_index_requires_string() {
        let err = task()
            .property(PropertyBuilder::new("n", ValueKind::Long).index(IndexKind::Hash))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { .. }));
    }

    #[test]
    fn test_unique_requires_index() {
        let err = task()
            .property(PropertyBuilder::new("n", ValueKind::Long).unique())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { .. }));

        let ok = task()
            .property(
                PropertyBuilder::new("n", ValueKind::Long)
                    .unique()
                    .index(IndexKind::Value),
            )
            .build()
            .unwrap();
        assert!(ok.property("n").unwrap().flags.contains(PropertyFlags::UNIQUE));
    }

    #[test]
    fn test_slot() {
        let mut entity = task().build().unwrap();
        assert_eq!(entity.properties[1].slot(), None);
        entity.properties[1].identity = IdUid::new(2, 77);
        assert_eq!(entity.properties[1].slot(), Some(1));
        assert_eq!(entity.property_by_id(2).unwrap().name, "text");
    }
}
