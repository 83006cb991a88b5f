//! Traits mapping application types onto the schema
//!
//! The `Entity` trait replaces runtime class introspection: a type states its
//! schema once through an [`EntityBuilder`] and converts itself to and from
//! an [`Object`] keyed by property name.

use crate::error::Result;
use crate::schema::EntityBuilder;
use crate::value::Object;

/// A typed struct stored as one entity
///
/// # Example
///
/// ```
/// use ironbox_core::{Entity, EntityBuilder, Object, PropertyBuilder, Result, ValueKind};
///
/// #[derive(Default)]
/// struct Task {
///     id: u64,
///     text: String,
/// }
///
/// impl Entity for Task {
///     const NAME: &'static str = "Task";
///
///     fn describe() -> EntityBuilder {
///         EntityBuilder::new(Self::NAME)
///             .property(PropertyBuilder::id("id"))
///             .property(PropertyBuilder::new("text", ValueKind::String))
///     }
///
///     fn id(&self) -> u64 {
///         self.id
///     }
///
///     fn set_id(&mut self, id: u64) {
///         self.id = id;
///     }
///
///     fn to_object(&self) -> Object {
///         Object::new().with("id", self.id).with("text", self.text.as_str())
///     }
///
///     fn from_object(mut object: Object) -> Result<Self> {
///         Ok(Task {
///             id: object.take_as("id")?,
///             text: object.take_as("text")?,
///         })
///     }
/// }
/// ```
pub trait Entity: Sized {
    /// Entity name as declared in the model
    const NAME: &'static str;

    /// Schema declaration, properties in a stable order
    fn describe() -> EntityBuilder;

    /// Current primary key (0 = not yet stored)
    fn id(&self) -> u64;

    /// Update the primary key after the object was stored
    fn set_id(&mut self, id: u64);

    /// Property values of this object
    fn to_object(&self) -> Object;

    /// Rebuild an object from decoded property values
    fn from_object(object: Object) -> Result<Self>;
}
