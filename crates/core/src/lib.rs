//! Core types and traits for Ironbox
//!
//! This crate defines the foundational types used throughout the system:
//! - IdUid: local ID + global UID pair identifying a schema element
//! - ValueKind / PropertyFlags: property type taxonomy shared with the engine
//! - IndexDescriptor: value, hash and HNSW vector indexes
//! - EntityDescriptor / PropertyDescriptor: schema built by explicit builders
//! - Model: the entity set handed to the synchronizer and the engine
//! - Value / FlexValue / Object: runtime property values
//! - Entity: trait mapping application structs onto the schema
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod iduid;
pub mod index;
pub mod kind;
pub mod model;
pub mod schema;
pub mod time;
pub mod traits;
pub mod value;

pub use error::{Error, Result};
pub use iduid::IdUid;
pub use index::{DistanceType, HnswFlags, HnswParams, IndexDescriptor, IndexKind};
pub use kind::{DateRepr, PropertyFlags, ValueKind};
pub use model::Model;
pub use schema::{EntityBuilder, EntityDescriptor, PropertyBuilder, PropertyDescriptor};
pub use traits::Entity;
pub use value::{FlexValue, Object, Value};
