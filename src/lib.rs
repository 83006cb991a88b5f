//! Ironbox - object layer for embedded object databases
//!
//! Ironbox turns application structs into records an embedded core engine
//! can store, and keeps the schema identities that make those records
//! readable across schema changes.
//!
//! # Quick Start
//!
//! ```no_run
//! use ironbox::{Entity, EntityBuilder, MemoryEngine, Model, Object, PropertyBuilder, Result, Store, StoreConfig, ValueKind};
//!
//! #[derive(Default)]
//! struct Task {
//!     id: u64,
//!     text: String,
//! }
//!
//! impl Entity for Task {
//!     const NAME: &'static str = "Task";
//!
//!     fn describe() -> EntityBuilder {
//!         EntityBuilder::new(Self::NAME)
//!             .property(PropertyBuilder::id("id"))
//!             .property(PropertyBuilder::new("text", ValueKind::String))
//!     }
//!
//!     fn id(&self) -> u64 { self.id }
//!     fn set_id(&mut self, id: u64) { self.id = id; }
//!
//!     fn to_object(&self) -> Object {
//!         Object::new().with("id", self.id).with("text", self.text.as_str())
//!     }
//!
//!     fn from_object(mut object: Object) -> Result<Self> {
//!         Ok(Task { id: object.take_as("id")?, text: object.take_as("text")? })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut model = Model::new();
//! model.register::<Task>()?;
//!
//! // Assigns identities (and writes ironbox-model.json) on first open
//! let store = Store::open(model, StoreConfig::default(), MemoryEngine::new())?;
//! let tasks = store.collection::<Task>()?;
//! let id = tasks.put(&mut Task { id: 0, text: "buy milk".into() })?;
//! assert_eq!(tasks.get(id)?.map(|t| t.text), Some("buy milk".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `ironbox-core`: schema descriptors, values, errors
//! - `ironbox-sync`: identity synchronization with the metadata file
//! - `ironbox-storage`: binary record codec
//! - `ironbox-engine`: core engine seam, store and collections

pub use ironbox_core::*;
pub use ironbox_engine::{
    Collection, CoreEngine, EngineConfig, MemoryEngine, ModelDescriptor, Store, StoreConfig,
};
pub use ironbox_storage::EntityCodec;
pub use ironbox_sync::{sync_model, IdSync, ModelFile, MODEL_PARSER_VERSION};
