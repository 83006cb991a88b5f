//! Object store layer for Ironbox
//!
//! This crate binds a model to a core engine:
//! - CoreEngine: the seam to the storage engine proper
//! - ModelDescriptor: the model bytes an engine opens with
//! - MemoryEngine: in-process reference engine
//! - StoreConfig: `ironbox.toml` configuration
//! - Store / Collection: open a store and work with typed objects
//!
//! Opening a store is the one place where schema synchronization, record
//! encoding and the engine meet.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod descriptor;
pub mod memory;
pub mod store;
pub mod traits;

pub use collection::Collection;
pub use config::{EngineConfig, StoreConfig, CONFIG_FILE_NAME};
pub use descriptor::{ModelDescriptor, MODEL_FORMAT_VERSION, MODEL_MAGIC};
pub use memory::MemoryEngine;
pub use store::Store;
pub use traits::CoreEngine;
