//! Identity synchronization for Ironbox models
//!
//! This crate assigns and persists the identities of schema elements:
//! - [`IdSync`]: matches a declared [`Model`](ironbox_core::Model) against the
//!   metadata file and assigns every missing ID/UID
//! - [`ModelFile`]: the JSON side-car that records those assignments
//! - [`MetadataFile`]: atomic load/persist of that side-car

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod idsync;
pub mod metadata;

pub use idsync::{sync_model, IdSync};
pub use metadata::{
    EntityRecord, MetadataFile, ModelFile, PropertyRecord, DEFAULT_MODEL_FILE,
    MODEL_PARSER_VERSION,
};
