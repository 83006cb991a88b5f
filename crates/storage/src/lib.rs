//! Binary records for Ironbox entities
//!
//! - [`record`]: the FlatBuffers-compatible table format (builder + reader)
//! - [`EntityCodec`]: per-entity marshal/unmarshal between [`Object`](ironbox_core::Object)s and records
//! - [`flex`]: MessagePack encoding of flex properties
//! - [`ScratchPool`]: thread-local reuse of record builders

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod flex;
pub mod record;
pub mod scratch;

pub use codec::EntityCodec;
pub use record::{RecordBuilder, TableReader};
pub use scratch::ScratchPool;
