//! The core engine seam
//!
//! The storage engine proper (pages, transactions, indexes, queries) lives
//! behind [`CoreEngine`]. This layer only hands it a model descriptor and
//! opaque records keyed by `(entity id, record id)`.

use crate::config::EngineConfig;
use ironbox_core::Result;

/// Operations the object layer needs from a core engine
///
/// Implementations must be safe to share across threads; every operation
/// takes `&self`.
pub trait CoreEngine: Send + Sync {
    /// Open the engine for the model described by `model` (see
    /// [`ModelDescriptor`](crate::ModelDescriptor))
    fn open(&mut self, model: &[u8], options: &EngineConfig) -> Result<()>;

    /// Insert or overwrite a record
    fn put(&self, entity_id: u32, id: u64, record: &[u8]) -> Result<()>;

    /// Read a record
    fn get(&self, entity_id: u32, id: u64) -> Result<Option<Vec<u8>>>;

    /// Delete a record; `false` if it did not exist
    fn remove(&self, entity_id: u32, id: u64) -> Result<bool>;

    /// Delete every record of an entity, returning how many were removed
    fn remove_all(&self, entity_id: u32) -> Result<u64>;

    /// Number of records of an entity
    fn count(&self, entity_id: u32) -> Result<u64>;

    /// Record ids of an entity in ascending order
    fn ids(&self, entity_id: u32) -> Result<Vec<u64>>;

    /// Reserve the next record id of an entity
    fn next_id(&self, entity_id: u32) -> Result<u64>;
}
