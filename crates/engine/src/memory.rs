//! In-process reference engine
//!
//! Keeps records in ordered maps behind a single `RwLock`. It honors the
//! engine options it can (`read_only`, `max_db_size_kb`) and validates both
//! the model descriptor and every record it is handed.

use crate::config::EngineConfig;
use crate::descriptor::ModelDescriptor;
use crate::traits::CoreEngine;
use ironbox_core::{Error, Model, Result};
use ironbox_storage::TableReader;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct EntityRecords {
    records: BTreeMap<u64, Vec<u8>>,
    last_id: u64,
}

#[derive(Debug)]
struct State {
    options: EngineConfig,
    entities: HashMap<u32, EntityRecords>,
    size_bytes: u64,
}

impl State {
    fn entity(&self, entity_id: u32) -> Result<&EntityRecords> {
        self.entities
            .get(&entity_id)
            .ok_or_else(|| Error::UnknownEntity(format!("entity id {}", entity_id)))
    }

    fn entity_mut(&mut self, entity_id: u32) -> Result<&mut EntityRecords> {
        self.entities
            .get_mut(&entity_id)
            .ok_or_else(|| Error::UnknownEntity(format!("entity id {}", entity_id)))
    }

    fn check_writable(&self) -> Result<()> {
        if self.options.read_only {
            return Err(Error::engine("store is opened read-only"));
        }
        Ok(())
    }
}

/// Core engine holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    model: Option<Model>,
    state: RwLock<Option<State>>,
}

impl MemoryEngine {
    /// Create an engine; it must be opened before use
    pub fn new() -> Self {
        Self::default()
    }

    /// Model the engine was opened with
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Total stored record bytes
    pub fn size_bytes(&self) -> u64 {
        self.state.read().as_ref().map_or(0, |s| s.size_bytes)
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or_else(|| Error::engine("engine is not open"))?;
        f(state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or_else(|| Error::engine("engine is not open"))?;
        f(state)
    }
}

impl CoreEngine for MemoryEngine {
    fn open(&mut self, model: &[u8], options: &EngineConfig) -> Result<()> {
        if self.state.read().is_some() {
            return Err(Error::engine("engine is already open"));
        }
        let model = ModelDescriptor::from_bytes(model)?;
        if let Some(directory) = &options.directory {
            warn!(
                target: "ironbox::engine",
                directory = %directory.display(),
                "Memory engine does not persist; directory ignored"
            );
        }

        let entities = model
            .entities
            .iter()
            .map(|e| (e.identity.id, EntityRecords::default()))
            .collect();
        info!(
            target: "ironbox::engine",
            entities = model.entities.len(),
            read_only = options.read_only,
            max_db_size_kb = ?options.max_db_size_kb,
            "Memory engine opened"
        );

        *self.state.write() = Some(State {
            options: options.clone(),
            entities,
            size_bytes: 0,
        });
        self.model = Some(model);
        Ok(())
    }

    fn put(&self, entity_id: u32, id: u64, record: &[u8]) -> Result<()> {
        if id == 0 {
            return Err(Error::engine("record id 0 is reserved"));
        }
        TableReader::new(record)?;

        self.write(|state| {
            state.check_writable()?;
            let limit = state.options.max_db_size_kb.map(|kb| kb.saturating_mul(1024));
            let size = state.size_bytes;
            let records = state.entity_mut(entity_id)?;

            let replaced = records.records.get(&id).map_or(0, |r| r.len() as u64);
            let new_size = size - replaced + record.len() as u64;
            if let Some(limit) = limit {
                if new_size > limit {
                    return Err(Error::engine(format!(
                        "database full: {} bytes exceeds the {} byte limit",
                        new_size, limit
                    )));
                }
            }

            records.records.insert(id, record.to_vec());
            records.last_id = records.last_id.max(id);
            state.size_bytes = new_size;
            debug!(target: "ironbox::engine", entity_id, id, bytes = record.len(), "Record stored");
            Ok(())
        })
    }

    fn get(&self, entity_id: u32, id: u64) -> Result<Option<Vec<u8>>> {
        self.read(|state| Ok(state.entity(entity_id)?.records.get(&id).cloned()))
    }

    fn remove(&self, entity_id: u32, id: u64) -> Result<bool> {
        self.write(|state| {
            state.check_writable()?;
            let removed = state.entity_mut(entity_id)?.records.remove(&id);
            if let Some(record) = &removed {
                state.size_bytes -= record.len() as u64;
            }
            Ok(removed.is_some())
        })
    }

    fn remove_all(&self, entity_id: u32) -> Result<u64> {
        self.write(|state| {
            state.check_writable()?;
            let records = std::mem::take(&mut state.entity_mut(entity_id)?.records);
            let bytes: u64 = records.values().map(|r| r.len() as u64).sum();
            state.size_bytes -= bytes;
            Ok(records.len() as u64)
        })
    }

    fn count(&self, entity_id: u32) -> Result<u64> {
        self.read(|state| Ok(state.entity(entity_id)?.records.len() as u64))
    }

    fn ids(&self, entity_id: u32) -> Result<Vec<u64>> {
        self.read(|state| Ok(state.entity(entity_id)?.records.keys().copied().collect()))
    }

    fn next_id(&self, entity_id: u32) -> Result<u64> {
        self.write(|state| {
            state.check_writable()?;
            let records = state.entity_mut(entity_id)?;
            records.last_id = records
                .last_id
                .checked_add(1)
                .ok_or_else(|| Error::engine(format!("id space exhausted for entity {}", entity_id)))?;
            Ok(records.last_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironbox_core::{EntityBuilder, IdUid, PropertyBuilder};
    use ironbox_storage::RecordBuilder;

    fn model_bytes() -> Vec<u8> {
        let mut entity = EntityBuilder::new("A")
            .property(PropertyBuilder::id("id"))
            .build()
            .unwrap();
        entity.identity = IdUid::new(1, 10);
        entity.properties[0].identity = IdUid::new(1, 11);
        entity.last_property_identity = IdUid::new(1, 11);
        let mut model = Model::new().with_entity(entity).unwrap();
        model.last_entity_identity = IdUid::new(1, 10);
        ModelDescriptor::to_bytes(&model).unwrap()
    }

    fn record(id: u64) -> Vec<u8> {
        let mut builder = RecordBuilder::new();
        builder.scalar(0, 8, id);
        builder.finish(1).unwrap()
    }

    fn open(options: EngineConfig) -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        engine.open(&model_bytes(), &options).unwrap();
        engine
    }

    #[test]
    fn test_crud() {
        let engine = open(EngineConfig::default());
        assert_eq!(engine.next_id(1).unwrap(), 1);
        engine.put(1, 1, &record(1)).unwrap();
        engine.put(1, 5, &record(5)).unwrap();
        assert_eq!(engine.count(1).unwrap(), 2);
        assert_eq!(engine.ids(1).unwrap(), vec![1, 5]);
        assert_eq!(engine.get(1, 5).unwrap(), Some(record(5)));
        // explicit ids advance the sequence
        assert_eq!(engine.next_id(1).unwrap(), 6);

        assert!(engine.remove(1, 1).unwrap());
        assert!(!engine.remove(1, 1).unwrap());
        assert_eq!(engine.remove_all(1).unwrap(), 1);
        assert_eq!(engine.count(1).unwrap(), 0);
        assert_eq!(engine.size_bytes(), 0);
    }

    #[test]
    fn test_unknown_entity() {
        let engine = open(EngineConfig::default());
        assert!(matches!(engine.count(9), Err(Error::UnknownEntity(_))));
    }

    #[test]
    fn test_not_open() {
        let engine = MemoryEngine::new();
        assert!(matches!(engine.count(1), Err(Error::Engine(_))));
    }

    #[test]
    fn test_open_twice() {
        let mut engine = open(EngineConfig::default());
        assert!(engine.open(&model_bytes(), &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_model_bytes() {
        let mut engine = MemoryEngine::new();
        assert!(engine.open(b"not a model", &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_read_only() {
        let engine = open(EngineConfig {
            read_only: true,
            ..EngineConfig::default()
        });
        assert!(engine.put(1, 1, &record(1)).is_err());
        assert!(engine.next_id(1).is_err());
        assert_eq!(engine.count(1).unwrap(), 0);
    }

    #[test]
    fn test_size_limit() {
        let engine = open(EngineConfig {
            max_db_size_kb: Some(1),
            ..EngineConfig::default()
        });
        let one = record(1).len() as u64;
        let fits = 1024 / one;
        for id in 1..=fits {
            engine.put(1, id, &record(id)).unwrap();
        }
        let err = engine.put(1, fits + 1, &record(fits + 1)).unwrap_err();
        assert!(err.to_string().contains("database full"));
        // overwriting in place does not grow the store
        engine.put(1, 1, &record(1)).unwrap();
    }

    #[test]
    fn test_next_id_after_max_id() {
        let engine = open(EngineConfig::default());
        engine.put(1, u64::MAX, &record(7)).unwrap();
        let err = engine.next_id(1).unwrap_err();
        assert!(matches!(err, Error::Engine(ref msg) if msg.contains("id space exhausted")));
        assert_eq!(engine.count(1).unwrap(), 1);
    }

    #[test]
    fn test_malformed_record_rejected() {
        let engine = open(EngineConfig::default());
        assert!(matches!(engine.put(1, 1, &[1, 2]), Err(Error::RecordDecode(_))));
    }
}
