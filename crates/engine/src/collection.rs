//! Typed object access for one entity

use crate::traits::CoreEngine;
use ironbox_core::{Entity, Result};
use ironbox_storage::EntityCodec;
use std::marker::PhantomData;

/// Objects of one entity type
///
/// Obtained from [`Store::collection`](crate::Store::collection). An object
/// with id 0 is new: `put` assigns it the next id and writes the id back.
pub struct Collection<'s, T, E> {
    engine: &'s E,
    codec: &'s EntityCodec,
    entity_id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T: Entity, E: CoreEngine> Collection<'s, T, E> {
    pub(crate) fn new(engine: &'s E, codec: &'s EntityCodec, entity_id: u32) -> Self {
        Collection {
            engine,
            codec,
            entity_id,
            _marker: PhantomData,
        }
    }

    /// Insert or update an object, returning its id
    pub fn put(&self, object: &mut T) -> Result<u64> {
        let id = match object.id() {
            0 => self.engine.next_id(self.entity_id)?,
            id => id,
        };
        let record = self.codec.marshal(&object.to_object(), id)?;
        self.engine.put(self.entity_id, id, &record)?;
        object.set_id(id);
        Ok(id)
    }

    /// [`put`](Self::put) for each object, in order
    pub fn put_many(&self, objects: &mut [T]) -> Result<Vec<u64>> {
        objects.iter_mut().map(|object| self.put(object)).collect()
    }

    /// Object by id
    pub fn get(&self, id: u64) -> Result<Option<T>> {
        match self.engine.get(self.entity_id, id)? {
            Some(record) => T::from_object(self.codec.unmarshal(&record)?).map(Some),
            None => Ok(None),
        }
    }

    /// All objects, ordered by id
    pub fn get_all(&self) -> Result<Vec<T>> {
        let mut objects = Vec::new();
        for id in self.engine.ids(self.entity_id)? {
            if let Some(object) = self.get(id)? {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    /// True if an object with `id` exists
    pub fn contains(&self, id: u64) -> Result<bool> {
        Ok(self.engine.get(self.entity_id, id)?.is_some())
    }

    /// Remove an object; `false` if it did not exist
    pub fn remove(&self, id: u64) -> Result<bool> {
        self.engine.remove(self.entity_id, id)
    }

    /// Remove every object, returning how many were removed
    pub fn remove_all(&self) -> Result<u64> {
        self.engine.remove_all(self.entity_id)
    }

    /// Number of objects
    pub fn count(&self) -> Result<u64> {
        self.engine.count(self.entity_id)
    }

    /// True if there are no objects
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }
}
