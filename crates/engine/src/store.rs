//! Store: a synchronized model bound to an open core engine

use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::descriptor::ModelDescriptor;
use crate::traits::CoreEngine;
use ironbox_core::{Entity, EntityDescriptor, Error, Model, Result};
use ironbox_storage::EntityCodec;
use ironbox_sync::IdSync;
use std::collections::HashMap;
use tracing::info;

/// An open store
///
/// Opening runs the identity synchronizer against the configured metadata
/// file, hands the resulting model to the engine and prepares one codec per
/// entity.
pub struct Store<E: CoreEngine> {
    model: Model,
    config: StoreConfig,
    engine: E,
    codecs: HashMap<String, EntityCodec>,
}

impl<E: CoreEngine> Store<E> {
    /// Synchronize `model`, then open `engine` with it
    ///
    /// # Errors
    ///
    /// Any synchronization error (the metadata file is left untouched), or
    /// an error from the engine's `open`.
    pub fn open(mut model: Model, config: StoreConfig, mut engine: E) -> Result<Self> {
        let model_changed = IdSync::new(&config.model_file).sync(&mut model)?;
        let descriptor = ModelDescriptor::to_bytes(&model)?;
        engine.open(&descriptor, &config.engine)?;

        let codecs = model
            .entities
            .iter()
            .map(|entity| Ok((entity.name.clone(), EntityCodec::new(entity)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        info!(
            target: "ironbox::store",
            model_file = %config.model_file.display(),
            entities = model.entities.len(),
            model_changed,
            "Store opened"
        );

        Ok(Store {
            model,
            config,
            engine,
            codecs,
        })
    }

    /// The synchronized model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Configuration the store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying core engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Synchronized descriptor of an entity
    pub fn entity(&self, name: &str) -> Result<&EntityDescriptor> {
        self.model
            .entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Codec of an entity
    pub fn entity_codec(&self, name: &str) -> Result<&EntityCodec> {
        self.codecs
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Typed access to the objects of `T`
    pub fn collection<T: Entity>(&self) -> Result<Collection<'_, T, E>> {
        let entity = self.entity(T::NAME)?;
        let codec = self.entity_codec(T::NAME)?;
        Ok(Collection::new(&self.engine, codec, entity.identity.id))
    }
}

impl<E: CoreEngine> std::fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("model_file", &self.config.model_file)
            .field("entities", &self.model.entities.len())
            .finish()
    }
}
