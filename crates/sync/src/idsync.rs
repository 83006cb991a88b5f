//! Identity synchronization between a declared model and its metadata file
//!
//! Every entity, property and index needs a stable [`IdUid`]. Code declares
//! the schema by name (optionally pinning elements to a UID); the metadata
//! file remembers what was assigned before. A sync pass matches the two:
//!
//! - an element pinned to a UID is matched by UID, so it may be renamed
//! - any other element is matched by name
//! - unmatched elements receive `last + 1` in their scope and a fresh UID
//! - counters never go down, so IDs of removed elements are never reused
//!
//! The pass runs on a copy of the model. The caller's model is only
//! replaced (and the file only written) once the whole pass succeeded.

use crate::metadata::{EntityRecord, MetadataFile, ModelFile, PropertyRecord};
use ironbox_core::{EntityDescriptor, Error, IdUid, IndexDescriptor, Model, PropertyDescriptor, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Synchronizes models against one metadata file
#[derive(Debug)]
pub struct IdSync {
    file: MetadataFile,
    rng: StdRng,
}

impl IdSync {
    /// Synchronizer for the metadata file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IdSync {
            file: MetadataFile::new(path),
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a deterministic UID generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Metadata file path
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Assign identities to every element of `model`
    ///
    /// Returns `true` if the metadata file was (re)written.
    ///
    /// # Errors
    ///
    /// - `EmptyModel` if the model has no entities
    /// - `IncompatibleMetadataVersion` / `MetadataParse` for an unreadable file
    /// - `DuplicateUid` for a UID used twice (in the file or by the code)
    /// - `SchemaMismatch` for a matched property whose type, flags or index
    ///   presence changed
    ///
    /// On error neither `model` nor the file is modified.
    pub fn sync(&mut self, model: &mut Model) -> Result<bool> {
        if model.is_empty() {
            return Err(Error::EmptyModel);
        }

        let _lock = self.lock()?;
        let persisted = self.file.load()?;

        let mut pass = Pass {
            known: match &persisted {
                Some(file) => file.assigned_uids()?,
                None => HashSet::new(),
            },
            claimed: HashSet::new(),
            rng: &mut self.rng,
            last_entity: IdUid::UNASSIGNED,
            last_index: IdUid::UNASSIGNED,
            dirty: persisted.is_none(),
        };

        let mut work = model.clone();
        if let Some(file) = &persisted {
            pass.last_entity = file.last_entity_id;
            pass.last_index = file.last_index_id;
            if file.entities.len() != work.entities.len() {
                pass.dirty = true;
            }
        }

        for entity in &mut work.entities {
            pass.sync_entity(entity, persisted.as_ref())?;
        }

        work.last_entity_identity = pass.last_entity;
        work.last_index_identity = pass.last_index;

        let dirty = pass.dirty;
        if dirty {
            self.file.persist(&ModelFile::from_model(&work))?;
            info!(
                target: "ironbox::sync",
                path = %self.file.path().display(),
                entities = work.entities.len(),
                last_entity = %work.last_entity_identity,
                last_index = %work.last_index_identity,
                "Model file written"
            );
        } else {
            debug!(target: "ironbox::sync", path = %self.file.path().display(), "Model file up to date");
        }

        *model = work;
        Ok(dirty)
    }

    // Serializes concurrent syncs of the same file across processes; released on drop.
    fn lock(&self) -> Result<File> {
        let mut lock_path = OsString::from(self.file.path().as_os_str());
        lock_path.push(".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_path))?;
        fs2::FileExt::lock_exclusive(&lock_file)?;
        Ok(lock_file)
    }
}

/// Synchronize `model` with the metadata file at `path`
///
/// Shorthand for `IdSync::new(path).sync(model)`.
pub fn sync_model(model: &mut Model, path: impl AsRef<Path>) -> Result<bool> {
    IdSync::new(path.as_ref()).sync(model)
}

/// State of one sync pass
struct Pass<'a> {
    /// UIDs present in the file or handed out during this pass
    known: HashSet<u64>,
    /// UIDs already bound to an element of the declared model
    claimed: HashSet<u64>,
    rng: &'a mut StdRng,
    last_entity: IdUid,
    last_index: IdUid,
    dirty: bool,
}

impl Pass<'_> {
    fn sync_entity(&mut self, entity: &mut EntityDescriptor, file: Option<&ModelFile>) -> Result<()> {
        let element = || format!("entity {}", entity.name);

        let record: Option<&EntityRecord> = if entity.identity.has_uid() {
            let uid = entity.identity.uid;
            match file.and_then(|f| f.entity_by_uid(uid)) {
                Some(record) => {
                    if record.name != entity.name {
                        debug!(
                            target: "ironbox::sync",
                            from = %record.name,
                            to = %entity.name,
                            "Entity renamed"
                        );
                        self.dirty = true;
                    }
                    Some(record)
                }
                None => {
                    self.reserve(uid, element())?;
                    None
                }
            }
        } else {
            file.and_then(|f| f.entity_by_name(&entity.name))
        };

        match record {
            Some(record) => {
                self.claim(record.id.uid, element())?;
                entity.identity = record.id;
                entity.last_property_identity = record.last_property_id;
                if record.id.id > self.last_entity.id {
                    self.last_entity = record.id;
                    self.dirty = true;
                }
                if record.properties.len() != entity.properties.len() {
                    self.dirty = true;
                }
            }
            None => {
                let uid = match entity.identity.uid {
                    0 => self.generate_uid(),
                    uid => uid,
                };
                self.claim(uid, element())?;
                entity.identity = IdUid::new(self.last_entity.id + 1, uid);
                entity.last_property_identity = IdUid::UNASSIGNED;
                self.last_entity = entity.identity;
                self.dirty = true;
                debug!(target: "ironbox::sync", entity = %entity.name, identity = %entity.identity, "Entity assigned");
            }
        }

        let EntityDescriptor {
            name,
            properties,
            last_property_identity,
            ..
        } = entity;
        for prop in properties.iter_mut() {
            self.sync_property(name.as_str(), last_property_identity, prop, record)?;
        }
        Ok(())
    }

    fn sync_property(
        &mut self,
        entity: &str,
        last_property: &mut IdUid,
        prop: &mut PropertyDescriptor,
        entity_record: Option<&EntityRecord>,
    ) -> Result<()> {
        let element = || format!("property {}.{}", entity, prop.name);

        let record: Option<&PropertyRecord> = if prop.identity.has_uid() {
            let uid = prop.identity.uid;
            match entity_record.and_then(|r| r.property_by_uid(uid)) {
                Some(record) => {
                    if record.name != prop.name {
                        debug!(
                            target: "ironbox::sync",
                            entity,
                            from = %record.name,
                            to = %prop.name,
                            "Property renamed"
                        );
                        self.dirty = true;
                    }
                    Some(record)
                }
                None => {
                    self.reserve(uid, element())?;
                    None
                }
            }
        } else {
            entity_record.and_then(|r| r.property_by_name(&prop.name))
        };

        match record {
            Some(record) => {
                check_compatible(entity, prop, record)?;
                self.claim(record.id.uid, element())?;
                prop.identity = record.id;
                if record.id.id > last_property.id {
                    *last_property = record.id;
                    self.dirty = true;
                }
            }
            None => {
                let uid = match prop.identity.uid {
                    0 => self.generate_uid(),
                    uid => uid,
                };
                self.claim(uid, element())?;
                prop.identity = IdUid::new(last_property.id + 1, uid);
                *last_property = prop.identity;
                self.dirty = true;
                debug!(
                    target: "ironbox::sync",
                    entity,
                    property = %prop.name,
                    identity = %prop.identity,
                    "Property assigned"
                );
            }
        }

        if let Some(index) = prop.index.as_mut() {
            let element = format!("index {}.{}", entity, prop.name);
            self.sync_index(index, record.and_then(|r| r.index_id), element)?;
        }
        Ok(())
    }

    fn sync_index(
        &mut self,
        index: &mut IndexDescriptor,
        persisted: Option<IdUid>,
        element: String,
    ) -> Result<()> {
        match persisted {
            Some(existing) if !index.identity.has_uid() || index.identity.uid == existing.uid => {
                self.claim(existing.uid, element)?;
                index.identity = existing;
                if existing.id > self.last_index.id {
                    self.last_index = existing;
                    self.dirty = true;
                }
            }
            _ => {
                let uid = match index.identity.uid {
                    0 => self.generate_uid(),
                    uid => {
                        self.reserve(uid, element.clone())?;
                        uid
                    }
                };
                self.claim(uid, element.clone())?;
                index.identity = IdUid::new(self.last_index.id + 1, uid);
                self.last_index = index.identity;
                self.dirty = true;
                debug!(target: "ironbox::sync", index = %element, identity = %index.identity, "Index assigned");
            }
        }
        Ok(())
    }

    /// A user supplied UID that matched nothing must not be used anywhere else
    fn reserve(&mut self, uid: u64, element: String) -> Result<()> {
        if !self.known.insert(uid) {
            return Err(Error::DuplicateUid { uid, element });
        }
        Ok(())
    }

    fn claim(&mut self, uid: u64, element: String) -> Result<()> {
        if !self.claimed.insert(uid) {
            return Err(Error::DuplicateUid { uid, element });
        }
        Ok(())
    }

    /// Random non-zero 63-bit UID not used anywhere in the file
    fn generate_uid(&mut self) -> u64 {
        loop {
            let uid = (self.rng.gen::<u64>() >> 1) + 1;
            if self.known.insert(uid) {
                return uid;
            }
        }
    }
}

fn check_compatible(entity: &str, prop: &PropertyDescriptor, record: &PropertyRecord) -> Result<()> {
    if prop.kind.code() != record.kind {
        return Err(Error::schema_mismatch(entity, &prop.name, "type", prop.kind.code(), record.kind));
    }
    if prop.flags.bits() != record.flags {
        return Err(Error::schema_mismatch(
            entity,
            &prop.name,
            "flags",
            prop.flags.bits(),
            record.flags,
        ));
    }
    if prop.index.is_some() != record.index_id.is_some() {
        return Err(Error::schema_mismatch(
            entity,
            &prop.name,
            "index",
            prop.index.is_some(),
            record.index_id.is_some(),
        ));
    }
    Ok(())
}
