//! Model metadata file format
//!
//! The metadata file is the durable record of every identity assigned to the
//! model. It is meant to be checked into version control next to the code
//! that declares the schema, so it is plain, pretty-printed JSON with a
//! stable key order:
//!
//! ```text
//! {
//!   "_note1": "...",
//!   "_note2": "...",
//!   "_note3": "...",
//!   "modelVersionParserMinimum": 5,
//!   "lastEntityId": "<id>:<uid>",
//!   "lastIndexId": "<id>:<uid>",
//!   "entities": [
//!     {
//!       "id": "<id>:<uid>",
//!       "name": "...",
//!       "lastPropertyId": "<id>:<uid>",
//!       "properties": [
//!         { "id": "<id>:<uid>", "name": "...", "type": 6, "flags": 1, "indexId": "<id>:<uid>" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! `flags` is omitted when zero and `indexId` when the property has no index.

use ironbox_core::{Error, IdUid, Model, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parser version written to (and required from) metadata files
pub const MODEL_PARSER_VERSION: u64 = 5;

/// Default metadata file name
pub const DEFAULT_MODEL_FILE: &str = "ironbox-model.json";

const NOTE1: &str = "KEEP THIS FILE! Check it into a version control system (VCS) like git.";
const NOTE2: &str = "Ironbox manages crucial IDs for your object model. See docs for details.";
const NOTE3: &str =
    "If you have VCS merge conflicts, you must resolve them according to Ironbox docs.";

/// Property entry of the metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    /// Property identity
    pub id: IdUid,
    /// Property name
    pub name: String,
    /// Value kind code
    #[serde(rename = "type")]
    pub kind: u32,
    /// Flag bits
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    /// Index identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<IdUid>,
}

/// Entity entry of the metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Entity identity
    pub id: IdUid,
    /// Entity name
    pub name: String,
    /// Highest property identity ever assigned
    #[serde(deserialize_with = "lenient_iduid")]
    pub last_property_id: IdUid,
    /// Properties in model order
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
}

impl EntityRecord {
    /// Property by UID
    pub fn property_by_uid(&self, uid: u64) -> Option<&PropertyRecord> {
        self.properties.iter().find(|p| p.id.uid == uid)
    }

    /// Property by name
    pub fn property_by_name(&self, name: &str) -> Option<&PropertyRecord> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Whole metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    #[serde(rename = "_note1", default)]
    note1: String,
    #[serde(rename = "_note2", default)]
    note2: String,
    #[serde(rename = "_note3", default)]
    note3: String,
    /// Minimum parser version able to read this file
    #[serde(default)]
    pub model_version_parser_minimum: u64,
    /// Highest entity identity ever assigned
    #[serde(default, deserialize_with = "lenient_iduid")]
    pub last_entity_id: IdUid,
    /// Highest index identity ever assigned
    #[serde(default, deserialize_with = "lenient_iduid")]
    pub last_index_id: IdUid,
    /// Entities in model order
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

// Older generators wrote "" for counters that were never assigned.
fn lenient_iduid<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<IdUid, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Ok(IdUid::UNASSIGNED);
    }
    s.parse().map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    #[serde(default)]
    model_version_parser_minimum: u64,
}

impl ModelFile {
    /// Snapshot of a (fully assigned) model
    pub fn from_model(model: &Model) -> Self {
        let entities = model
            .entities
            .iter()
            .map(|entity| EntityRecord {
                id: entity.identity,
                name: entity.name.clone(),
                last_property_id: entity.last_property_identity,
                properties: entity
                    .properties
                    .iter()
                    .map(|prop| PropertyRecord {
                        id: prop.identity,
                        name: prop.name.clone(),
                        kind: prop.kind.code(),
                        flags: prop.flags.bits(),
                        index_id: prop.index.as_ref().map(|i| i.identity),
                    })
                    .collect(),
            })
            .collect();

        ModelFile {
            note1: NOTE1.to_string(),
            note2: NOTE2.to_string(),
            note3: NOTE3.to_string(),
            model_version_parser_minimum: MODEL_PARSER_VERSION,
            last_entity_id: model.last_entity_identity,
            last_index_id: model.last_index_identity,
            entities,
        }
    }

    /// Parse file contents, enforcing the parser version gate
    ///
    /// `origin` only labels error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let parse_error = |reason: String| Error::MetadataParse {
            path: origin.to_string(),
            reason,
        };

        if text.lines().any(|l| l.starts_with("<<<<<<<") || l.starts_with(">>>>>>>")) {
            return Err(parse_error(
                "unresolved VCS merge conflict markers; resolve the conflict first".to_string(),
            ));
        }

        let probe: VersionProbe =
            serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;
        if probe.model_version_parser_minimum > MODEL_PARSER_VERSION {
            return Err(Error::IncompatibleMetadataVersion {
                found: probe.model_version_parser_minimum,
                supported: MODEL_PARSER_VERSION,
            });
        }

        serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))
    }

    /// Pretty-printed JSON (2-space indentation, trailing newline)
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self).map_err(|e| Error::MetadataParse {
            path: String::new(),
            reason: e.to_string(),
        })?;
        text.push('\n');
        Ok(text)
    }

    /// Entity by UID
    pub fn entity_by_uid(&self, uid: u64) -> Option<&EntityRecord> {
        self.entities.iter().find(|e| e.id.uid == uid)
    }

    /// Entity by name
    pub fn entity_by_name(&self, name: &str) -> Option<&EntityRecord> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Every UID used in the file
    ///
    /// # Errors
    ///
    /// Returns `DuplicateUid` if a UID appears twice.
    pub fn assigned_uids(&self) -> Result<HashSet<u64>> {
        let mut uids = HashSet::new();
        let mut insert = |uid: u64, element: String| {
            if uid != 0 && !uids.insert(uid) {
                return Err(Error::DuplicateUid { uid, element });
            }
            Ok(())
        };

        for entity in &self.entities {
            insert(entity.id.uid, format!("entity {}", entity.name))?;
            for prop in &entity.properties {
                insert(prop.id.uid, format!("property {}.{}", entity.name, prop.name))?;
                if let Some(index) = prop.index_id {
                    insert(index.uid, format!("index {}.{}", entity.name, prop.name))?;
                }
            }
        }
        Ok(uids)
    }
}

/// Metadata file persistence
///
/// Handles atomic persistence using the write-fsync-rename pattern, so an
/// interrupted write never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct MetadataFile {
    path: PathBuf,
}

impl MetadataFile {
    /// Metadata file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MetadataFile { path: path.into() }
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file; `None` if it does not exist
    pub fn load(&self) -> Result<Option<ModelFile>> {
        if !self.path.exists() {
            debug!(target: "ironbox::sync", path = %self.path.display(), "Model file not found");
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        let file = ModelFile::parse(&text, &self.path.display().to_string())?;
        debug!(
            target: "ironbox::sync",
            path = %self.path.display(),
            entities = file.entities.len(),
            "Loaded model file"
        );
        Ok(Some(file))
    }

    /// Write the file atomically (write-fsync-rename)
    pub fn persist(&self, file: &ModelFile) -> Result<()> {
        let text = file.to_json()?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut temp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        temp.write_all(text.as_bytes())?;
        temp.sync_all()?;
        drop(temp);

        std::fs::rename(&temp_path, &self.path)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && parent.exists() {
                // Directory fsync is not supported everywhere; best effort.
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }
        }
        Ok(())
    }
}
