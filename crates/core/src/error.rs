//! Error types for Ironbox
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every variant that originates from a schema element carries enough context
//! (entity name, property name, UID) to locate the offending declaration.

use std::io;
use thiserror::Error;

/// Result type alias for Ironbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Ironbox
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Synchronization errors
    // ========================================================================
    /// Synchronizing a model without entities
    #[error("A valid model must have at least one entity")]
    EmptyModel,

    /// Metadata file requires a newer parser
    #[error("Incompatible model file version (unparsable): supported {supported} < required {found}")]
    IncompatibleMetadataVersion {
        /// `modelVersionParserMinimum` found in the file
        found: u64,
        /// Parser version implemented here
        supported: u64,
    },

    /// A UID is already assigned to another schema element
    #[error("UID {uid} of {element} is already assigned elsewhere")]
    DuplicateUid {
        /// Colliding UID
        uid: u64,
        /// Human-readable element description (e.g. "property Task.text")
        element: String,
    },

    /// Matched schema element disagrees with the persisted one
    #[error("Property {entity}.{property} mismatches property found in model file: {field} {expected} != {found} (in file)")]
    SchemaMismatch {
        /// Entity name
        entity: String,
        /// Property name
        property: String,
        /// Field that differs ("type", "flags", "index")
        field: &'static str,
        /// Value declared in code
        expected: String,
        /// Value recorded in the metadata file
        found: String,
    },

    /// Metadata file could not be parsed
    #[error("Model file {path} could not be parsed: {reason}")]
    MetadataParse {
        /// Path of the metadata file
        path: String,
        /// Parser message
        reason: String,
    },

    /// Malformed `"id:uid"` string
    #[error("Invalid ID/UID string '{0}', expected \"<id>:<uid>\"")]
    InvalidIdUid(String),

    // ========================================================================
    // Schema construction errors
    // ========================================================================
    /// Entity declares no primary key property
    #[error("Entity {entity}: ID property is not defined")]
    MissingIdProperty {
        /// Entity name
        entity: String,
    },

    /// Primary key property is not of an integer kind
    #[error("Entity {entity}: ID property '{property}' must be an integer, got {kind}")]
    InvalidIdType {
        /// Entity name
        entity: String,
        /// Property name
        property: String,
        /// Declared kind
        kind: String,
    },

    /// More than one primary key property
    #[error("Entity {entity}: duplicate ID property: '{first}' and '{second}'")]
    DuplicateIdProperty {
        /// Entity name
        entity: String,
        /// First ID property
        first: String,
        /// Second ID property
        second: String,
    },

    /// Two properties with the same name in one entity
    #[error("Entity {entity}: duplicate property '{property}'")]
    DuplicateProperty {
        /// Entity name
        entity: String,
        /// Property name
        property: String,
    },

    /// Two entities with the same name in one model
    #[error("Model already contains an entity named '{0}'")]
    DuplicateEntity(String),

    /// Index not compatible with the property it is declared on
    #[error("Property {entity}.{property}: invalid index: {reason}")]
    InvalidIndex {
        /// Entity name
        entity: String,
        /// Property name
        property: String,
        /// Why the index was rejected
        reason: String,
    },

    // ========================================================================
    // Codec errors
    // ========================================================================
    /// Value kind has no encoder/decoder for the requested operation
    #[error("Property '{property}': unsupported value kind {kind}")]
    UnsupportedValueKind {
        /// Property name
        property: String,
        /// Kind description
        kind: String,
    },

    /// Object value does not match the declared kind
    #[error("Property '{property}': expected a value for {expected}, got {found}")]
    ValueMismatch {
        /// Property name
        property: String,
        /// Declared kind
        expected: String,
        /// Type name of the supplied value
        found: &'static str,
    },

    /// Value does not fit into the declared kind's width
    #[error("Property '{property}': value {value} out of range for {kind}")]
    ValueOutOfRange {
        /// Property name
        property: String,
        /// Declared kind
        kind: String,
        /// Offending value
        value: String,
    },

    /// Timestamp cannot be represented as an epoch integer
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Malformed or truncated binary record
    #[error("Record decode error: {0}")]
    RecordDecode(String),

    /// Schema element used before the synchronizer assigned its identity
    #[error("{0} has no assigned identity; synchronize the model first")]
    UnassignedIdentity(String),

    // ========================================================================
    // Engine / environment errors
    // ========================================================================
    /// Entity is not part of the opened model
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Core engine rejected an operation
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a record decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::RecordDecode(msg.into())
    }

    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(
        entity: &str,
        property: &str,
        field: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Error::SchemaMismatch {
            entity: entity.to_string(),
            property: property.to_string(),
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create an invalid index error
    pub fn invalid_index(entity: &str, property: &str, reason: impl Into<String>) -> Self {
        Error::InvalidIndex {
            entity: entity.to_string(),
            property: property.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the declared schema (as opposed to I/O or data)
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyModel
                | Error::DuplicateUid { .. }
                | Error::SchemaMismatch { .. }
                | Error::MissingIdProperty { .. }
                | Error::InvalidIdType { .. }
                | Error::DuplicateIdProperty { .. }
                | Error::DuplicateProperty { .. }
                | Error::DuplicateEntity(_)
                | Error::InvalidIndex { .. }
        )
    }
}
