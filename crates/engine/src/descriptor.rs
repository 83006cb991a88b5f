//! Model descriptor bytes
//!
//! The flattened binary form of a synchronized [`Model`] that a core engine
//! consumes on open. Layout (all integers little-endian):
//!
//! ```text
//! magic "IBXM" | u32 format version
//! id pair last_entity | id pair last_index | id pair last_relation
//! u32 entity count, then per entity:
//!   id pair | str name | id pair last_property | u32 property count, then per property:
//!     id pair | str name | u32 type code | u32 flags | u8 index tag
//!     [id pair index]                    (tag != 0)
//!     [HNSW parameters]                  (tag == 4)
//! u32 CRC32 of everything above
//! ```
//!
//! An id pair is `u32 id, u64 uid`; a str is `u32 length, UTF-8 bytes`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ironbox_core::{
    DistanceType, EntityDescriptor, Error, HnswFlags, HnswParams, IdUid, IndexDescriptor,
    IndexKind, Model, PropertyDescriptor, PropertyFlags, Result, ValueKind,
};
use std::io::{Cursor, Read, Write};

/// Magic bytes: "IBXM"
pub const MODEL_MAGIC: [u8; 4] = *b"IBXM";

/// Current descriptor format version
pub const MODEL_FORMAT_VERSION: u32 = 1;

const TAG_NONE: u8 = 0;
const TAG_VALUE: u8 = 1;
const TAG_HASH: u8 = 2;
const TAG_HASH64: u8 = 3;
const TAG_HNSW: u8 = 4;

/// Conversion between a [`Model`] and its descriptor bytes
pub struct ModelDescriptor;

impl ModelDescriptor {
    /// Serialize a fully synchronized model
    ///
    /// # Errors
    ///
    /// `UnassignedIdentity` if any element still lacks an ID or UID.
    pub fn to_bytes(model: &Model) -> Result<Vec<u8>> {
        if !model.is_assigned() {
            let element = model
                .entities
                .iter()
                .find(|e| !e.is_assigned())
                .map(|e| format!("entity {}", e.name))
                .unwrap_or_else(|| "model".to_string());
            return Err(Error::UnassignedIdentity(element));
        }

        let mut bytes = Vec::new();
        bytes.write_all(&MODEL_MAGIC)?;
        bytes.write_u32::<LittleEndian>(MODEL_FORMAT_VERSION)?;
        write_iduid(&mut bytes, model.last_entity_identity)?;
        write_iduid(&mut bytes, model.last_index_identity)?;
        write_iduid(&mut bytes, model.last_relation_identity)?;

        bytes.write_u32::<LittleEndian>(model.entities.len() as u32)?;
        for entity in &model.entities {
            write_entity(&mut bytes, entity)?;
        }

        let crc = crc32fast::hash(&bytes);
        bytes.write_u32::<LittleEndian>(crc)?;
        Ok(bytes)
    }

    /// Parse descriptor bytes back into a model
    ///
    /// Date representations are a binding concern and are not part of the
    /// descriptor; they come back as the default.
    pub fn from_bytes(bytes: &[u8]) -> Result<Model> {
        if bytes.len() < MODEL_MAGIC.len() + 8 {
            return Err(Error::engine("model descriptor too short"));
        }
        if bytes[0..4] != MODEL_MAGIC {
            return Err(Error::engine("model descriptor has an invalid magic"));
        }

        let (data, trailer) = bytes.split_at(bytes.len() - 4);
        let stored_crc = Cursor::new(trailer).read_u32::<LittleEndian>()?;
        let computed_crc = crc32fast::hash(data);
        if stored_crc != computed_crc {
            return Err(Error::engine(format!(
                "model descriptor checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, computed_crc
            )));
        }

        let mut reader = Cursor::new(&data[4..]);
        parse_model(&mut reader).map_err(|e| match e {
            Error::Io(io) => Error::engine(format!("malformed model descriptor: {}", io)),
            other => other,
        })
    }
}

fn write_iduid(out: &mut Vec<u8>, iduid: IdUid) -> Result<()> {
    out.write_u32::<LittleEndian>(iduid.id)?;
    out.write_u64::<LittleEndian>(iduid.uid)?;
    Ok(())
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn write_entity(out: &mut Vec<u8>, entity: &EntityDescriptor) -> Result<()> {
    write_iduid(out, entity.identity)?;
    write_str(out, &entity.name)?;
    write_iduid(out, entity.last_property_identity)?;
    out.write_u32::<LittleEndian>(entity.properties.len() as u32)?;
    for prop in &entity.properties {
        write_property(out, prop)?;
    }
    Ok(())
}

fn write_property(out: &mut Vec<u8>, prop: &PropertyDescriptor) -> Result<()> {
    write_iduid(out, prop.identity)?;
    write_str(out, &prop.name)?;
    out.write_u32::<LittleEndian>(prop.kind.code())?;
    out.write_u32::<LittleEndian>(prop.flags.bits())?;

    let index = match &prop.index {
        Some(index) => index,
        None => return Ok(out.write_u8(TAG_NONE)?),
    };
    let tag = match index.kind {
        IndexKind::Value => TAG_VALUE,
        IndexKind::Hash => TAG_HASH,
        IndexKind::Hash64 => TAG_HASH64,
        IndexKind::Hnsw(_) => TAG_HNSW,
    };
    out.write_u8(tag)?;
    write_iduid(out, index.identity)?;

    if let IndexKind::Hnsw(params) = &index.kind {
        out.write_u32::<LittleEndian>(params.dimensions)?;
        out.write_u32::<LittleEndian>(params.distance_type.code())?;
        out.write_u32::<LittleEndian>(params.neighbors_per_node.unwrap_or(0))?;
        out.write_u32::<LittleEndian>(params.indexing_search_count.unwrap_or(0))?;
        out.write_u32::<LittleEndian>(params.flags.bits())?;
        match params.reparation_backlink_probability {
            Some(p) => {
                out.write_u8(1)?;
                out.write_f32::<LittleEndian>(p)?;
            }
            None => {
                out.write_u8(0)?;
                out.write_f32::<LittleEndian>(0.0)?;
            }
        }
        out.write_u64::<LittleEndian>(params.vector_cache_hint_size_kb.unwrap_or(0))?;
    }
    Ok(())
}

fn read_iduid(r: &mut Cursor<&[u8]>) -> Result<IdUid> {
    let id = r.read_u32::<LittleEndian>()?;
    let uid = r.read_u64::<LittleEndian>()?;
    Ok(IdUid::new(id, uid))
}

fn read_str(r: &mut Cursor<&[u8]>) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len() - r.position() as usize;
    if len > remaining {
        return Err(Error::engine(format!("string of {} bytes exceeds the descriptor", len)));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::engine("model descriptor contains invalid UTF-8"))
}

fn nonzero<T: Default + PartialEq>(v: T) -> Option<T> {
    (v != T::default()).then_some(v)
}

fn parse_model(r: &mut Cursor<&[u8]>) -> Result<Model> {
    let version = r.read_u32::<LittleEndian>()?;
    if version != MODEL_FORMAT_VERSION {
        return Err(Error::engine(format!(
            "unsupported model descriptor version {} (expected {})",
            version, MODEL_FORMAT_VERSION
        )));
    }

    let mut model = Model::new();
    model.last_entity_identity = read_iduid(r)?;
    model.last_index_identity = read_iduid(r)?;
    model.last_relation_identity = read_iduid(r)?;

    let entity_count = r.read_u32::<LittleEndian>()?;
    for _ in 0..entity_count {
        let identity = read_iduid(r)?;
        let name = read_str(r)?;
        let last_property_identity = read_iduid(r)?;
        let property_count = r.read_u32::<LittleEndian>()?;
        let mut properties = Vec::new();
        for _ in 0..property_count {
            properties.push(parse_property(r, &name)?);
        }
        model.add_entity(EntityDescriptor {
            identity,
            name,
            properties,
            last_property_identity,
        })?;
    }
    Ok(model)
}

fn parse_property(r: &mut Cursor<&[u8]>, entity: &str) -> Result<PropertyDescriptor> {
    let identity = read_iduid(r)?;
    let name = read_str(r)?;
    let code = r.read_u32::<LittleEndian>()?;
    let kind = ValueKind::from_code(code).ok_or_else(|| Error::UnsupportedValueKind {
        property: format!("{}.{}", entity, name),
        kind: format!("type code {}", code),
    })?;
    let flags = PropertyFlags::from_bits(r.read_u32::<LittleEndian>()?);

    let index = match r.read_u8()? {
        TAG_NONE => None,
        tag => {
            let identity = read_iduid(r)?;
            let kind = match tag {
                TAG_VALUE => IndexKind::Value,
                TAG_HASH => IndexKind::Hash,
                TAG_HASH64 => IndexKind::Hash64,
                TAG_HNSW => IndexKind::Hnsw(parse_hnsw(r)?),
                other => {
                    return Err(Error::engine(format!(
                        "property {}.{}: unknown index tag {}",
                        entity, name, other
                    )))
                }
            };
            Some(IndexDescriptor { identity, kind })
        }
    };

    Ok(PropertyDescriptor {
        identity,
        name,
        kind,
        flags,
        index,
        date_repr: Default::default(),
    })
}

fn parse_hnsw(r: &mut Cursor<&[u8]>) -> Result<HnswParams> {
    let dimensions = r.read_u32::<LittleEndian>()?;
    let distance = r.read_u32::<LittleEndian>()?;
    let distance_type = DistanceType::from_code(distance)
        .ok_or_else(|| Error::engine(format!("unknown HNSW distance type {}", distance)))?;
    let neighbors_per_node = nonzero(r.read_u32::<LittleEndian>()?);
    let indexing_search_count = nonzero(r.read_u32::<LittleEndian>()?);
    let flags = HnswFlags::from_bits(r.read_u32::<LittleEndian>()?);
    let has_probability = r.read_u8()? != 0;
    let probability = r.read_f32::<LittleEndian>()?;
    let vector_cache_hint_size_kb = nonzero(r.read_u64::<LittleEndian>()?);

    Ok(HnswParams {
        dimensions,
        distance_type,
        neighbors_per_node,
        indexing_search_count,
        flags,
        reparation_backlink_probability: has_probability.then_some(probability),
        vector_cache_hint_size_kb,
    })
}
