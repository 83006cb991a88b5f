//! Entity codec: objects to binary records and back
//!
//! An [`EntityCodec`] is built once per entity from its (synchronized)
//! descriptor. It resolves the slot and kind of every property up front so
//! that marshaling is a straight walk over the properties.
//!
//! Compatibility rules:
//! - a record written with fewer properties decodes with kind defaults for
//!   the missing ones
//! - a record written with more properties decodes; unknown slots are ignored
//! - the primary key is always written as the id assigned by the caller

use crate::flex;
use crate::record::{RecordBuilder, TableReader};
use crate::scratch::ScratchPool;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use ironbox_core::time::{date_value_to_int, int_to_date_value};
use ironbox_core::{
    DateRepr, EntityDescriptor, Error, FlexValue, Object, PropertyDescriptor, Result, Value,
    ValueKind,
};
use tracing::trace;

/// Per-property encoding plan
#[derive(Debug, Clone)]
struct FieldCodec {
    name: String,
    slot: usize,
    kind: ValueKind,
    date_repr: DateRepr,
    is_id: bool,
}

/// Encoder/decoder for the records of one entity
#[derive(Debug, Clone)]
pub struct EntityCodec {
    entity: String,
    slot_count: usize,
    fields: Vec<FieldCodec>,
}

impl EntityCodec {
    /// Resolve the encoding plan of `entity`
    ///
    /// # Errors
    ///
    /// `UnassignedIdentity` if a property has no ID yet (the model was not
    /// synchronized).
    pub fn new(entity: &EntityDescriptor) -> Result<Self> {
        let mut fields = Vec::with_capacity(entity.properties.len());
        let mut slot_count = entity.last_property_identity.id as usize;

        for prop in &entity.properties {
            let slot = prop.slot().ok_or_else(|| {
                Error::UnassignedIdentity(format!("property {}.{}", entity.name, prop.name))
            })?;
            slot_count = slot_count.max(slot + 1);
            fields.push(FieldCodec::new(prop, slot));
        }

        Ok(EntityCodec {
            entity: entity.name.clone(),
            slot_count,
            fields,
        })
    }

    /// Entity name
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Name of the primary key property
    pub fn id_property(&self) -> Option<&str> {
        self.fields.iter().find(|f| f.is_id).map(|f| f.name.as_str())
    }

    /// Encode `object` as a record with primary key `assigned_id`
    ///
    /// Properties missing from the object (or `Null`) are written as the
    /// kind default. `assigned_id` must fit the primary key's kind
    /// (`ValueOutOfRange` otherwise).
    pub fn marshal(&self, object: &Object, assigned_id: u64) -> Result<Vec<u8>> {
        let mut builder = ScratchPool::acquire();
        let result = self.stage(&mut builder, object, assigned_id).and_then(|()| builder.finish(self.slot_count));
        ScratchPool::release(builder);
        let record = result?;
        trace!(target: "ironbox::codec", entity = %self.entity, id = assigned_id, bytes = record.len(), "Marshaled record");
        Ok(record)
    }

    fn stage(&self, builder: &mut RecordBuilder, object: &Object, assigned_id: u64) -> Result<()> {
        for field in &self.fields {
            if field.is_id {
                let id = i64::try_from(assigned_id).map_err(|_| field.out_of_range(assigned_id))?;
                field.encode(builder, &Value::Int(id))?;
                continue;
            }
            let value = object.get(&field.name).unwrap_or(&Value::Null);
            field.encode(builder, value)?;
        }
        Ok(())
    }

    /// Decode a record into an object holding every property of the entity
    pub fn unmarshal(&self, record: &[u8]) -> Result<Object> {
        let reader = TableReader::new(record)?;
        let mut object = Object::new();
        for field in &self.fields {
            let value = field.decode(&reader)?;
            object.set(field.name.clone(), value);
        }
        Ok(object)
    }
}

impl FieldCodec {
    fn new(prop: &PropertyDescriptor, slot: usize) -> Self {
        FieldCodec {
            name: prop.name.clone(),
            slot,
            kind: prop.kind,
            date_repr: prop.date_repr,
            is_id: prop.is_id(),
        }
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::ValueMismatch {
            property: self.name.clone(),
            expected: self.kind.to_string(),
            found: value.type_name(),
        }
    }

    fn out_of_range(&self, value: impl ToString) -> Error {
        Error::ValueOutOfRange {
            property: self.name.clone(),
            kind: self.kind.to_string(),
            value: value.to_string(),
        }
    }

    /// Range-check an integer against `kind`
    fn check_int(&self, kind: ValueKind, v: i64) -> Result<i64> {
        match kind.integer_range() {
            Some((min, max)) if v < min || v > max => Err(self.out_of_range(v)),
            _ => Ok(v),
        }
    }

    fn encode(&self, builder: &mut RecordBuilder, value: &Value) -> Result<()> {
        if value.is_null() {
            return self.encode_default(builder);
        }
        let slot = self.slot;
        match self.kind {
            ValueKind::Bool => match value {
                Value::Bool(b) => builder.scalar(slot, 1, u64::from(*b)),
                other => return Err(self.mismatch(other)),
            },
            ValueKind::Byte | ValueKind::Short | ValueKind::Char | ValueKind::Int | ValueKind::Long => {
                let v = match value {
                    Value::Int(v) => self.check_int(self.kind, *v)?,
                    other => return Err(self.mismatch(other)),
                };
                let width = self.kind.inline_width().unwrap_or(8);
                builder.scalar(slot, width, v as u64);
            }
            ValueKind::Float => {
                let v = self.float(value)?;
                builder.scalar(slot, 4, u64::from((v as f32).to_bits()));
            }
            ValueKind::Double => {
                let v = self.float(value)?;
                builder.scalar(slot, 8, v.to_bits());
            }
            ValueKind::Date | ValueKind::DateNano => {
                let v = self.date(value)?;
                builder.scalar(slot, 8, v as u64);
            }
            ValueKind::String => match value {
                Value::String(s) => builder.string(slot, s)?,
                other => return Err(self.mismatch(other)),
            },
            ValueKind::Flex => {
                let flex = value.to_flex().ok_or_else(|| self.mismatch(value))?;
                builder.bytes(slot, &flex::encode(&self.name, &flex)?)?;
            }
            ValueKind::ByteVector => match value {
                Value::Bytes(bytes) => builder.bytes(slot, bytes)?,
                other => return Err(self.mismatch(other)),
            },
            ValueKind::BoolVector => match value {
                Value::BoolVector(items) => builder.vector(slot, 1, items.len(), |buf| {
                    buf.extend(items.iter().map(|&b| u8::from(b)));
                    Ok(())
                })?,
                other => return Err(self.mismatch(other)),
            },
            ValueKind::ShortVector
            | ValueKind::CharVector
            | ValueKind::IntVector
            | ValueKind::LongVector
            | ValueKind::DateVector
            | ValueKind::DateNanoVector => {
                let items = match value {
                    Value::IntVector(items) => items,
                    other => return Err(self.mismatch(other)),
                };
                let element = self.kind.element().unwrap_or(ValueKind::Long);
                let width = element.inline_width().unwrap_or(8);
                for &v in items {
                    self.check_int(element, v)?;
                }
                builder.vector(slot, width, items.len(), |buf| {
                    for &v in items {
                        match width {
                            2 => buf.write_u16::<LittleEndian>(v as u16)?,
                            4 => buf.write_i32::<LittleEndian>(v as i32)?,
                            _ => buf.write_i64::<LittleEndian>(v)?,
                        }
                    }
                    Ok(())
                })?;
            }
            ValueKind::FloatVector => {
                let items: Vec<f32> = match value {
                    Value::FloatVector(items) => items.clone(),
                    Value::DoubleVector(items) => items.iter().map(|&v| v as f32).collect(),
                    other => return Err(self.mismatch(other)),
                };
                builder.vector(slot, 4, items.len(), |buf| {
                    for v in items {
                        buf.write_f32::<LittleEndian>(v)?;
                    }
                    Ok(())
                })?;
            }
            ValueKind::DoubleVector => {
                let items: Vec<f64> = match value {
                    Value::DoubleVector(items) => items.clone(),
                    Value::FloatVector(items) => items.iter().map(|&v| f64::from(v)).collect(),
                    other => return Err(self.mismatch(other)),
                };
                builder.vector(slot, 8, items.len(), |buf| {
                    for v in items {
                        buf.write_f64::<LittleEndian>(v)?;
                    }
                    Ok(())
                })?;
            }
            ValueKind::StringVector => match value {
                Value::StringVector(items) => builder.strings(slot, items.iter().map(String::as_str))?,
                other => return Err(self.mismatch(other)),
            },
        }
        Ok(())
    }

    fn encode_default(&self, builder: &mut RecordBuilder) -> Result<()> {
        match self.kind.inline_width() {
            Some(width) => builder.scalar(self.slot, width, 0),
            None => match self.kind {
                ValueKind::String => builder.string(self.slot, "")?,
                ValueKind::Flex => builder.bytes(self.slot, &flex::encode(&self.name, &FlexValue::Null)?)?,
                ValueKind::StringVector => builder.strings(self.slot, std::iter::empty())?,
                _ => {
                    let width = self.kind.element().and_then(|e| e.inline_width()).unwrap_or(1);
                    builder.vector(self.slot, width, 0, |_| Ok(()))?
                }
            },
        }
        Ok(())
    }

    fn float(&self, value: &Value) -> Result<f64> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(self.mismatch(other)),
        }
    }

    fn date(&self, value: &Value) -> Result<i64> {
        match value {
            Value::Int(_) | Value::Float(_) | Value::Timestamp(_) | Value::LocalTimestamp(_) => {
                let units = self.kind.date_units_per_second().unwrap_or(1_000);
                date_value_to_int(value, units)
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, reader: &TableReader<'_>) -> Result<Value> {
        let slot = self.slot;
        let absent = || Value::default_for(self.kind, self.date_repr);

        let value = match self.kind {
            ValueKind::Bool => reader.scalar(slot, 1)?.map(|b| Value::Bool(b[0] != 0)),
            ValueKind::Byte => reader.scalar(slot, 1)?.map(|b| Value::Int(i64::from(b[0] as i8))),
            ValueKind::Short => reader
                .scalar(slot, 2)?
                .map(|b| Value::Int(i64::from(LittleEndian::read_i16(b)))),
            ValueKind::Char => reader
                .scalar(slot, 2)?
                .map(|b| Value::Int(i64::from(LittleEndian::read_u16(b)))),
            ValueKind::Int => reader
                .scalar(slot, 4)?
                .map(|b| Value::Int(i64::from(LittleEndian::read_i32(b)))),
            ValueKind::Long => reader.scalar(slot, 8)?.map(|b| Value::Int(LittleEndian::read_i64(b))),
            ValueKind::Float => reader
                .scalar(slot, 4)?
                .map(|b| Value::Float(f64::from(LittleEndian::read_f32(b)))),
            ValueKind::Double => reader.scalar(slot, 8)?.map(|b| Value::Float(LittleEndian::read_f64(b))),
            ValueKind::Date | ValueKind::DateNano => match reader.scalar(slot, 8)? {
                Some(b) => {
                    let units = self.kind.date_units_per_second().unwrap_or(1_000);
                    Some(int_to_date_value(LittleEndian::read_i64(b), units, self.date_repr)?)
                }
                None => None,
            },
            ValueKind::String => reader.string(slot)?.map(|s| Value::String(s.to_string())),
            ValueKind::Flex => match reader.vector(slot, 1)? {
                Some((bytes, _)) => Some(Value::Flex(flex::decode(&self.name, bytes)?)),
                None => None,
            },
            ValueKind::ByteVector => reader.vector(slot, 1)?.map(|(bytes, _)| Value::Bytes(bytes.to_vec())),
            ValueKind::BoolVector => reader
                .vector(slot, 1)?
                .map(|(bytes, _)| Value::BoolVector(bytes.iter().map(|&b| b != 0).collect())),
            ValueKind::ShortVector => reader.vector(slot, 2)?.map(|(bytes, _)| {
                Value::IntVector(bytes.chunks_exact(2).map(|c| i64::from(LittleEndian::read_i16(c))).collect())
            }),
            ValueKind::CharVector => reader.vector(slot, 2)?.map(|(bytes, _)| {
                Value::IntVector(bytes.chunks_exact(2).map(|c| i64::from(LittleEndian::read_u16(c))).collect())
            }),
            ValueKind::IntVector => reader.vector(slot, 4)?.map(|(bytes, _)| {
                Value::IntVector(bytes.chunks_exact(4).map(|c| i64::from(LittleEndian::read_i32(c))).collect())
            }),
            ValueKind::LongVector | ValueKind::DateVector | ValueKind::DateNanoVector => {
                reader.vector(slot, 8)?.map(|(bytes, _)| {
                    Value::IntVector(bytes.chunks_exact(8).map(LittleEndian::read_i64).collect())
                })
            }
            ValueKind::FloatVector => reader.vector(slot, 4)?.map(|(bytes, _)| {
                Value::FloatVector(bytes.chunks_exact(4).map(LittleEndian::read_f32).collect())
            }),
            ValueKind::DoubleVector => reader.vector(slot, 8)?.map(|(bytes, _)| {
                Value::DoubleVector(bytes.chunks_exact(8).map(LittleEndian::read_f64).collect())
            }),
            ValueKind::StringVector => reader
                .strings(slot)?
                .map(|items| Value::StringVector(items.into_iter().map(str::to_string).collect())),
        };
        Ok(value.unwrap_or_else(absent))
    }
}
