use std::fmt;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::value::Field;
use crate::file::PageId;

/// Physical placement of a tuple (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row of field values conforming to a `TupleDesc`
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple with every field set to NULL
    pub fn new(desc: Arc<TupleDesc>) -> RecordResult<Self> {
        if desc.num_fields() == 0 {
            return Err(RecordError::EmptySchema);
        }
        let fields = vec![Field::Null; desc.num_fields()];
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    /// Create a tuple from values, validated against the schema
    pub fn with_fields(desc: Arc<TupleDesc>, fields: Vec<Field>) -> RecordResult<Self> {
        if desc.num_fields() == 0 {
            return Err(RecordError::EmptySchema);
        }
        desc.validate(&fields)?;
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    fn check_index(&self, index: usize) -> RecordResult<()> {
        if index >= self.fields.len() {
            return Err(RecordError::FieldIndexOutOfRange {
                index,
                len: self.fields.len(),
            });
        }
        Ok(())
    }

    /// Get the field at `index`
    pub fn field(&self, index: usize) -> RecordResult<&Field> {
        self.check_index(index)?;
        Ok(&self.fields[index])
    }

    /// Replace the field at `index`
    pub fn set_field(&mut self, index: usize, field: Field) -> RecordResult<()> {
        self.check_index(index)?;
        let data_type = &self.desc.columns()[index].data_type;
        if !field.conforms_to(data_type) {
            return Err(RecordError::TypeMismatch {
                expected: data_type.to_string(),
                actual: format!("{:?}", field),
            });
        }
        self.fields[index] = field;
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Serialize to the fixed-width slot format.
    /// Format: [NULL bitmap] [field0] [field1] ...
    pub fn serialize(&self) -> RecordResult<Vec<u8>> {
        let mut result = Vec::with_capacity(self.desc.tuple_size());

        let mut bitmap = vec![0u8; self.desc.null_bitmap_size()];
        for (i, field) in self.fields.iter().enumerate() {
            if field.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        result.extend_from_slice(&bitmap);

        for (field, col) in self.fields.iter().zip(self.desc.columns()) {
            result.extend_from_slice(&field.serialize(&col.data_type)?);
        }

        Ok(result)
    }

    /// Deserialize a slot's bytes
    pub fn deserialize(data: &[u8], desc: Arc<TupleDesc>) -> RecordResult<Self> {
        if data.len() != desc.tuple_size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes, got {}",
                desc.tuple_size(),
                data.len()
            )));
        }

        let bitmap_size = desc.null_bitmap_size();
        let bitmap = &data[..bitmap_size];
        let mut offset = bitmap_size;
        let mut fields = Vec::with_capacity(desc.num_fields());

        for (i, col) in desc.columns().iter().enumerate() {
            let is_null = (bitmap[i / 8] & (1 << (i % 8))) != 0;
            let col_data = &data[offset..offset + col.size()];
            fields.push(Field::deserialize(col_data, &col.data_type, is_null)?);
            offset += col.size();
        }

        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    /// Fields separated by tabs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
