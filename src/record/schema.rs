use super::error::{RecordError, RecordResult};
use super::value::{DataType, Field};

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Get the size of this column in bytes
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Schema of the tuples stored in one heap file.
///
/// Two descriptors are equal when their column types match in order; column
/// names are labels only.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    columns: Vec<ColumnDef>,
    null_bitmap_size: usize,
    tuple_size: usize,
}

impl TupleDesc {
    /// Create a new tuple descriptor
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        let null_bitmap_size = columns.len().div_ceil(8); // ⌈n/8⌉
        let tuple_size = null_bitmap_size + columns.iter().map(|c| c.size()).sum::<usize>();

        Self {
            columns,
            null_bitmap_size,
            tuple_size,
        }
    }

    /// Descriptor with generated column names `c0`, `c1`, ...
    pub fn from_types(types: Vec<DataType>) -> Self {
        Self::new(
            types
                .into_iter()
                .enumerate()
                .map(|(i, t)| ColumnDef::new(format!("c{}", i), t))
                .collect(),
        )
    }

    /// Parse a comma separated list such as `int,char(16),float`.
    /// Entries may carry a name: `id:int,name:char(16)`.
    pub fn parse(spec: &str) -> RecordResult<Self> {
        let mut columns = Vec::new();
        for (i, entry) in spec.split(',').enumerate() {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let column = match entry.split_once(':') {
                Some((name, ty)) => ColumnDef::new(name.trim(), ty.parse()?),
                None => ColumnDef::new(format!("c{}", i), entry.parse()?),
            };
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(RecordError::EmptySchema);
        }
        Ok(Self::new(columns))
    }

    /// Get all columns
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of fields
    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    /// Find column index by name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get NULL bitmap size in bytes
    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Size of one serialized tuple (including NULL bitmap)
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Validate field values against this schema
    pub fn validate(&self, fields: &[Field]) -> RecordResult<()> {
        if fields.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} fields, got {}",
                self.columns.len(),
                fields.len()
            )));
        }

        for (field, col) in fields.iter().zip(&self.columns) {
            if !field.conforms_to(&col.data_type) {
                return Err(RecordError::TypeMismatch {
                    expected: col.data_type.to_string(),
                    actual: format!("{:?}", field),
                });
            }
        }

        Ok(())
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for TupleDesc {}
