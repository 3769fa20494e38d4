use std::fmt;
use std::str::FromStr;

use super::error::{RecordError, RecordResult};

/// Represents a column data type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Char(usize), // n bytes (fixed length)
}

impl DataType {
    /// Get the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 8,
            DataType::Char(n) => *n,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}

impl FromStr for DataType {
    type Err = RecordError;

    /// Parses `int`, `float` or `char(N)`, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "int" => Ok(DataType::Int),
            "float" => Ok(DataType::Float),
            _ => lower
                .strip_prefix("char(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|n| n.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
                .map(DataType::Char)
                .ok_or_else(|| RecordError::SchemaMismatch(format!("Unknown type: {}", s))),
        }
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i32),
    Float(f64),
    String(String),
    Null,
}

impl Field {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Whether this value can be stored in a column of `data_type`
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Field::Null, _)
                | (Field::Int(_), DataType::Int)
                | (Field::Float(_), DataType::Float)
                | (Field::String(_), DataType::Char(_))
        )
    }

    /// Parse a textual value (CSV cell, command line) for the given type.
    /// An empty string or `NULL` yields `Field::Null`.
    pub fn parse(text: &str, data_type: &DataType) -> RecordResult<Self> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("null") {
            return Ok(Field::Null);
        }

        let bad = || RecordError::TypeMismatch {
            expected: data_type.to_string(),
            actual: text.to_string(),
        };
        match data_type {
            DataType::Int => text.parse().map(Field::Int).map_err(|_| bad()),
            DataType::Float => text.parse().map(Field::Float).map_err(|_| bad()),
            DataType::Char(_) => Ok(Field::String(text.to_string())),
        }
    }

    /// Serialize value to bytes.
    /// Strings are zero padded to the column width.
    pub fn serialize(&self, data_type: &DataType) -> RecordResult<Vec<u8>> {
        match (self, data_type) {
            (Field::Int(i), DataType::Int) => Ok(i.to_le_bytes().to_vec()),
            (Field::Float(f), DataType::Float) => Ok(f.to_le_bytes().to_vec()),
            (Field::String(s), DataType::Char(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                let mut result = vec![0u8; *max_len];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
            // NULL values are represented by zeros
            (Field::Null, _) => Ok(vec![0u8; data_type.size()]),
            _ => Err(RecordError::TypeMismatch {
                expected: data_type.to_string(),
                actual: format!("{:?}", self),
            }),
        }
    }

    /// Deserialize value from bytes
    pub fn deserialize(bytes: &[u8], data_type: &DataType, is_null: bool) -> RecordResult<Self> {
        if is_null {
            return Ok(Field::Null);
        }

        if bytes.len() != data_type.size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for {}, got {}",
                data_type.size(),
                data_type,
                bytes.len()
            )));
        }

        match data_type {
            DataType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Field::Int(i32::from_le_bytes(buf)))
            }
            DataType::Float => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(Field::Float(f64::from_le_bytes(buf)))
            }
            DataType::Char(_) => {
                // Find the first null byte (string terminator)
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(Field::String(s))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(i) => write!(f, "{}", i),
            Field::Float(x) => write!(f, "{}", x),
            Field::String(s) => write!(f, "{}", s),
            Field::Null => write!(f, "NULL"),
        }
    }
}
