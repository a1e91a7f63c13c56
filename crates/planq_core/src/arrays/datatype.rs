use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
}

impl DataType {
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64 | Self::Float64)
    }

    /// Type produced by arithmetic between two numeric types.
    pub fn promote(left: DataType, right: DataType) -> DataType {
        match (left, right) {
            (DataType::Float64, _) | (_, DataType::Float64) => DataType::Float64,
            (DataType::Int64, _) | (_, DataType::Int64) => DataType::Int64,
            (DataType::Int32, DataType::Int32) => DataType::Int32,
            (DataType::Null, other) | (other, DataType::Null) => other,
            _ => DataType::Null,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Float64 => write!(f, "Float64"),
            Self::Utf8 => write!(f, "Utf8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_numeric() {
        assert_eq!(DataType::Int64, DataType::promote(DataType::Int32, DataType::Int64));
        assert_eq!(DataType::Float64, DataType::promote(DataType::Int64, DataType::Float64));
        assert_eq!(DataType::Int32, DataType::promote(DataType::Null, DataType::Int32));
    }
}
