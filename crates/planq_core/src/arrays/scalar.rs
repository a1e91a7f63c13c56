use std::cmp::Ordering;
use std::fmt;

use planq_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use super::datatype::DataType;

/// A single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl ScalarValue {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(DbError::new("Not a bool").with_field("value", other)),
        }
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        match self {
            Self::Int32(v) => Ok(*v as i64),
            Self::Int64(v) => Ok(*v),
            other => Err(DbError::new("Not an integer").with_field("value", other)),
        }
    }

    pub fn try_as_f64(&self) -> Result<f64> {
        match self {
            Self::Int32(v) => Ok(*v as f64),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            other => Err(DbError::new("Not a number").with_field("value", other)),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(s) => Ok(s.as_str()),
            other => Err(DbError::new("Not a string").with_field("value", other)),
        }
    }

    pub fn try_into_string(self) -> Result<String> {
        match self {
            Self::Utf8(s) => Ok(s),
            other => Err(DbError::new("Not a string").with_field("value", other)),
        }
    }

    /// SQL comparison of two values.
    ///
    /// Returns `None` if either side is NULL. Numeric values compare across
    /// widths.
    pub fn sql_cmp(&self, other: &ScalarValue) -> Result<Option<Ordering>> {
        let ord = match (self, other) {
            (Self::Null, _) | (_, Self::Null) => return Ok(None),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            (Self::Float64(_), _) | (_, Self::Float64(_)) => {
                let a = self.try_as_f64()?;
                let b = other.try_as_f64()?;
                match a.partial_cmp(&b) {
                    Some(ord) => ord,
                    None => return Ok(None),
                }
            }
            (Self::Int32(_) | Self::Int64(_), Self::Int32(_) | Self::Int64(_)) => {
                self.try_as_i64()?.cmp(&other.try_as_i64()?)
            }
            (a, b) => {
                return Err(DbError::new("Cannot compare values")
                    .with_field("left", a.datatype())
                    .with_field("right", b.datatype()));
            }
        };

        Ok(Some(ord))
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl<T> From<Option<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ScalarValue::Null,
        }
    }
}
