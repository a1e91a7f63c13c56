use std::fmt;

use serde::{Deserialize, Serialize};

use super::datatype::DataType;

/// A single named column in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Name of the table (or alias) producing this column. Empty for computed
    /// columns.
    pub source: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        datatype: DataType,
        nullable: bool,
    ) -> Self {
        Field {
            name: name.into(),
            source: source.into(),
            datatype,
            nullable,
        }
    }

    /// Case-insensitive check against an optional table qualifier and a column
    /// name.
    pub fn matches(&self, source: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match source {
            Some(source) => self.source.eq_ignore_ascii_case(source),
            None => true,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.source, self.name)
        }
    }
}

/// Ordered list of fields describing the rows a node produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        Schema {
            fields: fields.into_iter().collect(),
        }
    }

    pub const fn empty() -> Self {
        Schema { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Appends the fields of `other` after the fields of this schema.
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Schema { fields }
    }

    /// Merges any number of schemas, left to right.
    pub fn merge<'a>(schemas: impl IntoIterator<Item = &'a Schema>) -> Schema {
        Schema {
            fields: schemas
                .into_iter()
                .flat_map(|s| s.fields.iter().cloned())
                .collect(),
        }
    }

    /// Find the position of the first field matching the qualifier and name.
    pub fn position(&self, source: Option<&str>, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.matches(source, name))
    }

    /// Returns a copy of this schema with every field attributed to `source`.
    pub fn with_source(&self, source: &str) -> Schema {
        Schema {
            fields: self
                .fields
                .iter()
                .map(|f| Field {
                    source: source.to_string(),
                    ..f.clone()
                })
                .collect(),
        }
    }

    /// Returns a copy of this schema with every field marked nullable.
    pub fn into_nullable(self) -> Schema {
        Schema {
            fields: self
                .fields
                .into_iter()
                .map(|f| Field {
                    nullable: true,
                    ..f
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_case_insensitive() {
        let schema = Schema::new([
            Field::new("a", "t1", DataType::Int64, false),
            Field::new("b", "t1", DataType::Utf8, true),
            Field::new("a", "t2", DataType::Int64, false),
        ]);

        assert_eq!(Some(1), schema.position(Some("T1"), "B"));
        assert_eq!(Some(2), schema.position(Some("t2"), "a"));
        assert_eq!(Some(0), schema.position(None, "a"));
        assert_eq!(None, schema.position(Some("t3"), "a"));
    }

    #[test]
    fn with_source_renames() {
        let schema = Schema::new([Field::new("a", "t1", DataType::Int64, false)]);
        let aliased = schema.with_source("new");
        assert_eq!("new", aliased.fields[0].source);
        assert_eq!("new.a", aliased.fields[0].to_string());
    }
}
