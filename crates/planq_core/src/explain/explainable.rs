use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplainConfig {
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Values(vs) => {
                write!(f, "[")?;
                for (idx, v) in vs.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A single line of explain output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainEntry {
    pub name: String,
    pub items: BTreeMap<String, ExplainValue>,
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.items.is_empty() {
            return Ok(());
        }
        write!(f, " (")?;
        for (idx, (k, v)) in self.items.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k} = {v}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug)]
pub struct EntryBuilder {
    conf: ExplainConfig,
    entry: ExplainEntry,
}

impl EntryBuilder {
    pub fn new(name: impl Into<String>, conf: ExplainConfig) -> Self {
        EntryBuilder {
            conf,
            entry: ExplainEntry {
                name: name.into(),
                items: BTreeMap::new(),
            },
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.entry
            .items
            .insert(key.into(), ExplainValue::Value(value.to_string()));
        self
    }

    pub fn with_value_if_verbose(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        if self.conf.verbose {
            return self.with_value(key, value);
        }
        self
    }

    pub fn with_values<V: fmt::Display>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.entry
            .items
            .insert(key.into(), ExplainValue::Values(values));
        self
    }

    pub fn with_values_if_verbose<V: fmt::Display>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        if self.conf.verbose {
            return self.with_values(key, values);
        }
        self
    }

    pub fn build(self) -> ExplainEntry {
        self.entry
    }
}

pub trait Explainable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}
