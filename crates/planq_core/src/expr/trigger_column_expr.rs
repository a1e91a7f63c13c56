use std::fmt;

use crate::arrays::datatype::DataType;

/// Which pseudo-table a trigger column reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoTable {
    New,
    Old,
}

impl PseudoTable {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("new") {
            Some(PseudoTable::New)
        } else if name.eq_ignore_ascii_case("old") {
            Some(PseudoTable::Old)
        } else {
            None
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Old => "old",
        }
    }
}

impl fmt::Display for PseudoTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Placeholder for a NEW/OLD reference inside a trigger definition.
///
/// Reports itself as resolved with a boolean type so resolution of the
/// definition can finish. The real binding happens when the trigger body is
/// compiled against the statement that fires it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerColumnExpr {
    pub table: PseudoTable,
    pub column: String,
}

impl TriggerColumnExpr {
    pub const fn datatype(&self) -> DataType {
        DataType::Boolean
    }
}

impl fmt::Display for TriggerColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}
