pub mod datatype;
pub mod field;
pub mod scalar;

use scalar::ScalarValue;

/// A single row flowing through execution.
pub type Row = Vec<ScalarValue>;
