use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Typed classification of an error.
///
/// Validation failures raised during analysis each get their own variant so
/// callers can match on them without inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("internal error")]
    Internal,
    #[error("invalid number of children for {name}, got {got}, expected {expected}")]
    InvalidChildrenNumber {
        name: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("there is no {pseudo_table} row on {event} trigger")]
    InvalidUseOfOldNew { pseudo_table: String, event: String },
    #[error("updating the old row is not allowed in a trigger")]
    InvalidUpdateOfOldRow,
    #[error("updating the new row is not allowed in an after trigger")]
    InvalidUpdateInAfterTrigger,
    #[error("can't update table {table} in trigger because it is already used by the statement that invoked this trigger")]
    TriggerTableInUse { table: String },
    #[error("trigger {trigger} references trigger {reference} which does not exist")]
    TriggerOrderReferenceNotFound { trigger: String, reference: String },
    #[error("trigger ordering for {trigger} forms a cycle")]
    TriggerOrderCycle { trigger: String },
    #[error("invalid trigger create statement: {statement}")]
    TriggerCreateStatementInvalid { statement: String },
    #[error("database not found")]
    DatabaseNotFound,
    #[error("table not found")]
    TableNotFound,
    #[error("column not found")]
    ColumnNotFound,
    #[error("not implemented")]
    NotImplemented,
    #[error("execution cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
    fields: Vec<(Cow<'static, str>, String)>,
}

impl DbError {
    /// Create a new internal error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                kind,
                msg: msg.into(),
                source: None,
                backtrace: Backtrace::capture(),
                fields: Vec::new(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a key/value pair to the error for additional context.
    pub fn with_field(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    pub fn message(&self) -> &str {
        &self.inner.msg
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .fields
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Get the value for a field by key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl From<ErrorKind> for DbError {
    fn from(kind: ErrorKind) -> Self {
        let msg = kind.to_string();
        DbError::with_kind(kind, msg)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;

        if !self.inner.fields.is_empty() {
            write!(f, " (")?;
            for (idx, (key, value)) in self.inner.fields.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, ")")?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace: {}", self.inner.backtrace)?;
        }

        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for wrapping foreign errors with a message.
pub trait ResultExt<T, E> {
    fn context(self, msg: &'static str) -> Result<T>;

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: Fn() -> String;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: Fn() -> String,
    {
        self.map_err(|e| DbError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Error if the option is None, using `msg` to describe what was missing.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        self.ok_or_else(|| DbError::new(format!("Missing required value: {msg}")))
    }
}

/// Return early with a not implemented error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        return Err($crate::DbError::with_kind(
            $crate::ErrorKind::NotImplemented,
            format!("Not yet implemented: {}", format!($($arg)*)),
        ))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_fields() {
        let err = DbError::new("Failed to do the thing")
            .with_field("left", 1)
            .with_field("right", "b");

        let s = err.to_string();
        assert!(s.starts_with("Failed to do the thing (left: 1, right: b)"));
        assert_eq!(Some("b"), err.field("right"));
    }

    #[test]
    fn kind_from_typed_error() {
        let err = DbError::from(ErrorKind::InvalidUseOfOldNew {
            pseudo_table: "new".to_string(),
            event: "delete".to_string(),
        });

        assert_eq!("there is no new row on delete trigger", err.message());
        assert!(matches!(err.kind(), ErrorKind::InvalidUseOfOldNew { .. }));
    }

    #[test]
    fn context_keeps_source() {
        let res: std::result::Result<i32, std::num::ParseIntError> = "cat".parse::<i32>();
        let err = res.context("Failed to parse").unwrap_err();

        assert_eq!("Failed to parse", err.message());
        assert!(err.source().is_some());
    }

    #[test]
    fn not_implemented_macro() {
        fn check() -> Result<()> {
            not_implemented!("thing {}", 4)
        }

        let err = check().unwrap_err();
        assert_eq!(&ErrorKind::NotImplemented, err.kind());
        assert_eq!("Not yet implemented: thing 4", err.message());
    }
}
