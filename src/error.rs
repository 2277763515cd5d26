use std::fmt::Display;

use crate::schema::EntityKind;

#[derive(Debug)]
pub enum Error {
    NotFound { kind: EntityKind, id: String },
    DuplicateIdentity(String),
    UnknownEntity(String),
    UnsupportedEntityKind(String),
    UnsupportedValueType { column: String, found: &'static str },
    UnknownColumn { table: &'static str, column: String },
    InvalidReference { column: String, id: String },
    Validation(String),
    InvalidCredentials,
    Execution(String),
    Decode(String),
    Config(String),
    Context {
        operation: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error, with every operation context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound { .. })
    }

    /// Status hint for the HTTP layer.
    pub fn status_code(&self) -> u16 {
        match self.root() {
            Error::NotFound { .. } => 404,
            Error::DuplicateIdentity(_)
            | Error::UnknownEntity(_)
            | Error::UnsupportedValueType { .. }
            | Error::UnknownColumn { .. }
            | Error::InvalidReference { .. }
            | Error::Validation(_) => 400,
            Error::InvalidCredentials => 401,
            Error::UnsupportedEntityKind(_)
            | Error::Execution(_)
            | Error::Decode(_)
            | Error::Config(_)
            | Error::Context { .. } => 500,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound { kind, id } => write!(f, "{} with id {} not found", kind, id),
            Error::DuplicateIdentity(msg) => write!(f, "Duplicate identity: {}", msg),
            Error::UnknownEntity(name) => write!(f, "Unknown entity: {}", name),
            Error::UnsupportedEntityKind(name) => {
                write!(f, "Unsupported entity kind: {} has no column mapping", name)
            }
            Error::UnsupportedValueType { column, found } => {
                write!(f, "Unsupported value type {} for column {}", found, column)
            }
            Error::UnknownColumn { table, column } => {
                write!(f, "Unknown column {} on table {}", column, table)
            }
            Error::InvalidReference { column, id } => {
                write!(f, "Invalid reference {} in {}", id, column)
            }
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::InvalidCredentials => write!(f, "Invalid credentials"),
            Error::Execution(err) => write!(f, "Execution error: {}", err),
            Error::Decode(err) => write!(f, "Decode error: {}", err),
            Error::Config(var) => write!(f, "Missing or invalid configuration: {}", var),
            Error::Context { operation, source } => write!(f, "{}: {}", operation, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(any(feature = "postgres", feature = "sqlite"))]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Execution(err.to_string())
    }
}

pub trait ResultExt<T> {
    /// Tags the error with the name of the failing operation.
    fn context(self, operation: impl Into<String>) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context(self, operation: impl Into<String>) -> Result<T, Error> {
        self.map_err(|source| Error::Context {
            operation: operation.into(),
            source: Box::new(source),
        })
    }
}
