use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("no mapping definition for type {0}")]
    MappingNotFound(&'static str),

    #[error("invalid mapping for {type_name}: {reason}")]
    InvalidMapping {
        type_name: &'static str,
        reason: String,
    },

    #[error("invalid insert into {table}: no columns selected")]
    InvalidInsert { table: String },

    #[error("cannot convert property '{property}' for column '{column}': {reason}")]
    MappingConversion {
        property: String,
        column: String,
        reason: String,
    },

    #[error("prepare failed for `{cql}`: {source}")]
    Prepare {
        cql: String,
        #[source]
        source: DriverError,
    },

    #[error("execute failed for `{cql}`: {source}")]
    Execute {
        cql: String,
        #[source]
        source: DriverError,
    },

    #[error("unexpected result for `{cql}`: {reason}")]
    UnexpectedResult { cql: String, reason: String },

    #[error("blocking insert called from a current-thread runtime")]
    BlockingUnsupported,
}

impl MapperError {
    pub(crate) fn conversion(
        property: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MappingConversion {
            property: property.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Statement text the error was raised for, if any.
    pub fn cql(&self) -> Option<&str> {
        match self {
            Self::Prepare { cql, .. }
            | Self::Execute { cql, .. }
            | Self::UnexpectedResult { cql, .. } => Some(cql),
            _ => None,
        }
    }
}

/// Opaque session failure.
///
/// Cloneable so a single failed prepare can be reported to every caller
/// that was waiting on it.
#[derive(Clone)]
pub struct DriverError(Arc<anyhow::Error>);

impl DriverError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for DriverError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Debug for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
