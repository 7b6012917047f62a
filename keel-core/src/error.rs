use std::time::Duration;
use thiserror::Error as ThisError;

///
/// DbError
///
/// Failures raised by keel itself. They travel inside [`crate::Error`], use
/// `error.downcast_ref::<DbError>()` to inspect the kind.
///
#[derive(Debug, ThisError)]
pub enum DbError {
    /// A property or entity could not be resolved against its mapping.
    #[error("mapping error on `{entity}`: property `{property}` {message}")]
    Mapping {
        entity: &'static str,
        property: String,
        message: String,
    },

    /// Malformed predicate, sort or argument detected before any round trip.
    #[error("validation error on `{property}`: {message}")]
    Validation { property: String, message: String },

    /// Illegal transaction transition (begin while open, commit while none).
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// The provider did not complete the command in time.
    #[error("command timed out{}", .timeout.map(|v| format!(" after {v:?}")).unwrap_or_default())]
    Timeout { timeout: Option<Duration> },

    /// Driver failure (constraint violation, connection lost, syntax error).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// A row value does not fit the field it is decoded into.
    #[error("cannot decode `{entity}.{property}`: {message}")]
    Decode {
        entity: &'static str,
        property: String,
        message: String,
    },

    /// Misuse of a multiple result reader.
    #[error("multiple result error: {0}")]
    MultipleResult(String),
}

impl DbError {
    pub fn mapping(
        entity: &'static str,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mapping {
            entity,
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn validation(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState(message.into())
    }

    pub fn provider<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provider {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn provider_msg(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Returns the [`DbError`] carried by a keel error, if any.
pub fn db_error(error: &crate::Error) -> Option<&DbError> {
    error.downcast_ref::<DbError>()
}
