//! Watch-keeper Error Hierarchy
//!
//! Every fallible operation of the crate returns [`Error`]. Collaborator
//! failures are wrapped in [`Error::OperationFailed`] together with the
//! operation name and the path it was issued against.

use config::ConfigError;

use crate::SessionState;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error accepted as the source of a wrapped collaborator failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted while the underlying session is not alive
    #[error("Not connected to the coordination service: {0}")]
    NotConnected(String),

    /// Operation on a non-existent path where existence is a precondition
    #[error("Node path {0} not found")]
    PathNotFound(String),

    /// Node creation on a path that is already taken
    #[error("Node path {0} already exists")]
    NodeExists(String),

    /// Any collaborator-level failure (connection loss, timeout, ...)
    #[error("{operation} failed on {path}: {source}")]
    OperationFailed {
        operation: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },

    /// Empty or malformed arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Session state outside the set that accepts listeners
    #[error("Session state {0:?} cannot be listened on, expected Disconnected or Expired")]
    UnsupportedState(SessionState),

    /// Relisten finished but some subscriptions or stubborn nodes could not be restored
    #[error("Recovery incomplete, {} path(s) failed: {failed:?}", failed.len())]
    RecoveryIncomplete { failed: Vec<String> },

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Wrap a collaborator failure.
    ///
    /// `NotConnected` and `PathNotFound` pass through untouched, callers
    /// branch on them.
    pub(crate) fn operation(
        operation: &'static str,
        path: &str,
        source: Error,
    ) -> Self {
        match source {
            Error::NotConnected(_) | Error::PathNotFound(_) => source,
            other => Error::OperationFailed {
                operation,
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PathNotFound(_))
    }

    pub fn is_node_exists(&self) -> bool {
        match self {
            Error::NodeExists(_) => true,
            Error::OperationFailed { source, .. } => source
                .downcast_ref::<Error>()
                .map(Error::is_node_exists)
                .unwrap_or(false),
            _ => false,
        }
    }
}
