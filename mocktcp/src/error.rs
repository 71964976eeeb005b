use std::sync::Arc;

use crate::Unexpected;

/// The single error type for all mocktcp operations.
///
/// Every fallible API returns `mocktcp::Result<T>` (alias for
/// `Result<T, mocktcp::Error>`). Socket faults observed while running a
/// script are *not* errors at this level: they are captured as
/// [`Event`](crate::Event)s and only surface here, interpreted, through
/// [`Error::Unexpected`] when [`MockServer::join`](crate::MockServer::join)
/// reports the first failed expectation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// An expectation did not match what actually happened on the connection.
    ///
    /// Displays as a single diagnostic sentence, e.g.
    /// `Timed out waiting for client to connect.`
    #[error("{0}")]
    Unexpected(Box<Unexpected>),

    #[error("Server on port {0} is stopped")]
    Stopped(u16),

    #[error("No mock server is listening on port {0}")]
    UnknownPort(u16),

    #[error("IO error: {0}")]
    IoError(#[source] Arc<std::io::Error>),

    #[error("Internal mocktcp error {0}")]
    Internal(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Internal(Arc::new(e))
    }

    /// Returns the failed expectation if this error reports one.
    pub fn unexpected(&self) -> Option<&Unexpected> {
        match self {
            Error::Unexpected(u) => Some(u),
            _ => None,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unexpected(a), Self::Unexpected(b)) => a == b,
            (Self::Stopped(a), Self::Stopped(b)) => a == b,
            (Self::UnknownPort(a), Self::UnknownPort(b)) => a == b,
            (Self::IoError(a), Self::IoError(b)) => Arc::ptr_eq(a, b),
            (Self::Internal(a), Self::Internal(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<Unexpected> for Error {
    fn from(u: Unexpected) -> Self {
        Error::Unexpected(Box::new(u))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(Arc::new(e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::internal(e)
    }
}
