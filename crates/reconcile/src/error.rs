//! Error types for reconciliation runs.
//!
//! Only fatal conditions are errors. A failed upgrade is recorded in the
//! [`ReconciliationOutcome`](crate::ReconciliationOutcome) instead.

use thiserror::Error;

/// Failure reported by a remote collaborator (query, upgrade, exec).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote command ran and reported a failure
    #[error("{0}")]
    Failed(String),

    /// The remote command produced output we could not understand
    #[error("unexpected output: {0}")]
    Parse(String),

    /// Local process or pipe failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors that abort a run before an outcome exists.
#[derive(Debug, Error)]
pub enum Error {
    /// The operator supplied no credential
    #[error("no credential supplied")]
    NoCredential,

    /// The credential prompt itself failed
    #[error("credential prompt failed: {0}")]
    Prompt(String),

    /// The remote host rejected the credential
    #[error("authentication to {host} failed: {message}")]
    Auth { host: String, message: String },

    /// The remote host could not be reached
    #[error("could not connect to {host}: {message}")]
    Connect { host: String, message: String },

    /// The cluster state could not be read
    #[error("error accessing resource '{target}': {message}")]
    ResourceQuery { target: String, message: String },
}

impl Error {
    /// Returns true if the run stopped before any remote contact.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::NoCredential | Self::Prompt(_))
    }

    /// Returns true if the session could not be established.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Connect { .. })
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
