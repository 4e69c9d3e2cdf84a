//! Collaborator and observer traits
//!
//! These traits let the reconciliation procedure run without depending on
//! a specific transport, prompt or UI.

use crate::error::{RemoteError, Result};
use crate::types::{ClusterLevel, Credential, ReconciliationOutcome};

/// Source of operator credentials
pub trait CredentialSource {
    /// Obtain a credential, or fail with [`Error::NoCredential`](crate::Error::NoCredential)
    /// when the operator supplies none.
    fn acquire(&mut self) -> Result<Credential>;
}

/// Opens remote sessions to a named host
pub trait SessionOpener {
    type Session: RemoteSession;

    /// Open an authenticated session to `target`.
    ///
    /// Fails with [`Error::Auth`](crate::Error::Auth) or
    /// [`Error::Connect`](crate::Error::Connect).
    fn open(&self, target: &str, credential: &Credential) -> Result<Self::Session>;
}

/// An open remote execution channel bound to one cluster
pub trait RemoteSession {
    /// Name of the cluster this session talks to
    fn target(&self) -> &str;

    /// Read the cluster's current functional level and upgrade version
    fn query_state(&mut self) -> std::result::Result<ClusterLevel, RemoteError>;

    /// Upgrade the functional level, suppressing any confirmation prompt.
    ///
    /// Not assumed to be idempotent; callers invoke it at most once.
    fn force_upgrade(&mut self) -> std::result::Result<(), RemoteError>;

    /// Release the session.
    ///
    /// Must be idempotent and must not fail; implementations log and
    /// swallow their own errors.
    fn close(&mut self);
}

/// Receives status updates while a run progresses
pub trait ReconcileObserver {
    /// Called before the cluster state is read
    fn on_query_start(&mut self, target: &str);

    /// Called once the observed state is known
    fn on_state_observed(&mut self, target: &str, observed: ClusterLevel, desired: ClusterLevel);

    /// Called when no upgrade is needed
    fn on_up_to_date(&mut self, target: &str);

    /// Called right before the upgrade call
    fn on_upgrade_start(&mut self, target: &str);

    /// Called after the upgrade call returns, whatever the result
    fn on_upgrade_complete(&mut self, outcome: &ReconciliationOutcome);
}

/// No-op observer
pub struct NoObserver;

impl ReconcileObserver for NoObserver {
    fn on_query_start(&mut self, _target: &str) {}
    fn on_state_observed(&mut self, _target: &str, _observed: ClusterLevel, _desired: ClusterLevel) {
    }
    fn on_up_to_date(&mut self, _target: &str) {}
    fn on_upgrade_start(&mut self, _target: &str) {}
    fn on_upgrade_complete(&mut self, _outcome: &ReconciliationOutcome) {}
}
