//! Core types for functional-level reconciliation

use serde::Serialize;
use std::fmt;

/// A cluster functional level paired with its upgrade version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterLevel {
    pub level: i64,
    pub version: i64,
}

impl ClusterLevel {
    pub fn new(level: i64, version: i64) -> Self {
        Self { level, version }
    }
}

impl fmt::Display for ClusterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} / version {}", self.level, self.version)
    }
}

/// Operator credential for opening a remote session.
///
/// `secret` is `None` when the transport authenticates some other way
/// (e.g. an SSH key).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            username: username.into(),
            secret,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Options for a reconciliation run
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Read and compare only, never upgrade
    pub dry_run: bool,
}

/// Record of a single reconciliation run.
///
/// Created from the observed state, then moved forward at most once by
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    target_name: String,
    observed_level: i64,
    observed_version: i64,
    desired_level: i64,
    desired_version: i64,
    update_required: bool,
    update_attempted: bool,
    update_succeeded: bool,
    error_detail: Option<String>,
}

impl ReconciliationOutcome {
    /// Start an outcome from the state read at procedure start.
    pub fn observed(
        target_name: impl Into<String>,
        observed: ClusterLevel,
        desired: ClusterLevel,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            observed_level: observed.level,
            observed_version: observed.version,
            desired_level: desired.level,
            desired_version: desired.version,
            update_required: observed != desired,
            update_attempted: false,
            update_succeeded: false,
            error_detail: None,
        }
    }

    /// Mark the upgrade as attempted and successful.
    pub fn record_success(&mut self) {
        debug_assert!(self.update_required && !self.update_attempted);
        self.update_attempted = true;
        self.update_succeeded = true;
    }

    /// Mark the upgrade as attempted and failed with `detail`.
    pub fn record_failure(&mut self, detail: impl Into<String>) {
        debug_assert!(self.update_required && !self.update_attempted);
        self.update_attempted = true;
        self.update_succeeded = false;
        self.error_detail = Some(detail.into());
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn observed_state(&self) -> ClusterLevel {
        ClusterLevel::new(self.observed_level, self.observed_version)
    }

    pub fn desired_state(&self) -> ClusterLevel {
        ClusterLevel::new(self.desired_level, self.desired_version)
    }

    pub fn update_required(&self) -> bool {
        self.update_required
    }

    pub fn update_attempted(&self) -> bool {
        self.update_attempted
    }

    pub fn update_succeeded(&self) -> bool {
        self.update_succeeded
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Whether the run left the cluster at the desired state (as far as we know).
    pub fn is_converged(&self) -> bool {
        !self.update_required || self.update_succeeded
    }
}
