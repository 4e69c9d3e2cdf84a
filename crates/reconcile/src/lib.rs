//! # Reconcile
//!
//! Check-then-act reconciliation of a cluster's functional level.
//!
//! This crate owns the part of the workflow that does not depend on a
//! particular transport: reading the observed state through a session,
//! comparing it with the desired state, forcing an upgrade on mismatch and
//! turning the result into a report and an exit code.
//!
//! ## Core Concepts
//!
//! - **ClusterLevel**: a `(level, version)` pair, observed or desired
//! - **ReconciliationOutcome**: the record of one run
//! - **SessionGuard**: owns an open session and closes it on every exit path
//! - **Report**: human-readable block plus process exit code
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{ClusterLevel, NoObserver, ReconcileOptions, run, report};
//!
//! let desired = ClusterLevel::new(12, 32774);
//! let outcome = run(
//!     &mut credentials,
//!     &opener,
//!     "cluster01.example.com",
//!     desired,
//!     ReconcileOptions::default(),
//!     &mut NoObserver,
//! )?;
//!
//! let report = report::render(&outcome);
//! println!("{}", report.text);
//! std::process::exit(report.exit_code);
//! ```
//!
//! ## Provider Traits
//!
//! - [`CredentialSource`]: supplies operator credentials
//! - [`SessionOpener`]: opens a [`RemoteSession`] to a named host
//! - [`RemoteSession`]: queries and upgrades the cluster, then closes
//! - [`ReconcileObserver`]: receives status updates
//!
//! Implementations live in the binary; tests use in-memory doubles.

pub mod context;
pub mod error;
pub mod procedure;
pub mod report;
pub mod session;
pub mod types;

pub use context::{CredentialSource, NoObserver, ReconcileObserver, RemoteSession, SessionOpener};
pub use error::{Error, RemoteError, Result};
pub use procedure::{reconcile, run};
pub use report::{ABORT_EXIT_CODE, Report, Verdict};
pub use session::SessionGuard;
pub use types::{ClusterLevel, Credential, ReconcileOptions, ReconciliationOutcome};
