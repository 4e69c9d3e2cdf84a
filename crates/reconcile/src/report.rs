//! Outcome rendering and exit-code mapping

use crate::types::ReconciliationOutcome;
use serde::Serialize;
use std::fmt::Write as _;

/// Exit code for runs that abort before producing an outcome.
pub const ABORT_EXIT_CODE: i32 = 1;

/// What happened to the cluster during the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Observed state already matched
    NotRequired,
    /// Upgrade was applied
    Success,
    /// Upgrade was attempted and failed
    Failed,
    /// Upgrade needed but skipped (dry run)
    Pending,
}

impl Verdict {
    pub fn of(outcome: &ReconciliationOutcome) -> Self {
        if !outcome.update_required() {
            Self::NotRequired
        } else if !outcome.update_attempted() {
            Self::Pending
        } else if outcome.update_succeeded() {
            Self::Success
        } else {
            Self::Failed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotRequired => "NOT REQUIRED",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING (dry run)",
        }
    }
}

/// Rendered outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub verdict: Verdict,
    pub text: String,
    pub exit_code: i32,
}

/// `0` iff nothing needed doing or the upgrade succeeded.
pub fn exit_code(outcome: &ReconciliationOutcome) -> i32 {
    i32::from(!outcome.is_converged())
}

/// Render the labeled report block for an outcome.
pub fn render(outcome: &ReconciliationOutcome) -> Report {
    let verdict = Verdict::of(outcome);
    let observed = outcome.observed_state();
    let desired = outcome.desired_state();

    let mut text = String::new();
    let rows = [
        ("Target", outcome.target_name().to_string()),
        ("Observed level", observed.level.to_string()),
        ("Observed version", observed.version.to_string()),
        ("Required level", desired.level.to_string()),
        ("Required version", desired.version.to_string()),
        ("Update", verdict.label().to_string()),
    ];
    for (key, value) in rows {
        let _ = writeln!(text, "{key:<17}: {value}");
    }
    if let Some(detail) = outcome.error_detail() {
        let _ = writeln!(text, "{:<17}: {detail}", "Error");
    }

    Report {
        verdict,
        text,
        exit_code: exit_code(outcome),
    }
}
