use crate::Context;
use crate::cli::TargetArgs;
use crate::config::Config;
use crate::credentials::PromptCredentials;
use crate::ssh::SshOpener;
use crate::ui;
use anyhow::Result;
use indicatif::ProgressBar;
use reconcile::{
    ClusterLevel, ReconcileObserver, ReconcileOptions, ReconciliationOutcome, Verdict, report,
};
use serde::Serialize;
use std::process::ExitCode;

/// Check the cluster and force an upgrade when it is out of date
pub fn apply(ctx: &Context, args: TargetArgs) -> Result<ExitCode> {
    execute(ctx, &args, ReconcileOptions { dry_run: false })
}

/// Check the cluster without changing it
pub fn status(ctx: &Context, args: TargetArgs) -> Result<ExitCode> {
    execute(ctx, &args, ReconcileOptions { dry_run: true })
}

fn execute(ctx: &Context, args: &TargetArgs, options: ReconcileOptions) -> Result<ExitCode> {
    let config = Config::load()?.with_overrides(args);
    let desired = config.desired();
    let target = config.target.name.as_str();
    let quiet = ctx.quiet || args.json;

    let opener = SshOpener::new(config.ssh_settings());
    let mut credentials = PromptCredentials::new(config.ssh.user.clone(), opener.uses_key_auth());

    if !quiet {
        ui::header(&format!("Cluster functional level: {target}"));
        if options.dry_run {
            ui::dim("Dry run, no changes will be made");
        }
    }

    let mut observer = TerminalObserver::new(quiet);
    let outcome = reconcile::run(
        &mut credentials,
        &opener,
        target,
        desired,
        options,
        &mut observer,
    )?;
    drop(observer);

    let report = report::render(&outcome);
    if args.json {
        let json = JsonReport {
            outcome: &outcome,
            verdict: report.verdict,
            exit_code: report.exit_code,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!();
        print!("{}", report.text);
        if !ctx.quiet {
            println!();
            ui::verdict(report.verdict, target);
        }
    }

    Ok(ExitCode::from(u8::try_from(report.exit_code).unwrap_or(1)))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    outcome: &'a ReconciliationOutcome,
    verdict: Verdict,
    exit_code: i32,
}

/// Spinner and log lines while the run progresses
struct TerminalObserver {
    quiet: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalObserver {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            spinner: None,
        }
    }

    fn start(&mut self, msg: String) {
        self.stop();
        if !self.quiet {
            self.spinner = Some(ui::spinner(msg));
        }
    }

    fn stop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a status line unless quiet; returns whether it was shown
    fn notice(&self, msg: &str) -> bool {
        if self.quiet {
            return false;
        }
        ui::info(msg);
        true
    }
}

impl ReconcileObserver for TerminalObserver {
    fn on_query_start(&mut self, target: &str) {
        log::info!("Querying functional level of {target}");
        self.start(format!("Reading cluster state of {target}..."));
    }

    fn on_state_observed(&mut self, target: &str, observed: ClusterLevel, desired: ClusterLevel) {
        self.stop();
        log::info!("{target}: observed {observed}, required {desired}");
    }

    fn on_up_to_date(&mut self, target: &str) {
        self.stop();
        let msg = format!("{target} already at the required functional level, nothing to do");
        if !self.notice(&msg) {
            log::info!("{msg}");
        }
    }

    fn on_upgrade_start(&mut self, target: &str) {
        log::info!("Forcing functional level upgrade on {target}");
        self.start(format!("Upgrading functional level of {target}..."));
    }

    fn on_upgrade_complete(&mut self, outcome: &ReconciliationOutcome) {
        self.stop();
        match outcome.error_detail() {
            Some(detail) => log::error!("Upgrade of {} failed: {detail}", outcome.target_name()),
            None => log::info!("Upgrade of {} completed", outcome.target_name()),
        }
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_report_flattens_outcome() {
        let mut outcome = ReconciliationOutcome::observed(
            "cl01",
            ClusterLevel::new(10, 30000),
            ClusterLevel::new(12, 32774),
        );
        outcome.record_failure("access denied");
        let report = report::render(&outcome);

        let value = serde_json::to_value(JsonReport {
            outcome: &outcome,
            verdict: report.verdict,
            exit_code: report.exit_code,
        })
        .unwrap();

        assert_eq!(value["target_name"], "cl01");
        assert_eq!(value["observed_level"], 10);
        assert_eq!(value["update_attempted"], true);
        assert_eq!(value["error_detail"], "access denied");
        assert_eq!(value["verdict"], "Failed");
        assert_eq!(value["exit_code"], 1);
    }

    #[test]
    fn test_quiet_observer_never_spins() {
        let mut observer = TerminalObserver::new(true);
        observer.on_query_start("cl01");
        assert!(observer.spinner.is_none());
    }

    #[test]
    fn test_up_to_date_is_shown_unless_quiet() {
        assert!(TerminalObserver::new(false).notice("cl01 already at the required functional level"));
        assert!(!TerminalObserver::new(true).notice("cl01 already at the required functional level"));

        let mut quiet = TerminalObserver::new(true);
        quiet.on_up_to_date("cl01");
        assert!(quiet.spinner.is_none());
    }
}
