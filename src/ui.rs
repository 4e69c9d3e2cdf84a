use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::Verdict;
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a one-line summary for a verdict
pub fn verdict(verdict: Verdict, target: &str) {
    match verdict {
        Verdict::NotRequired => success(&format!("{target} is already at the required level")),
        Verdict::Success => success(&format!("{target} upgraded")),
        Verdict::Failed => error(&format!("{target} upgrade failed")),
        Verdict::Pending => warn(&format!("{target} needs an upgrade (run `clusterlevel apply`)")),
    }
}

/// Start a spinner with a message
pub fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
