use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clusterlevel")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Check a remote cluster's functional level and upgrade it when out of date",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the cluster and force a functional level upgrade if needed
    Apply(TargetArgs),

    /// Check the cluster without changing anything
    Status(TargetArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Target
// ============================================================================

/// Target and connection overrides. Unset values fall back to the config file.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Cluster to reconcile (host name the session connects to)
    #[arg(short, long, env = "CLUSTERLEVEL_TARGET")]
    pub target: Option<String>,

    /// Required cluster functional level
    #[arg(long, env = "CLUSTERLEVEL_LEVEL")]
    pub level: Option<i64>,

    /// Required cluster upgrade version
    #[arg(long = "upgrade-version", env = "CLUSTERLEVEL_UPGRADE_VERSION")]
    pub upgrade_version: Option<i64>,

    /// Remote user name (prompted for when omitted)
    #[arg(short, long, env = "CLUSTERLEVEL_USER")]
    pub user: Option<String>,

    /// SSH private key; skips the password prompt
    #[arg(short, long, env = "CLUSTERLEVEL_IDENTITY_FILE")]
    pub identity_file: Option<PathBuf>,

    /// SSH port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with the built-in defaults
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
