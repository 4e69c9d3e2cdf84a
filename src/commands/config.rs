use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::paths;
use crate::ui;
use anyhow::{Result, bail};
use std::process::ExitCode;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => {
            println!("{}", paths::config_file()?.display());
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Init { force } => init(ctx, force),
    }
}

fn show(ctx: &Context) -> Result<ExitCode> {
    let path = paths::config_file()?;
    let config = Config::load_from(&path)?;

    if !ctx.quiet {
        if path.exists() {
            ui::info(&format!("Loaded {}", path.display()));
        } else {
            ui::info(&format!("{} not found, showing defaults", path.display()));
        }
        println!();
    }
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

fn init(ctx: &Context, force: bool) -> Result<ExitCode> {
    let path = paths::config_file()?;
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to(&path)?;
    if !ctx.quiet {
        ui::success(&format!("Wrote {}", path.display()));
    }
    Ok(ExitCode::SUCCESS)
}
