//! Launcher binary for the OMX mail client.

use anyhow::Context;
use clap::{Parser, Subcommand};
use omx_launcher::config::expand_file_placeholder;
use omx_launcher::logging::ConsoleWriter;
use omx_launcher::progress::Spinner;
use omx_launcher::update::manifest;
use omx_launcher::{LauncherConfig, UpdateOptions, UpdateOutcome, Updater};
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use tracing::info;

/// OMX launcher: self-updates the mail client, then starts it.
#[derive(Parser)]
#[command(name = "omx-launcher", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Apply staged files even if unchanged or the download failed.
    #[arg(long, global = true)]
    force: bool,

    /// Skip the update cycle entirely.
    #[arg(long, global = true)]
    no_update: bool,

    /// Suppress the spinner and status messages.
    #[arg(short, long, global = true)]
    silent: bool,

    /// Echo update log lines to the console.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Update, then start the mail client (default).
    Run,

    /// Run the update cycle only.
    Update,

    /// Print the packages listed in the local dependency manifest.
    Packages,
}

impl Cli {
    fn options(&self) -> UpdateOptions {
        UpdateOptions {
            force: self.force,
            skip_update: self.no_update,
            silent: self.silent,
            verbose: self.verbose,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.options();
    let console = omx_launcher::logging::init(&options);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(LauncherConfig::default_config_path);
    let config = LauncherConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    std::fs::create_dir_all(config.base_dir())
        .with_context(|| format!("creating {}", config.base_dir().display()))?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            update(&config, options, &console);
            launch(&config)
        }
        Command::Update => {
            update(&config, options, &console);
            Ok(())
        }
        Command::Packages => list_packages(&config),
    }
}

fn update(config: &LauncherConfig, options: UpdateOptions, console: &ConsoleWriter) {
    if options.skip_update {
        info!("update skipped (--no-update)");
        return;
    }

    let spinner = Spinner::start("Updating OMX Client", options.silent);
    console.attach(spinner.progress_bar());
    let outcome = Updater::new(config.clone(), options)
        .with_progress(spinner.callback())
        .run();
    console.detach();
    spinner.finish();

    match outcome {
        UpdateOutcome::RollbackFailed => eprintln!(
            "Update failed and could not be rolled back; see {}",
            config.log_path().display()
        ),
        UpdateOutcome::RolledBack if !options.silent => {
            eprintln!("Update rejected; previous version restored.");
        }
        UpdateOutcome::SkippedNoNetwork if !options.silent => {
            eprintln!("No internet connection; update skipped.");
        }
        UpdateOutcome::Updated if !options.silent => println!("OMX Client updated."),
        _ => {}
    }
}

fn launch(config: &LauncherConfig) -> anyhow::Result<()> {
    let main = config
        .main_file()
        .context("no main file configured")?;
    let main_path = config.base_dir().join(&main.file_name);
    if !main_path.is_file() {
        anyhow::bail!(
            "{} is not installed; run with network access first",
            main_path.display()
        );
    }

    info!(program = %config.launch.program, file = %main_path.display(), "launching");
    let status = ProcessCommand::new(&config.launch.program)
        .args(expand_file_placeholder(&config.launch.args, &main_path))
        .current_dir(config.base_dir())
        .status()
        .with_context(|| format!("starting {}", config.launch.program))?;

    std::process::exit(status.code().unwrap_or(1));
}

fn list_packages(config: &LauncherConfig) -> anyhow::Result<()> {
    let packages = manifest::read_requirements(&config.manifest_path())?;
    if packages.is_empty() {
        println!("No packages listed in {}", config.manifest_path().display());
    }
    for package in packages {
        println!("{package}");
    }
    Ok(())
}
