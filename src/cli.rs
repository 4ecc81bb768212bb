//! The command line interface for the program.
use crate::config::RunConfig;
use crate::log;
use crate::output::{create_output_directory, get_output_dir};
use crate::run::{run, run_check, save_graphs};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the program.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for commands which write to an output directory
#[derive(Args)]
pub struct OutputOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a model.
    Run {
        /// Path to the run configuration file.
        config_path: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Check a model's commodity network without solving it.
    Validate {
        /// Path to the run configuration file.
        config_path: PathBuf,
    },
    /// Build and output commodity network graphs for a model.
    SaveGraphs {
        /// Path to the run configuration file.
        config_path: PathBuf,
        /// Other options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { config_path, opts } => handle_run_command(&config_path, &opts, None),
            Self::Validate { config_path } => handle_validate_command(&config_path, None),
            Self::SaveGraphs { config_path, opts } => {
                handle_save_graphs_command(&config_path, &opts, None)
            }
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        command.execute()?;
    } else {
        // No command provided. Show help.
        Cli::command().print_long_help()?;
    }

    Ok(())
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Pick and create the output directory for a command.
///
/// # Returns
///
/// The path to the directory and whether an existing directory was overwritten.
fn prepare_output_dir(
    opts: &OutputOpts,
    settings: &Settings,
    config: &RunConfig,
) -> Result<(PathBuf, bool)> {
    let output_path = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| get_output_dir(&settings.results_root, &config.scenario));
    let overwrite = create_output_directory(&output_path, settings.overwrite || opts.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    Ok((output_path, overwrite))
}

/// Handle the `run` command.
pub fn handle_run_command(
    config_path: &Path,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let config = RunConfig::from_path(config_path).context("Failed to load run configuration.")?;
    let (output_path, overwrite) = prepare_output_dir(opts, &settings, &config)?;

    // Initialise program logger
    log::init(&settings.log_level, Some(output_path.as_path()))
        .context("Failed to initialise logging.")?;

    info!("Starting esom v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Running scenario '{}' from {} in {} mode",
        config.scenario,
        config.input_database.display(),
        config.mode
    );
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    run(config_path, &config, &output_path)?;
    info!("Run complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(config_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let config = RunConfig::from_path(config_path).context("Failed to load run configuration.")?;
    run_check(&config).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}

/// Handle the `save-graphs` command.
pub fn handle_save_graphs_command(
    config_path: &Path,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let config = RunConfig::from_path(config_path).context("Failed to load run configuration.")?;
    let (output_path, overwrite) = prepare_output_dir(opts, &settings, &config)?;

    // Initialise program logger (we won't save log files when running this command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Graphs directory will be overwritten");
    }

    let manager = run_check(&config).context("Failed to build graphs.")?;
    save_graphs(&manager, &output_path)?;
    info!("Graphs saved to: {}", output_path.display());

    Ok(())
}
