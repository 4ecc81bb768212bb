//! Read and validate the run configuration from a TOML file.
use crate::input::{input_err_msg, read_toml};
use crate::network::manager::NetworkOptions;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::Display;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_scenario, String, "default".into());
define_param_default!(default_true, bool, true);
define_param_default!(default_view_depth, usize, 2);
define_param_default!(default_step_size, usize, 1);
define_param_default!(default_vacuum_interval, usize, 1);

/// How the model horizon is solved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    /// The whole horizon is solved at once
    #[default]
    PerfectForesight,
    /// The horizon is solved as a chain of overlapping windows
    Myopic,
    /// Only analyse the commodity network, without solving
    Check,
}

/// Parameters for myopic runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MyopicConfig {
    /// The number of periods visible in each window
    #[serde(default = "default_view_depth")]
    pub view_depth: usize,
    /// The number of periods committed by each window
    #[serde(default = "default_step_size")]
    pub step_size: usize,
}

impl Default for MyopicConfig {
    fn default() -> Self {
        Self {
            view_depth: default_view_depth(),
            step_size: default_step_size(),
        }
    }
}

/// The run configuration, as defined in a `config.toml` file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Label written into every output row
    #[serde(default = "default_scenario")]
    pub scenario: String,
    /// Path to the input database
    pub input_database: PathBuf,
    /// Path to the output database. Defaults to the input database.
    #[serde(default)]
    pub output_database: Option<PathBuf>,
    /// How the horizon is solved
    #[serde(default)]
    pub mode: RunMode,
    /// Filter out technologies which fail the commodity network analysis.
    ///
    /// Always enabled for myopic and check runs.
    #[serde(default)]
    pub source_trace: bool,
    /// Warn about inconsistent cost data
    #[serde(default = "default_true")]
    pub price_check: bool,
    /// Treat any orphaned technology as a fatal error
    #[serde(default)]
    pub strict_network: bool,
    /// Treat demand which no technology can meet as a fatal error
    #[serde(default = "default_true")]
    pub fail_on_unsupported_demand: bool,
    /// Write graphs of the commodity network to the output directory
    #[serde(default)]
    pub plot_commodity_network: bool,
    /// Time limit passed to the solver
    #[serde(default)]
    pub time_limit_hours: Option<f64>,
    /// Parameters for myopic runs
    #[serde(default)]
    pub myopic: MyopicConfig,
    /// Compact the output database after this many committed windows
    #[serde(default = "default_vacuum_interval")]
    pub vacuum_interval: usize,
}

/// Check that the myopic window parameters are valid
fn check_myopic(myopic: &MyopicConfig) -> Result<()> {
    ensure!(
        myopic.view_depth > 0 && myopic.step_size > 0,
        "myopic.view_depth and myopic.step_size must both be greater than zero"
    );
    ensure!(
        myopic.step_size <= myopic.view_depth,
        "myopic.step_size ({}) cannot be larger than myopic.view_depth ({})",
        myopic.step_size,
        myopic.view_depth
    );

    Ok(())
}

/// Check that the `time_limit_hours` parameter is valid
fn check_time_limit_hours(value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value > 0.0,
            "time_limit_hours must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that the `vacuum_interval` parameter is valid
fn check_vacuum_interval(value: usize) -> Result<()> {
    ensure!(value > 0, "vacuum_interval cannot be zero");

    Ok(())
}

/// Resolve a path relative to the directory containing the config file
fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

impl RunConfig {
    /// Read a run configuration file.
    ///
    /// Relative database paths are taken to be relative to the directory containing the file.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the configuration file
    pub fn from_path(file_path: &Path) -> Result<RunConfig> {
        let mut config: RunConfig = read_toml(file_path)?;

        let base_dir = file_path.parent().unwrap_or(Path::new(""));
        config.input_database = resolve(base_dir, &config.input_database);
        config.output_database = config
            .output_database
            .map(|path| resolve(base_dir, &path));

        config
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(config)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        ensure!(!self.scenario.trim().is_empty(), "scenario cannot be empty");

        // myopic
        check_myopic(&self.myopic)?;

        // Committed capacity is read back from the output tables
        ensure!(
            self.mode != RunMode::Myopic || self.output_database() == self.input_database,
            "A myopic run needs the input and output databases to be the same"
        );

        // time_limit_hours
        check_time_limit_hours(self.time_limit_hours)?;

        // vacuum_interval
        check_vacuum_interval(self.vacuum_interval)?;

        Ok(())
    }

    /// The database results are written to
    pub fn output_database(&self) -> &Path {
        self.output_database
            .as_deref()
            .unwrap_or(&self.input_database)
    }

    /// Whether loaded data is filtered by the commodity network analysis
    pub fn filter_data(&self) -> bool {
        self.source_trace || self.mode != RunMode::PerfectForesight
    }

    /// How the network analysis treats problems
    pub fn network_options(&self) -> NetworkOptions {
        NetworkOptions {
            strict: self.strict_network,
            fail_on_unsupported_demand: self.fail_on_unsupported_demand,
        }
    }
}
