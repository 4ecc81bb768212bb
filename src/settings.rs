//! Code for loading program settings.
use crate::get_esom_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Result, anyhow};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// If this environment variable is set, the settings file is ignored
const USE_DEFAULT_SETTINGS_VAR: &str = "ESOM_USE_DEFAULT_SETTINGS";

const DEFAULT_SETTINGS_FILE_HEADER: &str = concat!(
    "# This file contains the program settings for esom.
#
# The default options for esom v",
    env!("CARGO_PKG_VERSION"),
    " are shown below, commented out. To change an option, uncomment it and set the value
# appropriately.
#
# To show the default options for the current version of esom, run:
# \tesom settings show-default
"
);

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_esom_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The default program log level
    pub log_level: String,
    /// Whether to overwrite output directories by default
    pub overwrite: bool,
    /// Results root path to save esom run outputs (logs, graphs, metadata). Defaults to
    /// `esom_results`.
    pub results_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            results_root: PathBuf::from("esom_results"),
        }
    }
}

impl Settings {
    /// Read the contents of the settings file.
    ///
    /// If the file is not present or `ESOM_USE_DEFAULT_SETTINGS` is set, default settings will be
    /// used.
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if loading fails.
    pub fn load() -> Result<Settings> {
        if std::env::var_os(USE_DEFAULT_SETTINGS_VAR).is_some() {
            return Ok(Settings::default());
        }

        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to the defaults if the file doesn't exist
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file.
    ///
    /// Every option is commented out and preceded by its documentation.
    pub fn default_file_contents() -> Result<String> {
        let defaults = toml::to_string(&Settings::default())?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in defaults.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };
            let docs = Settings::get_field_docs(field.trim())
                .map_err(|_| anyhow!("Missing documentation for setting {}", field.trim()))?;

            writeln!(out)?;
            for doc_line in docs.lines() {
                writeln!(out, "# # {}", doc_line.trim())?;
            }
            writeln!(out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}
