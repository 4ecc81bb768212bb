//! CLI commands for inspecting the program settings file.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::Result;
use clap::Subcommand;

/// The subcommands for managing the settings file.
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Show the path to the settings file.
    ShowPath,
    /// Show the contents of the default settings file.
    ShowDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::ShowPath => println!("{}", get_settings_file_path().display()),
            Self::ShowDefault => print!("{}", Settings::default_file_contents()?),
        }

        Ok(())
    }
}
