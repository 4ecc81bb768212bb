//! Energy system optimisation model runner.
//!
//! Builds a sparse dataset from a relational store, screens the commodity network for
//! technologies that can never contribute to meeting demand, then solves either the full horizon
//! at once or a chain of overlapping windows (myopic mode), writing results back to the store.
use std::path::PathBuf;

pub mod cli;
pub mod commodity;
pub mod config;
#[cfg(test)]
mod fixture;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod myopic;
pub mod network;
pub mod output;
pub mod period;
pub mod pool;
pub mod price_check;
pub mod region;
pub mod run;
pub mod settings;
pub mod store;
pub mod technology;

/// Where to report bugs
pub const ISSUES_URL: &str = "https://github.com/esom-project/esom/issues";

/// Get the directory where program configuration files are stored.
///
/// Uses `$ESOM_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/esom` or `$HOME/.config/esom`.
pub fn get_esom_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ESOM_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    let mut path = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_default();
    path.push("esom");
    path
}
