//! Write run and program metadata to a TOML file.
//!
//! The metadata records which configuration was run, in which mode and when, alongside the
//! version of the program. It is written as `metadata.toml` in the output directory.
use crate::config::RunMode;
use anyhow::Result;
use chrono::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output filename used for metadata.
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Top-level metadata structure serialized to TOML.
#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata<'a>,
}

/// Information about the run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the configuration file which was run
    config_path: &'a Path,
    /// The scenario label written into output rows
    scenario: &'a str,
    /// How the horizon was solved
    mode: RunMode,
    /// The date and time on which the run started
    datetime: String,
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
    /// Whether it is a debug build
    is_debug: bool,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            is_debug: cfg!(debug_assertions),
        }
    }
}

/// Write metadata to `metadata.toml` in the given output directory.
///
/// # Arguments
///
/// * `output_path` - Directory where `metadata.toml` will be written.
/// * `config_path` - Path to the configuration that was run.
/// * `scenario` - The scenario label.
/// * `mode` - The run mode.
pub fn write_metadata(
    output_path: &Path,
    config_path: &Path,
    scenario: &str,
    mode: RunMode,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            config_path,
            scenario,
            mode,
            datetime: Local::now().to_rfc2822(),
        },
        program: ProgramMetadata::default(),
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}
