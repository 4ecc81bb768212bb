//! Logging for the program.
//!
//! Messages are printed to the terminal with colours and, for commands which have an output
//! directory, also written to log files there. The log level can be changed with the
//! `ESOM_LOG_LEVEL` environment variable, which takes precedence over the settings file.
use anyhow::{Result, bail};
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::fmt::Arguments;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// The default log level for the program.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file containing messages about the ordinary operation of the program
const LOG_INFO_FILE_NAME: &str = "esom_info.log";

/// The file name for the log file containing debug messages
const LOG_DEBUG_FILE_NAME: &str = "esom_debug.log";

/// Environment variable overriding the configured log level
const LOG_LEVEL_VAR: &str = "ESOM_LOG_LEVEL";

/// Used to indicate whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parse a log level, which may be `off`, `error`, `warn`, `info`, `debug` or `trace`
fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        unknown => bail!("Unknown log level: {unknown}"),
    }
}

/// Initialise the program logger using the `fern` logging library.
///
/// If `ESOM_LOG_LEVEL` is set, its value is used in place of `log_level_from_settings`.
///
/// # Arguments
///
/// * `log_level_from_settings` - The log level specified in the settings file
/// * `log_file_path` - The directory to write log files to, if any
pub fn init(log_level_from_settings: &str, log_file_path: Option<&Path>) -> Result<()> {
    if is_logger_initialised() {
        bail!("Logger already initialised");
    }

    let log_level = std::env::var(LOG_LEVEL_VAR)
        .unwrap_or_else(|_| log_level_from_settings.to_string());
    let log_level = parse_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let use_colour = std::io::stdout().is_terminal();

    // Warnings and errors go to stderr, everything else to stdout
    let stdout_dispatch = Dispatch::new()
        .filter(|metadata| metadata.level() > log::Level::Warn)
        .format(move |out, message, record| {
            write_log_coloured(out, message, record, use_colour, colours);
        })
        .level(log_level)
        .chain(std::io::stdout());
    let stderr_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_log_coloured(out, message, record, use_colour, colours);
        })
        .level(log_level.min(LevelFilter::Warn))
        .chain(std::io::stderr());

    let mut dispatch = Dispatch::new().chain(stdout_dispatch).chain(stderr_dispatch);

    if let Some(log_file_path) = log_file_path {
        let open = |name: &str| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(log_file_path.join(name))
        };

        // Everything but debug and trace messages
        let info_file = Dispatch::new()
            .format(write_log_plain)
            .level(log_level.min(LevelFilter::Info))
            .chain(open(LOG_INFO_FILE_NAME)?);

        // Debug messages are recorded whatever the terminal log level, unless logging is off
        let debug_level = if log_level == LevelFilter::Off {
            LevelFilter::Off
        } else {
            LevelFilter::Debug
        };
        let debug_file = Dispatch::new()
            .filter(|metadata| metadata.level() >= log::Level::Debug)
            .format(write_log_plain)
            .level(debug_level)
            .chain(open(LOG_DEBUG_FILE_NAME)?);

        dispatch = dispatch.chain(info_file).chain(debug_file);
    }

    dispatch.apply()?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Write a log message, with colour if enabled
fn write_log_coloured(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: ColoredLevelConfig,
) {
    if use_colour {
        out.finish(format_args!(
            "[{} {} {}] {}",
            timestamp(),
            colours.color(record.level()),
            record.target(),
            message
        ));
    } else {
        write_log_plain(out, message, record);
    }
}

/// Write a log message without colour
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    out.finish(format_args!(
        "[{} {} {}] {}",
        timestamp(),
        record.level(),
        record.target(),
        message
    ));
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("info", LevelFilter::Info)]
    #[case("Debug", LevelFilter::Debug)]
    fn parse_level_works(#[case] level: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_level(level).unwrap(), expected);
    }

    #[test]
    fn parse_level_unknown() {
        assert!(parse_level("loud").is_err());
    }
}
