//! Logging to the terminal and the session log file

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use fern::{Dispatch, FormatCallback};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must be `INFO` or more verbose, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger is already installed: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Records go to stdout and to the session's log file. `min_level` applies to
/// every target except those listed in `target_levels`, which are given their
/// own level. Targets match by module prefix, so `"motorbit"` covers both the
/// channel driver and the simulated bus.
///
/// `min_level` must be `INFO` or more verbose so the session details below
/// always make it into the log. Only call this once per process.
pub fn logger_init(
    min_level: LevelFilter,
    target_levels: &[(&'static str, LevelFilter)],
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let dispatch = Dispatch::new()
        .format(format_record)
        .level(min_level);

    target_levels
        .iter()
        .fold(dispatch, |d, &(target, level)| d.level_for(target, level))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging to {:?}", session.log_file_path);
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {}", min_level);
    for (target, level) in target_levels {
        info!("    Log level for {}: {}", target, level);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_record(out: FormatCallback, message: &Arguments, record: &Record) {
    out.finish(format_args!(
        "[{:10.6} {}] {}{}",
        session::get_elapsed_seconds(),
        level_tag(record.level()),
        target_prefix(record.level(), record.target()),
        message
    ))
}

/// Debug and trace records are prefixed with their target.
fn target_prefix(level: Level, target: &str) -> String {
    if level > Level::Info {
        format!("{}: ", target)
    }
    else {
        String::new()
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info  => "INF".normal(),
        Level::Warn  => "WRN".yellow(),
        Level::Error => "ERR".red().bold()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_min_level_must_include_info() {
        let session = Session {
            session_root: PathBuf::from("unused"),
            log_file_path: PathBuf::from("unused/motorbit.log")
        };

        for level in [LevelFilter::Off, LevelFilter::Error, LevelFilter::Warn] {
            match logger_init(level, &[], &session) {
                Err(LoggerInitError::InvalidMinLogLevel(l)) => assert_eq!(l, level),
                r => panic!("Expected {} to be rejected, got {:?}", level, r)
            }
        }

        // Rejected before the log file is touched
        assert!(!session.log_file_path.exists());
    }

    #[test]
    fn test_target_prefix() {
        assert_eq!(target_prefix(Level::Info, "motorbit::pca9685"), "");
        assert_eq!(target_prefix(Level::Warn, "motorbit::pca9685"), "");
        assert_eq!(target_prefix(Level::Debug, "motorbit::sim"), "motorbit::sim: ");
        assert_eq!(target_prefix(Level::Trace, "motorbit_exec"), "motorbit_exec: ");
    }
}
