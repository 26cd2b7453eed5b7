//! Logging setup for the `pfilter` binary.
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::LevelFilter;

/// Timestamp layout of every log line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Parse a log level name (off, error, warn, info, debug, trace).
pub fn parse_level(log_level: &str) -> Result<LevelFilter, Box<dyn Error>> {
    log_level
        .parse::<LevelFilter>()
        .map_err(|_| format!("invalid log level '{}'", log_level).into())
}

/// Initialize the global logger.
///
/// # Arguments
/// * `log_level` - Log level name, see [`parse_level`]
/// * `log_file` - Optional file to append to; logs go to stderr if `None`
///
/// # Errors
/// Returns an error for an unknown level, if the log file cannot be opened,
/// or if a logger is already installed.
pub fn init_logger(log_level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let level = parse_level(log_level)?;
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}
