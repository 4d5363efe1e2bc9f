// twostream-cli/src/logging.rs
//
// Logger setup and log file naming. The application uses the `log` facade
// with `env_logger` as the backend. The level comes from `--verbose` (debug)
// or the RUST_LOG environment variable, defaulting to info. With `--log-dir`
// every record is also written to a per-run file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
///
/// # Example
/// ```
/// let name = format!("twostream_index_{}.log", twostream_cli::logging::get_timestamp());
/// assert!(name.ends_with(".log"));
/// ```
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<log_dir>/twostream_<command>_<timestamp>.log`
pub fn log_file_path(log_dir: &Path, command: &str) -> PathBuf {
    log_dir.join(format!("twostream_{}_{}.log", command, get_timestamp()))
}

/// Copies every log line to stderr and to the run's log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Installs the global logger. Returns the log file path when one was opened.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>, command: &str) -> Result<Option<PathBuf>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp_secs();

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
            let path = log_file_path(dir, command);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            builder.target(Target::Pipe(Box::new(TeeWriter { file })));
            Some(path)
        }
        None => None,
    };

    builder.try_init().context("Logger already initialized")?;
    Ok(log_path)
}
