//! Shared argument handling and setup for the collection commands.

use super::ProgressReporter;
use super::config::Config;
use crate::Result;
use crate::collect::{Progress, RepoSpec, RequestTracker, TokenPool};
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::{Args, ValueEnum};
use core::time::Duration;
use ohno::IntoAppError;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every collection command
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// GitHub personal access token(s); repeat or comma-separate to rotate several
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKENS", value_delimiter = ',', hide_env_values = true)]
    pub github_token: Vec<String>,

    /// Path to configuration file (default is `harvest.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory the output tables are written to
    #[arg(long, value_name = "PATH")]
    pub outdir: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Shared setup performed once per command: logging, configuration, progress.
pub struct Session {
    pub config: Config,
    pub progress: Arc<dyn Progress>,
    pub tracker: RequestTracker,
}

impl Session {
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let mut config = Config::load(args.config.as_ref())?;
        if let Some(outdir) = &args.outdir {
            config.outdir = outdir.clone();
        }

        // With logging on, the progress bar would fight the log lines for the
        // terminal; push its appearance out of reach.
        let delay = if args.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_secs(365 * 24 * 3600)
        };

        let use_colors = match args.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::{IsTerminal, stderr};
                stderr().is_terminal()
            }
        };

        let progress: Arc<dyn Progress> = Arc::new(ProgressReporter::new(delay, use_colors));
        let tracker = RequestTracker::new(&progress);

        Ok(Self { config, progress, tracker })
    }

    /// Build the token pool from the command line / environment secrets.
    pub fn token_pool(&self, args: &CommonArgs) -> Result<Arc<TokenPool>> {
        let pool = Arc::new(TokenPool::new(args.github_token.iter().cloned(), Utc::now())?);
        log::info!("{} token(s) loaded", pool.len());
        Ok(pool)
    }
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

/// Read the work-unit universe from a units file: one repository identifier
/// per line, `#` comments and blank lines ignored, duplicates dropped while
/// preserving first-seen order.
pub fn read_units(path: &Utf8PathBuf) -> Result<Vec<RepoSpec>> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading units file '{path}'"))?;

    let mut seen = HashSet::new();
    let mut units = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let unit = RepoSpec::parse(line)?;
        if seen.insert(unit.full_name()) {
            units.push(unit);
        }
    }

    Ok(units)
}

/// Read package names from a file, one per line, deduplicated in order.
pub fn read_packages(path: &Utf8PathBuf) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading packages file '{path}'"))?;

    let mut seen = HashSet::new();
    let mut packages = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if seen.insert(line.to_string()) {
            packages.push(line.to_string());
        }
    }

    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(content: &str) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.txt");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        let utf8 = Utf8PathBuf::from_path_buf(path).unwrap();
        (dir, utf8)
    }

    #[test]
    fn test_read_units_dedupes_preserving_order() {
        let (_dir, path) = write_temp("b/two\na/one\n\n# comment\nb/two\nhttps://github.com/a/one\n");
        let units = read_units(&path).unwrap();
        let names: Vec<_> = units.iter().map(RepoSpec::full_name).collect();
        assert_eq!(names, vec!["b/two", "a/one"]);
    }

    #[test]
    fn test_read_units_rejects_bad_lines() {
        let (_dir, path) = write_temp("not-a-repo\n");
        let _ = read_units(&path).unwrap_err();
    }

    #[test]
    fn test_read_units_missing_file() {
        let path = Utf8PathBuf::from("/missing/units.txt");
        let _ = read_units(&path).unwrap_err();
    }

    #[test]
    fn test_read_packages() {
        let (_dir, path) = write_temp("requests\nflask\n# skip\nrequests\n");
        let packages = read_packages(&path).unwrap();
        assert_eq!(packages, vec!["requests", "flask"]);
    }
}
