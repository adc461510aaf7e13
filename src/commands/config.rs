use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "harvest.toml";

const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Number of work units in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory the output tables are written to
    #[serde(default = "default_outdir")]
    pub outdir: Utf8PathBuf,

    /// Path of the append-only checkpoint log
    #[serde(default = "default_checkpoint")]
    pub checkpoint: Utf8PathBuf,

    /// Ecosystem used for OSV advisory queries
    #[serde(default = "default_osv_ecosystem")]
    pub osv_ecosystem: String,
}

const fn default_concurrency() -> usize {
    3
}

fn default_outdir() -> Utf8PathBuf {
    Utf8PathBuf::from("out")
}

fn default_checkpoint() -> Utf8PathBuf {
    Utf8PathBuf::from("out/github_checkpoint.jsonl")
}

fn default_osv_ecosystem() -> String {
    "PyPI".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            outdir: default_outdir(),
            checkpoint: default_checkpoint(),
            osv_ecosystem: default_osv_ecosystem(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// With an explicit path the file must exist; otherwise `harvest.toml` is
    /// looked up in the working directory and silently skipped when absent.
    pub fn load(config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = Utf8PathBuf::from(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to '{output_path}'"))
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.concurrency > MAX_CONCURRENCY {
            bail!("concurrency must be at most {MAX_CONCURRENCY}");
        }
        if self.osv_ecosystem.trim().is_empty() {
            bail!("osv_ecosystem must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.outdir, Utf8PathBuf::from("out"));
        assert_eq!(config.osv_ecosystem, "PyPI");
    }

    #[test]
    fn test_embedded_default_config_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(config.concurrency, Config::default().concurrency);
        assert_eq!(config.checkpoint, Config::default().checkpoint);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("concurrency = 5").unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.outdir, Utf8PathBuf::from("out"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: core::result::Result<Config, _> = toml::from_str("concurency = 5");
        let _ = result.unwrap_err();
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config: Config = toml::from_str("concurrency = 0").unwrap();
        let _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let config: Config = toml::from_str("concurrency = 1000").unwrap();
        let _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = Utf8PathBuf::from("/definitely/not/here/harvest.toml");
        let _ = Config::load(Some(&path)).unwrap_err();
    }
}
