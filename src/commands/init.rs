//! The `init` command: write a default configuration file.

use super::config::{CONFIG_FILE_NAME, Config};
use super::host::Host;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Args;
use ohno::bail;
use std::io::Write;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration file
    #[arg(long, value_name = "PATH", default_value = CONFIG_FILE_NAME)]
    pub output: Utf8PathBuf,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!("'{}' already exists; pass --force to overwrite it", args.output);
    }

    Config::save_default(&args.output)?;
    writeln!(host.output(), "Wrote default configuration to '{}'", args.output)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    fn test_init_writes_parseable_config() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::from_path_buf(dir.path().join("harvest.toml")).unwrap();

        let mut host = TestHost::new();
        init_config(&mut host, &InitArgs { output: output.clone(), force: false }).unwrap();

        let _: Config = Config::load(Some(&output)).unwrap();
        assert!(String::from_utf8(host.output_buf).unwrap().contains("Wrote default configuration"));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::from_path_buf(dir.path().join("harvest.toml")).unwrap();
        std::fs::write(&output, "concurrency = 9").unwrap();

        let mut host = TestHost::new();
        let _ = init_config(&mut host, &InitArgs { output: output.clone(), force: false }).unwrap_err();

        // Untouched without --force.
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "concurrency = 9");
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::from_path_buf(dir.path().join("harvest.toml")).unwrap();
        std::fs::write(&output, "concurrency = 9").unwrap();

        let mut host = TestHost::new();
        init_config(&mut host, &InitArgs { output: output.clone(), force: true }).unwrap();

        let config = Config::load(Some(&output)).unwrap();
        assert_eq!(config.concurrency, 3);
    }
}
