//! Command dispatch logic for repo-harvest

use super::{
    AdvisoriesArgs, CollectArgs, GovernanceArgs, InitArgs, RebuildArgs, init_config, process_advisories, process_collect,
    process_governance, process_rebuild,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-harvest", version, author, long_about = None)]
#[command(about = "Collect activity, governance, and vulnerability signals for open-source repositories")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: HarvestSubcommand,
}

#[derive(Subcommand, Debug)]
enum HarvestSubcommand {
    /// Collect repository activity signals from GitHub, resumably
    Collect(Box<CollectArgs>),
    /// Check repositories for governance artifacts
    Governance(Box<GovernanceArgs>),
    /// Query the OSV database for package vulnerabilities
    Advisories(Box<AdvisoriesArgs>),
    /// Rebuild the output tables from the checkpoint log
    Rebuild(RebuildArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the
/// corresponding subcommand. It's designed to be called from main.rs with the
/// program arguments.
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        HarvestSubcommand::Collect(collect_args) => process_collect(host, collect_args).await,
        HarvestSubcommand::Governance(governance_args) => process_governance(host, governance_args).await,
        HarvestSubcommand::Advisories(advisories_args) => process_advisories(host, advisories_args).await,
        HarvestSubcommand::Rebuild(rebuild_args) => process_rebuild(host, rebuild_args),
        HarvestSubcommand::Init(init_args) => init_config(host, init_args),
    }
}
