//! The `advisories` command: OSV vulnerability queries per package.

use super::common::{CommonArgs, Session, read_packages};
use super::host::Host;
use crate::Result;
use crate::collect::advisories::Provider;
use crate::dataset::write_table;
use camino::Utf8PathBuf;
use clap::Args;
use std::io::Write;

pub const ADVISORIES_FILE: &str = "advisories.csv";

/// Arguments for the advisories command
#[derive(Args, Debug)]
pub struct AdvisoriesArgs {
    /// File listing the package names to query, one per line
    #[arg(value_name = "PACKAGES_FILE")]
    pub packages: Utf8PathBuf,

    /// Ecosystem the packages belong to (e.g. PyPI, crates.io, npm)
    #[arg(long, value_name = "NAME")]
    pub ecosystem: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_advisories<H: Host>(host: &mut H, args: &AdvisoriesArgs) -> Result<()> {
    let session = Session::new(&args.common)?;
    session.progress.set_phase("Preparing");

    let packages = read_packages(&args.packages)?;
    let ecosystem = args.ecosystem.clone().unwrap_or_else(|| session.config.osv_ecosystem.clone());
    let provider = Provider::new(ecosystem, None)?;

    session.progress.set_phase("Querying");
    let rows = provider.query_packages(&packages, &session.tracker).await;

    let path = session.config.outdir.as_std_path().join(ADVISORIES_FILE);
    write_table(&rows, &path)?;

    session.progress.done();

    let errored = rows.iter().filter(|r| r.error.is_some()).count();
    let mut out = host.output();
    writeln!(
        out,
        "Queried {} package(s): {} advisory row(s), {} query failure(s), wrote '{}'",
        packages.len(),
        rows.len() - errored,
        errored,
        path.display()
    )?;

    Ok(())
}
