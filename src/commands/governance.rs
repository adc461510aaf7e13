//! The `governance` command: governance artifact detection per repository.

use super::common::{CommonArgs, Session, read_units};
use super::host::Host;
use crate::Result;
use crate::collect::governance::Provider;
use crate::dataset::write_table;
use camino::Utf8PathBuf;
use clap::Args;
use std::io::Write;

pub const GOVERNANCE_FILE: &str = "governance.csv";

/// Arguments for the governance command
#[derive(Args, Debug)]
pub struct GovernanceArgs {
    /// File listing the repositories to check, one `owner/name` or URL per line
    #[arg(value_name = "UNITS_FILE")]
    pub units: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_governance<H: Host>(host: &mut H, args: &GovernanceArgs) -> Result<()> {
    let session = Session::new(&args.common)?;
    session.progress.set_phase("Preparing");

    let units = read_units(&args.units)?;
    let pool = session.token_pool(&args.common)?;
    let provider = Provider::new(pool, None)?;

    session.progress.set_phase("Checking");
    let rows = provider.check_repos(&units, &session.tracker).await;

    let path = session.config.outdir.as_std_path().join(GOVERNANCE_FILE);
    write_table(&rows, &path)?;

    session.progress.done();

    let scored: Vec<f64> = rows.iter().filter_map(|r| r.artifact_score).collect();
    let mut out = host.output();
    writeln!(out, "Checked {} repositories, wrote '{}'", rows.len(), path.display())?;
    if !scored.is_empty() {
        #[expect(clippy::cast_precision_loss, reason = "mean over small counts")]
        let mean = scored.iter().sum::<f64>() / scored.len() as f64;
        writeln!(out, "Mean governance artifact score: {mean:.2}")?;
    }

    Ok(())
}
