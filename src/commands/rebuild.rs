//! The `rebuild` command: reconstruct the output tables from an existing
//! checkpoint log without touching the network.

use super::common::{CommonArgs, Session};
use super::host::Host;
use crate::Result;
use crate::collect::CheckpointLog;
use crate::dataset::Dataset;
use camino::Utf8PathBuf;
use clap::Args;
use ohno::bail;
use std::io::Write;

/// Arguments for the rebuild command
#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Path of the checkpoint log to rebuild from
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn process_rebuild<H: Host>(host: &mut H, args: &RebuildArgs) -> Result<()> {
    let session = Session::new(&args.common)?;

    let checkpoint_path = args.checkpoint.as_ref().unwrap_or(&session.config.checkpoint);
    if !checkpoint_path.exists() {
        bail!("checkpoint log '{checkpoint_path}' not found; run `repo-harvest collect` first");
    }

    let checkpoint = CheckpointLog::open(checkpoint_path)?;
    let dataset = Dataset::rebuild(checkpoint.load_all()?);
    dataset.write_csv(session.config.outdir.as_std_path())?;

    session.progress.done();

    writeln!(
        host.output(),
        "Rebuilt {} metadata row(s), {} pull request(s), {} bug issue(s), {} contributor(s) into '{}'",
        dataset.meta.len(),
        dataset.pulls.len(),
        dataset.bugs.len(),
        dataset.contributors.len(),
        session.config.outdir
    )?;

    Ok(())
}
