//! The `collect` command: resilient GitHub collection over a set of
//! repositories, followed by a full dataset rebuild from the checkpoint log.

use super::common::{CommonArgs, Session, read_units};
use super::host::Host;
use crate::Result;
use crate::collect::github::Provider;
use crate::collect::{CheckpointLog, Dispatcher};
use crate::dataset::Dataset;
use camino::Utf8PathBuf;
use clap::Args;
use std::io::Write;
use std::sync::Arc;

/// Arguments for the collect command
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// File listing the repositories to collect, one `owner/name` or URL per line
    #[arg(value_name = "UNITS_FILE")]
    pub units: Utf8PathBuf,

    /// Path of the append-only checkpoint log
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<Utf8PathBuf>,

    /// Number of repositories in flight at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Also reattempt units recorded as errored by earlier runs
    #[arg(long)]
    pub retry_failed: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run collection and rebuild the aggregate dataset.
pub async fn process_collect<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    let session = Session::new(&args.common)?;
    session.progress.set_phase("Preparing");

    let units = read_units(&args.units)?;
    let pool = session.token_pool(&args.common)?;

    let checkpoint_path = args.checkpoint.as_ref().unwrap_or(&session.config.checkpoint);
    let checkpoint = Arc::new(CheckpointLog::open(checkpoint_path)?);

    let concurrency = args.concurrency.unwrap_or(session.config.concurrency);
    let provider = Provider::new(Arc::clone(&pool), None)?;
    let dispatcher = Dispatcher::new(provider, Arc::clone(&checkpoint), Arc::clone(&pool), concurrency);

    session.progress.set_phase("Collecting");
    let summary = dispatcher.run(&units, args.retry_failed, &session.tracker).await?;

    session.progress.set_phase("Rebuilding");
    let dataset = Dataset::rebuild(checkpoint.load_all()?);
    dataset.write_csv(session.config.outdir.as_std_path())?;

    session.progress.done();

    let mut out = host.output();
    writeln!(
        out,
        "Collected {} | Skipped {} | Errored {} | Previously recorded {}",
        summary.done, summary.skipped, summary.errored, summary.already_done
    )?;
    writeln!(
        out,
        "Dataset: {} metadata row(s), {} pull request(s), {} bug issue(s), {} contributor(s) in '{}'",
        dataset.meta.len(),
        dataset.pulls.len(),
        dataset.bugs.len(),
        dataset.contributors.len(),
        session.config.outdir
    )?;
    drop(out);

    if summary.errored > 0 {
        writeln!(
            host.error(),
            "{} unit(s) errored; each has a recorded reason in '{}' (rerun with --retry-failed to reattempt them)",
            summary.errored,
            checkpoint_path
        )?;
    }

    Ok(())
}
