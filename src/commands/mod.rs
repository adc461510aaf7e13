//! Command-line interface and orchestration for repo-harvest
//!
//! This module implements the CLI commands and coordinates the collection
//! engine end-to-end. It handles argument parsing, configuration management,
//! and the high-level workflows.
//!
//! # Implementation Model
//!
//! The module is organized around five commands:
//!
//! - **collect**: Resumable GitHub collection over a units file, writing one
//!   checkpoint record per repository and rebuilding the output tables from
//!   the full log afterwards
//! - **governance**: Governance artifact detection per repository
//! - **advisories**: OSV vulnerability queries per package
//! - **rebuild**: Reconstruct the output tables from an existing checkpoint
//!   log without any network access
//! - **init**: Generate a default configuration file
//!
//! The `run` function parses command-line arguments using clap and routes to
//! the appropriate command handler. The `common` module provides the shared
//! setup (logging, configuration, progress reporting, token pool) each
//! collection command performs first.

mod advisories;
mod collect;
mod common;
mod config;
mod governance;
mod host;
mod init;
mod progress_reporter;
mod rebuild;
mod run;

pub use advisories::{ADVISORIES_FILE, AdvisoriesArgs, process_advisories};
pub use collect::{CollectArgs, process_collect};
pub use common::{ColorMode, CommonArgs, LogLevel};
pub use config::Config;
pub use governance::{GOVERNANCE_FILE, GovernanceArgs, process_governance};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use rebuild::{RebuildArgs, process_rebuild};
pub use run::run;
