// Command-line and environment configuration

use clap::{Args, Parser, Subcommand};
use mirrorcheck_core::application::constants::DEFAULT_MAX_WORKERS;
use mirrorcheck_core::application::VerifierConfig;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "~/.mirrorcheck/records.db";
const DEFAULT_GDRIVE_BIN: &str = "gdrive";

#[derive(Parser, Debug)]
#[command(name = "mirrorcheck")]
#[command(about = "Verify that a destination folder tree is a faithful copy of a source tree", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub settings: Settings,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Job record database (shared by concurrent readers)
    #[arg(long, global = true, env = "MIRRORCHECK_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Download tool executable
    #[arg(long, global = true, env = "MIRRORCHECK_GDRIVE_BIN", default_value = DEFAULT_GDRIVE_BIN)]
    pub gdrive_bin: PathBuf,

    /// Download tool configuration directory
    #[arg(long, global = true, env = "MIRRORCHECK_GDRIVE_CONFIG")]
    pub gdrive_config: Option<PathBuf>,

    /// Service account key file for the download tool
    #[arg(long, global = true, env = "MIRRORCHECK_SERVICE_ACCOUNT")]
    pub service_account: Option<PathBuf>,

    /// Where downloaded trees are placed [default: <system temp>/mirrorcheck]
    #[arg(long, global = true, env = "MIRRORCHECK_DOWNLOAD_ROOT")]
    pub download_root: Option<PathBuf>,

    /// Keep downloaded trees and reuse them for later jobs
    #[arg(long, global = true, env = "MIRRORCHECK_KEEP_DOWNLOADS")]
    pub keep_downloads: bool,

    /// Leave downloaded trees on disk when a job ends in error
    #[arg(long, global = true, env = "MIRRORCHECK_NO_CLEANUP_ON_ERROR")]
    pub no_cleanup_on_error: bool,

    /// Concurrent background verifications
    #[arg(long, global = true, env = "MIRRORCHECK_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub workers: usize,
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }

    pub fn download_root(&self) -> PathBuf {
        match &self.download_root {
            Some(root) => PathBuf::from(shellexpand::tilde(&root.to_string_lossy()).into_owned()),
            None => std::env::temp_dir().join("mirrorcheck"),
        }
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            keep_downloads: self.keep_downloads,
            cleanup_on_error: !self.no_cleanup_on_error,
            ..VerifierConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a verification job and wait for its outcome
    Verify {
        /// Source folder (URL or bare id)
        src: String,

        /// Destination folder (URL or bare id)
        dst: String,

        /// Run in this task instead of on the worker pool
        #[arg(long)]
        inline: bool,

        /// Print the final record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current record of a job
    Status {
        /// Job ID
        job_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the download tool is installed and reachable
    Ready,

    /// Delete every job record
    Clear,
}
