//! Mirrorcheck - verify that a destination folder tree is a faithful copy of a source tree

mod config;
mod logging;
mod output;
mod wiring;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use tracing::{error, info};

use mirrorcheck_core::application::constants::STATUS_POLL_INTERVAL;
use mirrorcheck_core::domain::{ExecutionMode, JobRecord};

use config::{Cli, Commands};
use output::{colored_state, exit_code_for, EXIT_ERROR, EXIT_SUCCESS};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging() {
        eprintln!("{} {:#}", "warning:".yellow(), e);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    info!("Mirrorcheck v{}", mirrorcheck_core::VERSION);
    let app = wiring::build(&cli.settings).await?;

    match cli.command {
        Commands::Verify {
            src,
            dst,
            inline,
            json,
        } => {
            let mode = if inline {
                ExecutionMode::Inline
            } else {
                ExecutionMode::Background
            };

            let job_id = match app.service.register(&src, &dst, mode).await {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("{} {}", "✗ Registration failed:".red().bold(), e);
                    return Ok(EXIT_ERROR);
                }
            };
            eprintln!("{} {}", "✓ Job registered:".green().bold(), job_id);

            let mut last: Option<(Option<String>, Option<i64>)> = None;
            let record = app
                .service
                .wait_until_settled(&job_id, STATUS_POLL_INTERVAL, None, |record: &JobRecord| {
                    let snapshot = (
                        record.state.map(|s| s.to_string()),
                        record.download_count,
                    );
                    if last.as_ref() != Some(&snapshot) {
                        eprintln!(
                            "  {} {} files downloaded",
                            colored_state(record.state),
                            record.download_count.unwrap_or(0)
                        );
                        last = Some(snapshot);
                    }
                })
                .await?;
            app.pool.drain().await;

            if json {
                output::print_json(&record)?;
            } else {
                output::print_record(&job_id, &record);
            }
            Ok(exit_code_for(&record))
        }

        Commands::Status { job_id, json } => {
            let record = app.service.get_state(&job_id).await?;
            if json {
                output::print_json(&record)?;
            } else {
                output::print_record(&job_id, &record);
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Ready => {
            if app.service.ready().await {
                println!("{}", "✓ Download tool is ready".green().bold());
                Ok(EXIT_SUCCESS)
            } else {
                println!("{}", "✗ Download tool is not ready".red().bold());
                Ok(EXIT_ERROR)
            }
        }

        Commands::Clear => {
            let deleted = app.service.clear_jobs().await?;
            println!("{}", format!("✓ {} job records deleted", deleted).green().bold());
            Ok(EXIT_SUCCESS)
        }
    }
}
