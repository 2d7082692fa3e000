//! manifest-walker - Two-Phase Directory-First Crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use manifest_walker::config::{CliArgs, CrawlConfig};
use manifest_walker::error::ConfigError;
use manifest_walker::progress::{print_header, print_summary, ProgressReporter};
use manifest_walker::walker::CrawlCoordinator;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status for invalid arguments or configuration
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            if is_config_error(&e) {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = CrawlConfig::from_args(args).context("Invalid configuration")?;

    // Print header
    if config.show_progress {
        print_header(
            &config.root.display().to_string(),
            config.discovery_workers,
            config.listing_workers,
            &config.output.display_path().display().to_string(),
        );
    }

    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Discovering directories...");
    }

    let show_progress = config.show_progress;
    let coordinator = CrawlCoordinator::new(config);
    let result = coordinator.run(progress.as_ref()).context("Crawl failed")?;

    if let Some(ref p) = progress {
        p.finish("Crawl completed");
    }

    if show_progress {
        print_summary(&result);
    }

    if result.list_errors > 0 || result.entry_errors > 0 {
        info!(
            list_errors = result.list_errors,
            entry_errors = result.entry_errors,
            "Crawl completed with skipped entries"
        );
    }

    Ok(())
}

fn is_config_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ConfigError>())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("manifest_walker=debug,warn")
    } else {
        EnvFilter::new("manifest_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
