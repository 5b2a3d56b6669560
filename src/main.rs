use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use curam_artifact_collector::aggregator::{aggregate, step_plan, RunContext, StepStatus};
use curam_artifact_collector::archiver::archive_and_clean;
use curam_artifact_collector::config::{Cli, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Console logging on stderr; RUST_LOG overrides the default level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_cli(cli).context("Configuration rejected, no archive produced")?;

    // Configure Rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build_global()
        .ok();

    info!(
        server = %config.sources.server_root.display(),
        client = %config.sources.client_root.display(),
        skipped = config.sources.skip_components.len(),
        "collecting artifacts"
    );

    let ctx = RunContext::new(config);
    let start = Instant::now();

    let progress = ProgressBar::with_draw_target(
        Some(step_plan().len() as u64),
        ProgressDrawTarget::stderr(),
    );
    progress.set_style(
        ProgressStyle::default_bar()
            .template(" |- Searching for artifacts in the components: {percentage}% [{bar:30.cyan/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let collection = aggregate(&ctx, &progress).context("Failed to prepare collection")?;
    progress.finish_with_message("Complete");

    let archive = archive_and_clean(
        &ctx.config.staging_dir,
        &ctx.config.archive_path,
        ctx.config.keep_staging,
    )
    .context("Failed to create archive")?;

    let duration = start.elapsed();
    let stats = &ctx.stats;

    // Print summary
    println!(
        "Staged {} files ({} already staged, {} skipped with errors) into {} ({} entries) in {:.2}s",
        stats.files_staged.get(),
        stats.already_staged.get(),
        stats.errors.get(),
        ctx.config.archive_path.display(),
        archive.entries,
        duration.as_secs_f64()
    );

    // Per-step breakdown
    for report in &collection.reports {
        let status_str = match &report.status {
            StepStatus::Success => format!("{} files", report.summary.staged),
            StepStatus::Failed(e) => format!("FAILED: {e}"),
        };
        println!("  {}: {}", report.step, status_str);
    }

    Ok(ExitCode::SUCCESS)
}
