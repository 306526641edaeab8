mod app;
mod cli;
mod progress;
mod settings;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use pressroom_engine::RunSummary;

use crate::cli::{Cli, Command, RunArgs};

const LOG_FILE: &str = "./pressroom.log";

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
    };
    match result {
        Ok(summary) if summary.is_halted() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<RunSummary> {
    pressroom_logging::initialize(args.log.into(), LevelFilter::Info, Path::new(LOG_FILE));
    let settings = settings::load(args.settings.as_deref())?;

    // Single-threaded so the per-thread run label follows the pipeline.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let summary = runtime.block_on(app::run(&args, settings))?;
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("run {}: {:?}", summary.run_id, summary.status);
    if !summary.failed_stages.is_empty() {
        println!("failed stages: {}", summary.failed_stages.join(", "));
    }
    if let Some(stage) = &summary.halted_at {
        println!("halted at {stage}");
    }
    if let Some(stage) = &summary.paused_at {
        println!("paused at {stage}");
    }
}
