//! chanfilt: run per-channel correction filter pipelines over readout data.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_chanfilt::{ChannelFilter, FilterPipeline, FilterStage, STAGE_TYPES};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chanfilt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job file through its filter pipeline
    Run {
        /// Path to the job file (TOML or JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Print the default configuration of filter stages
    Defaults {
        /// Only this stage type
        stage: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Run { job, output } => {
            run_job(&job, &output, cli.format)?;
        }
        Commands::Defaults { stage } => {
            print_defaults(stage.as_deref(), cli.format)?;
        }
    }

    Ok(())
}

fn run_job(job_path: &Path, output_dir: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading job from {:?}", job_path);

    let job = config::load_job(job_path)?;
    let pipeline = FilterPipeline::from_specs(&job.stages, &job.components())
        .context("Failed to configure filter pipeline")?;

    tracing::info!(
        "Running {} stages over {} channels",
        pipeline.len(),
        job.channels.len()
    );
    let mut signals = job.signals();
    let report = pipeline.run(&mut signals);

    let results = output::RunResults {
        name: job.name.clone(),
        stages: pipeline.stages().iter().map(|s| s.name()).collect(),
        signals,
        report,
    };

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    output::write_results(&results, output_dir, format)?;
    output::print_results(&results);

    tracing::info!("Job complete. Results written to {:?}", output_dir);
    Ok(())
}

fn print_defaults(stage: Option<&str>, format: OutputFormat) -> Result<()> {
    let kinds: Vec<&str> = match stage {
        Some(kind) => vec![kind],
        None => STAGE_TYPES.to_vec(),
    };

    let mut defaults = serde_json::Map::new();
    for kind in kinds {
        let stage = FilterStage::from_type(kind)?;
        defaults.insert(kind.to_string(), stage.default_configuration());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&defaults)?);
        }
        OutputFormat::Text | OutputFormat::Csv => {
            for (kind, cfg) in &defaults {
                println!("[{}]", kind);
                if let Some(fields) = cfg.as_object() {
                    for (key, value) in fields {
                        println!("  {} = {}", key, value);
                    }
                }
                println!();
            }
        }
    }

    Ok(())
}
