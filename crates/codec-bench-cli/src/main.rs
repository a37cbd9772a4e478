//! codec-bench CLI - benchmark lossless image codecs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod dataset;
mod models;

/// Lossless image codec benchmark: bits per sub-pixel and throughput.
#[derive(Parser)]
#[command(name = "codec-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true, env = "CODEC_BENCH_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark models on a dataset
    Run {
        /// Images to measure per model
        #[arg(short = 'n', long, env = "CODEC_BENCH_IMAGES", default_value_t = 8)]
        images: usize,

        /// Comma-separated models to register, in order
        #[arg(
            short,
            long,
            env = "CODEC_BENCH_MODELS",
            value_delimiter = ',',
            default_value = "raw,png,png-fast"
        )]
        models: Vec<String>,

        /// `synthetic` or a directory of PNG files
        #[arg(short, long, env = "CODEC_BENCH_DATASET", default_value = "synthetic")]
        dataset: String,

        /// Directory holding the scratch artifact
        #[arg(long, env = "CODEC_BENCH_SCRATCH_DIR")]
        scratch_dir: Option<PathBuf>,

        /// Write SVG charts into this directory
        #[arg(long)]
        charts: Option<PathBuf>,

        /// Dump mismatch previews into this directory
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Warn once per model instead of once per run
        #[arg(long)]
        warn_per_model: bool,
    },

    /// List the built-in models
    Models,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            images,
            models,
            dataset,
            scratch_dir,
            charts,
            diagnostics,
            json,
            warn_per_model,
        } => commands::run::run(
            commands::run::RunArgs {
                images,
                models,
                dataset,
                scratch_dir,
                charts,
                diagnostics,
                json,
                warn_per_model,
            },
            cli.verbose,
        ),
        Commands::Models => {
            for name in models::MODEL_NAMES {
                println!("{name}");
            }
            Ok(())
        }
    }
}
