use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantkit::models::{Overrides, RunConfig};
use quantkit::services::{format_table, format_text, run};

#[derive(Parser)]
#[command(name = "quantkit")]
#[command(about = "Quantize and dither synthetic test patterns")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a test pattern and report the result
    Run {
        /// YAML run configuration; built-in defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Quantizer: octree, median-cut, wu or a predefined palette name
        #[arg(short, long)]
        quantizer: Option<String>,

        /// Palette size of the optimizing quantizers
        #[arg(long)]
        colors: Option<usize>,

        /// Ditherer: a kernel name, bayer8x8, blue-noise, random-noise, ... or "none"
        #[arg(short, long)]
        ditherer: Option<String>,

        /// Worker threads, 0 for all cores
        #[arg(short, long)]
        threads: Option<usize>,

        /// Target pixel format (e.g. "8bppIndexed", "16bppRgb565")
        #[arg(short, long)]
        format: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Include an ASCII preview of the result
        #[arg(long)]
        preview: bool,
    },
    /// List the built-in pixel formats
    Formats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            config,
            quantizer,
            colors,
            ditherer,
            threads,
            format,
            json,
            preview,
        }) => {
            let overrides = Overrides {
                quantizer,
                colors,
                ditherer,
                threads,
                format,
            };
            run_command(config, &overrides, json, preview)
        }
        Some(Commands::Formats) => {
            print!("{}", format_table());
            Ok(())
        }
        None => {
            run_status_command();
            Ok(())
        }
    }
}

fn run_command(
    config_path: Option<PathBuf>,
    overrides: &Overrides,
    json: bool,
    preview: bool,
) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantkit=info,pixel_pipeline=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let mut config = match config_path {
        Some(path) => RunConfig::load(&path)?,
        None => RunConfig::default(),
    }
    .with_overrides(overrides);
    config.preview |= preview;

    let report = run(&config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_text(&report));
    }
    Ok(())
}

fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    println!("Quantkit v{VERSION}");
    println!("Quantize and dither synthetic test patterns\n");

    println!("Environment Variables:");
    println!(
        "  RUST_LOG = {}",
        std::env::var("RUST_LOG")
            .as_deref()
            .unwrap_or("quantkit=info,pixel_pipeline=warn (default)")
    );

    println!("\nCommands:");
    println!("  quantkit run      Convert a test pattern and report the result");
    println!("  quantkit formats  List the built-in pixel formats");
    println!("\nRun 'quantkit --help' for more information.");
}
