//! Vigil CLI - LLM prompt injection scanner

mod serve;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vigil_core::{Vigil, VigilConfig};
use vigil_registry::DetectorRegistry;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - LLM prompt injection scanner", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "VIGIL_CONFIG", default_value = "vigil.toml")]
    config: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and build every listed detector
    Check,
    /// List the registered detectors and what they require
    Detectors,
    /// Scan one prompt, or a prompt/response pair
    Scan {
        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Model response; selects the output detectors
        #[arg(short, long)]
        response: Option<String>,
    },
    /// Answer JSON requests read line by line from stdin
    Serve,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Some(Commands::Check) => {
            let vigil = load(&cli.config)?;
            println!("Configuration OK: {}", cli.config.display());
            println!("  input:  {:?}", vigil.input_detectors());
            println!("  output: {:?}", vigil.output_detectors());
            println!(
                "  cache:  {}",
                if vigil.config().main.use_cache {
                    format!("on ({} entries)", vigil.config().main.cache_max)
                } else {
                    "off".to_string()
                }
            );
        }
        Some(Commands::Detectors) => {
            let registry = DetectorRegistry::with_builtins();
            for name in registry.names() {
                let requires = registry
                    .descriptor(name)
                    .map(|d| {
                        d.capabilities()
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                println!("{:<12} requires: {}", name, requires);
            }
        }
        Some(Commands::Scan { prompt, response }) => {
            let vigil = load(&cli.config)?;
            let report = match response {
                Some(response) => vigil.scan_output(&prompt, &response),
                None => vigil.scan_input(&prompt),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to encode report")?
            );
        }
        Some(Commands::Serve) => {
            let vigil = load(&cli.config)?;
            let stdin = io::stdin();
            serve::run(&vigil, stdin.lock(), io::stdout().lock())?;
        }
        None => {
            println!("Vigil v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Vigil> {
    let config = VigilConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Vigil::from_config(config).context("failed to initialize scanners")
}
