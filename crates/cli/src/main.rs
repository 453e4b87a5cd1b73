//! Recall CLI entry point.
//!
//! Commands:
//! - `estimate`     Estimate tokens for text
//! - `truncate`     Truncate text to a token budget
//! - `pack`         Pack prompt components into the context budget
//! - `plan`         Plan retention for a conversation
//! - `decay`        Evaluate a decaying value
//! - `init-config`  Write a default config file
//! - `show-config`  Print the effective configuration

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use recall_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall: bounded context engine for conversational agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to ~/.recall/config.toml)
    #[arg(short, long, global = true, env = "RECALL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate tokens for text (argument, --file, or stdin)
    Estimate {
        text: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Truncate text to roughly N tokens
    Truncate {
        /// Token budget
        #[arg(short, long)]
        max: usize,
        text: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Pack a JSON array of components into the context budget
    Pack {
        /// JSON file with `[{"name", "priority", "content", ...}]`
        file: PathBuf,
        /// Override context.in_max
        #[arg(long)]
        in_max: Option<usize>,
        /// Override context.reserve_out
        #[arg(long)]
        reserve_out: Option<f64>,
        /// Print the full pack result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan retention for a JSON array of messages
    Plan {
        /// JSON file with `[{"role", "content", "created_at"?}]`
        file: PathBuf,
        /// Override retention.max_messages
        #[arg(short, long)]
        max_messages: Option<usize>,
        /// Report whether the kept messages fit this many tokens
        #[arg(short, long)]
        budget: Option<usize>,
        /// Never call the inference provider
        #[arg(long)]
        offline: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate exponential decay of a stored value
    Decay {
        /// Value when it was set
        #[arg(long)]
        value: f64,
        /// Hours since the value was set
        #[arg(long)]
        elapsed_hours: f64,
        /// Explicit half-life in hours (overrides --class)
        #[arg(long)]
        half_life_hours: Option<f64>,
        /// Value class whose configured half-life applies
        #[arg(long, value_enum, default_value_t = DecayClass::Belief)]
        class: DecayClass,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (API key redacted)
    ShowConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecayClass {
    Belief,
    Mood,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    match cli.command {
        Commands::Estimate { text, file } => commands::text::estimate(text, file)?,
        Commands::Truncate { max, text, file } => commands::text::truncate(max, text, file)?,
        Commands::Pack {
            file,
            in_max,
            reserve_out,
            json,
        } => {
            let config = AppConfig::load_with_env(&config_path)?;
            commands::pack::run(&config, &file, in_max, reserve_out, json)?
        }
        Commands::Plan {
            file,
            max_messages,
            budget,
            offline,
            json,
        } => {
            let config = AppConfig::load_with_env(&config_path)?;
            commands::plan::run(&config, &file, max_messages, budget, offline, json).await?
        }
        Commands::Decay {
            value,
            elapsed_hours,
            half_life_hours,
            class,
        } => {
            let config = AppConfig::load_with_env(&config_path)?;
            let class = match class {
                DecayClass::Belief => recall_core::ValueClass::BeliefConfidence,
                DecayClass::Mood => recall_core::ValueClass::MoodIntensity,
            };
            commands::decay::run(&config, value, elapsed_hours, half_life_hours, class)
        }
        Commands::InitConfig { force } => commands::config_cmd::init(&config_path, force)?,
        Commands::ShowConfig => commands::config_cmd::show(&config_path)?,
    }

    Ok(())
}
