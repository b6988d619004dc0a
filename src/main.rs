use anyhow::Result;
use clap::{Parser, Subcommand};
use lifelens::{transport, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lifelens")]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), env!("LIFELENS_VERSION_SUFFIX")),
    about = "LifeLens AI - turn confusion into clarity",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat about documents, images and voice notes
    Chat {
        /// Initial message to send
        message: Option<String>,

        /// File to attach to the first message (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Model to use (e.g., gemini-2.5-flash, gemini-2.5-pro)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Explain a document or question once and print the answer
    Explain {
        /// What to ask about the attached files
        text: Option<String>,

        /// File to explain (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "lifelens=debug"
    } else {
        "lifelens=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(
        "lifelens {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("LIFELENS_GIT_HASH"),
        env!("LIFELENS_BUILD_TIME")
    );

    let (config, config_path) = match cli.config {
        Some(path) => (Config::load_from(&path)?, path),
        None => (Config::load()?, Config::config_path()?),
    };

    match cli.command {
        Commands::Chat {
            message,
            files,
            model,
        } => {
            transport::cli::run_chat(&config, message, files, model).await?;
        }
        Commands::Explain { text, files } => {
            transport::cli::run_explain(&config, text, files).await?;
        }
        Commands::Config { path } => {
            transport::cli::run_config(&config, &config_path, path)?;
        }
    }

    Ok(())
}
