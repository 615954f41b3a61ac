//! Talkback CLI, the main entry point.
//!
//! Commands:
//! - `chat`     Interactive chat or single-message mode
//! - `models`   List the models this install may use
//! - `onboard`  Write a starter config
//! - `doctor`   Diagnose config, credentials and extraction tools

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "talkback",
    about = "Talkback: streaming chat with OpenAI-compatible models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Attach an image, PDF or video to the message
        #[arg(short, long)]
        attach: Option<std::path::PathBuf>,

        /// Model to use (must be in the configured allow-list)
        #[arg(long)]
        model: Option<String>,

        /// Translate every reply into this language code (e.g. "es")
        #[arg(long)]
        translate: Option<String>,
    },

    /// List allowed models
    Models {
        /// Also ask the provider which models it serves
        #[arg(long)]
        remote: bool,
    },

    /// Initialize configuration
    Onboard,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            attach,
            model,
            translate,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                message,
                attach,
                model,
                translate,
            })
            .await?
        }
        Commands::Models { remote } => commands::models::run(remote).await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
