mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codelab-cli")]
#[command(about = "Codelab CLI - Run and submit solutions against the execution service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a solution against the sample cases plus optional custom cases
    Run {
        /// Problem JSON file
        #[arg(short, long)]
        problem: PathBuf,

        /// Language (e.g., python, cpp, js)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Source file to evaluate
        #[arg(short, long)]
        source: PathBuf,

        /// JSON file with an array of custom cases
        #[arg(short, long)]
        custom: Option<PathBuf>,
    },

    /// Submit a solution against the full graded suite
    Submit {
        /// Problem JSON file
        #[arg(short, long)]
        problem: PathBuf,

        /// Language (e.g., python, cpp, js)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Source file to evaluate
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Print the assistant context for a problem and source file
    Snapshot {
        /// Problem JSON file
        #[arg(short, long)]
        problem: PathBuf,

        /// Language (e.g., python, cpp, js)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Source file (starter template when omitted)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// Fetch starter templates from the execution service
    Templates,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            problem,
            language,
            source,
            custom,
        } => {
            commands::run(&problem, &language, &source, custom.as_deref()).await?;
        }
        Commands::Submit {
            problem,
            language,
            source,
        } => {
            commands::submit(&problem, &language, &source).await?;
        }
        Commands::Snapshot {
            problem,
            language,
            source,
        } => {
            commands::snapshot(&problem, &language, source.as_deref()).await?;
        }
        Commands::Templates => {
            commands::templates().await?;
        }
    }

    Ok(())
}
