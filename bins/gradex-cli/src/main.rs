mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gradex-cli")]
#[command(about = "Gradex CLI - Grade code submissions against test cases and conditions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a submission described by a JSON job file
    Grade {
        /// Path to the job file ({code, language, test_cases, ...})
        #[arg(short, long)]
        job: String,

        /// Points awarded for a fully passing run
        #[arg(long)]
        max_points: Option<f64>,

        /// Point budget distributed across conditions
        #[arg(long)]
        condition_points: Option<f64>,

        /// Per-test-case wall clock limit in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Per-process address space limit in MiB
        #[arg(long)]
        memory_limit_mb: Option<u64>,
    },

    /// List the languages the engine can grade
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grade {
            job,
            max_points,
            condition_points,
            timeout_ms,
            memory_limit_mb,
        } => {
            commands::grade(
                &job,
                max_points,
                condition_points,
                timeout_ms,
                memory_limit_mb,
            )
            .await?;
        }
        Commands::Languages => {
            commands::list_languages();
        }
    }

    Ok(())
}
