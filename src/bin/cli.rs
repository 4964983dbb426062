use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use tourdesk::cli::{delete_tours, import_tours_file, issue_token, reconcile_ratings};
use tourdesk::state::{AppState, init_app_state};
use tourdesk_auth::Role;
use tourdesk_config::{AppConfig, StorageBackend};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tourdesk-cli")]
#[command(about = "Tourdesk CLI - Administrative tools for the Tourdesk API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import tours from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Delete every tour
    Delete,
    /// Recompute the rating summary of every tour
    ReconcileRatings,
    /// Mint a bearer token for local testing
    IssueToken {
        user_id: Uuid,
        /// One of: user, guide, lead-guide, admin
        role: Role,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn postgres_state(config: &AppConfig) -> anyhow::Result<AppState> {
    if config.storage.backend != StorageBackend::Postgres {
        anyhow::bail!("tourdesk-cli requires STORAGE_BACKEND=postgres");
    }
    init_app_state(config).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Import { file } => {
            let state = postgres_state(&config).await?;
            let imported = import_tours_file(&state, &file).await?;
            println!("✅ Imported {imported} tours");
        }
        Commands::Delete => {
            let state = postgres_state(&config).await?;
            let deleted = delete_tours(&state).await?;
            println!("✅ Deleted {deleted} tours");
        }
        Commands::ReconcileRatings => {
            let state = postgres_state(&config).await?;
            let tours = reconcile_ratings(&state).await?;
            println!("✅ Reconciled ratings of {tours} tours");
        }
        Commands::IssueToken { user_id, role } => {
            println!("{}", issue_token(user_id, role, &config.jwt)?);
        }
    }

    Ok(())
}
