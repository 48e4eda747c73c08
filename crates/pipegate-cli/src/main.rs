//! PipeGate CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pipegate")]
#[command(about = "PipeGate pipeline access CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a gate configuration and print the effective state policy
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "pipegate.kdl")]
        path: String,
    },
    /// Resolve a repository and evaluate the state policy for a permission
    CheckState {
        /// Repository path (org/repo) or id
        repo_ref: String,
        /// Permission to evaluate (view, edit, delete, execute)
        #[arg(long)]
        permission: String,
        /// Accept this repository state (repeatable); none means the policy default
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// Gate configuration file; built-in defaults when omitted
        #[arg(long)]
        config: Option<String>,
        /// PostgreSQL connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::CheckState {
            repo_ref,
            permission,
            allow,
            config,
            database_url,
            json,
        } => {
            let request = commands::CheckStateRequest {
                repo_ref,
                permission,
                allow,
                config,
                database_url,
                json,
            };
            commands::check_state(request).await?;
        }
    }

    Ok(())
}
