//! Stepwise CLI: run, schedule and inspect two-stage task workflows.
//!
//! Reuses the same core domain logic (stepwise-core) and server bootstrap
//! (stepwise-server) that the HTTP surface uses.

use clap::{Parser, Subcommand};
use stepwise_cli::commands;

/// Stepwise: scheduled producer/consumer task workflows
#[derive(Parser)]
#[command(name = "stepwise", version, about = "Stepwise: scheduled producer/consumer task workflows")]
pub struct Cli {
    /// Path to the workflow YAML file
    #[arg(long, short = 'c', env = "STEPWISE_CONFIG", default_value = "workflow.yaml", global = true)]
    config: String,

    /// Path to the SQLite execution archive
    #[arg(long, env = "STEPWISE_DB_PATH", default_value = "stepwise.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one execution now and archive it
    Run {
        /// Execution time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        at: Option<String>,
        /// Do not archive the execution
        #[arg(long)]
        no_archive: bool,
    },

    /// Run the schedule trigger until interrupted
    Schedule,

    /// Check the workflow file without running anything
    Validate,

    /// List archived executions, newest first
    History {
        /// Maximum number of executions to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print one archived execution as JSON
    Show {
        /// Execution ID
        id: String,
    },

    /// Start the HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3220)]
        port: u16,
        /// Also run the schedule trigger in the same process
        #[arg(long)]
        with_scheduler: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env if present (task URLs, usernames, tokens)
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stepwise_core=info,stepwise_server=info,stepwise_cli=info".into()
            }),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!("[CLI] Loaded environment from '{}'", path.display());
    }

    let result = match cli.command {
        Commands::Run { at, no_archive } => {
            commands::run::run(&cli.config, &cli.db, at.as_deref(), !no_archive).await
        }
        Commands::Schedule => commands::schedule::run(&cli.config, &cli.db).await,
        Commands::Validate => commands::validate::run(&cli.config),
        Commands::History { limit } => commands::history::list(&cli.db, limit).await,
        Commands::Show { id } => commands::history::show(&cli.db, &id).await,
        Commands::Server {
            host,
            port,
            with_scheduler,
        } => commands::server::run(&cli.config, &cli.db, host, port, with_scheduler).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
