//! # grant-match CLI (`grantmatch`)
//!
//! ## Usage
//!
//! ```bash
//! grantmatch --config ./config/grantmatch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grantmatch init` | Create the SQLite database and schema |
//! | `grantmatch ingest <path>` | Summarize, store, and index a grant document |
//! | `grantmatch ingest --url <url>` | Same, for a grant web page |
//! | `grantmatch match --company <file> --goal <text>` | Rank grants for a company |
//! | `grantmatch ask <grant_id> <question>` | Answer a question about one grant |
//! | `grantmatch grants [--issuer <issuer>]` | List stored grants, newest first |
//! | `grantmatch matches <company_id>` | List stored match records |
//! | `grantmatch serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `grant_match=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grant_match::{commands, config, migrate, server};

/// grant-match: ingest funding opportunities and rank them for SMEs.
#[derive(Parser)]
#[command(
    name = "grantmatch",
    about = "Grant ingestion and SME-to-grant match scoring",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/grantmatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest one grant document (PDF, DOCX, HTML, text, or markdown) or web page.
    Ingest {
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        path: Option<PathBuf>,

        /// Fetch and ingest an http(s) grant page instead of a file.
        #[arg(long)]
        url: Option<String>,

        /// Content type override. Guessed from the file extension otherwise.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Rank grants for a company profile and free-text goals.
    Match {
        /// Path to the company profile JSON.
        #[arg(long)]
        company: PathBuf,

        /// The company's goals, in plain language.
        #[arg(long, default_value = "")]
        goal: String,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question about one stored grant.
    Ask { grant_id: String, question: String },

    /// List stored grants, newest first.
    Grants {
        /// Only grants from this issuer.
        #[arg(long)]
        issuer: Option<String>,
    },

    /// List stored match records for a company.
    Matches { company_id: String },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grant_match=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            url,
            content_type,
        } => match (path, url) {
            (_, Some(url)) => commands::run_ingest_url(&cfg, &url).await?,
            (Some(path), None) => {
                commands::run_ingest(&cfg, &path, content_type.as_deref()).await?
            }
            (None, None) => anyhow::bail!("either <PATH> or --url is required"),
        },
        Commands::Match {
            company,
            goal,
            json,
        } => {
            commands::run_match_command(&cfg, &company, &goal, json).await?;
        }
        Commands::Ask { grant_id, question } => {
            commands::run_ask(&cfg, &grant_id, &question).await?;
        }
        Commands::Grants { issuer } => {
            commands::run_list_grants(&cfg, issuer.as_deref()).await?;
        }
        Commands::Matches { company_id } => {
            commands::run_list_matches(&cfg, &company_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
