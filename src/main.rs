//! # lexassist CLI
//!
//! ## Usage
//!
//! ```bash
//! lexassist --config ./config/lexassist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexassist init` | Create the SQLite index database and run migrations |
//! | `lexassist index build` | Scan the corpus, chunk and embed it |
//! | `lexassist index sources` | List indexed sources |
//! | `lexassist predict "<clause>"` | Risk label for one clause |
//! | `lexassist summarize <file>` | Summarize a text, PDF or DOCX file |
//! | `lexassist search "<query>"` | Top-k passages from the index |
//! | `lexassist advice "<situation>"` | Case-grounded advice |
//! | `lexassist compare "<query>"` | Compare two retrieved law sections |
//! | `lexassist news` | Legal news for a location |
//! | `lexassist laws "<query>"` | Search the statute site |
//! | `lexassist will "<details>"` | Draft a will |
//! | `lexassist lawyers` | Filter the lawyer directory |
//! | `lexassist serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexassist::commands::{self, NewsArgs};
use lexassist::lawyers::LawyerFilters;
use lexassist::{config, index, migrate, server};

/// Legal document helpers: clause risk, summaries, case-law retrieval and advice.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lexassist.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "lexassist", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexassist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again leaves existing data in place.
    Init,

    /// Build or inspect the case-law index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Classify the risk level of a single clause.
    Predict {
        clause: String,
    },

    /// Summarize a document (text, markdown, PDF or DOCX).
    Summarize {
        file: PathBuf,
    },

    /// Retrieve the passages most similar to a query.
    Search {
        query: String,

        /// Number of passages to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Advice for a situation, grounded in similar cases.
    Advice {
        situation: String,

        /// Number of cases to retrieve (1-10).
        #[arg(long, default_value_t = 5)]
        cases: usize,
    },

    /// Explain how the law changed between the two closest sections.
    Compare {
        query: String,
    },

    /// Fetch legal news for a location.
    News {
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },

    /// Search the statute site and scrape matching acts.
    Laws {
        query: String,

        /// Maximum number of documents to scrape.
        #[arg(long, default_value_t = 5)]
        max: usize,
    },

    /// Draft a will from a free-text description.
    Will {
        input: String,

        /// Write the will to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Find lawyers by filters and an optional description query.
    Lawyers {
        query: Option<String>,

        #[arg(long = "city")]
        cities: Vec<String>,

        #[arg(long = "specialization")]
        specializations: Vec<String>,

        #[arg(long = "language")]
        languages: Vec<String>,

        #[arg(long, default_value_t = 4.0)]
        min_rating: f32,

        #[arg(long, default_value_t = 50)]
        min_reviews: u32,

        #[arg(long, default_value_t = 5)]
        min_experience: u32,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Scan the corpus and bring the index up to date.
    Build {
        /// Re-chunk and re-embed every document, even unchanged ones.
        #[arg(long)]
        full: bool,
    },
    /// List indexed sources with chunk and embedding counts.
    Sources,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { action } => match action {
            IndexAction::Build { full } => index::run_index_build(&cfg, full).await?,
            IndexAction::Sources => index::run_index_sources(&cfg).await?,
        },
        Commands::Predict { clause } => commands::run_predict(&cfg, &clause).await?,
        Commands::Summarize { file } => commands::run_summarize(&cfg, &file).await?,
        Commands::Search { query, k } => commands::run_search(&cfg, &query, k).await?,
        Commands::Advice { situation, cases } => {
            commands::run_advice(&cfg, &situation, cases).await?
        }
        Commands::Compare { query } => commands::run_compare(&cfg, &query).await?,
        Commands::News {
            page,
            page_size,
            city,
            state,
            country,
        } => {
            commands::run_news(
                &cfg,
                NewsArgs {
                    page,
                    page_size,
                    city,
                    state,
                    country,
                },
            )
            .await?
        }
        Commands::Laws { query, max } => commands::run_laws(&cfg, &query, max).await?,
        Commands::Will { input, output } => {
            commands::run_will(&cfg, &input, output.as_deref()).await?
        }
        Commands::Lawyers {
            query,
            cities,
            specializations,
            languages,
            min_rating,
            min_reviews,
            min_experience,
        } => {
            let filters = LawyerFilters {
                cities,
                specializations,
                languages,
                min_rating,
                min_reviews,
                min_experience,
                query,
            };
            commands::run_lawyers(&cfg, filters).await?
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
