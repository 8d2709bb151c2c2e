//! # Product Search CLI (`psearch`)
//!
//! ## Usage
//!
//! ```bash
//! psearch --config ./config/psearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psearch serve` | Start the HTTP search server |
//! | `psearch search "<query>"` | Run one search and print the JSON response |
//! | `psearch vocab` | List categories and brand counts |
//! | `psearch vocab --category "<c>"` | List the brands of one category |
//!
//! Credentials are read from the environment (a `.env` file in the working
//! directory is loaded first): `OPENAI_API_KEY`, plus `ASTRA_DB_CLIENT_ID`
//! and `ASTRA_DB_CLIENT_SECRET` when the Astra index is used.

use anyhow::Context;
use clap::{Parser, Subcommand};
use product_search::{config, logging, search, server, vocab};
use std::path::PathBuf;

/// Natural-language product search over a vector index.
#[derive(Parser)]
#[command(
    name = "psearch",
    about = "Natural-language product search: LLM query understanding over a filtered vector index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/psearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP search server.
    ///
    /// Loads the vocabulary, checks credentials, connects the model and
    /// index clients, and binds to `[server].bind`.
    Serve,

    /// Run a single search and print the response as JSON.
    Search {
        /// Free-text customer query, in any language.
        query: String,
    },

    /// Inspect the category and brand vocabulary.
    Vocab {
        /// Show the brands for this canonical category instead of the table.
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; the variables may come from the real environment.
    dotenvy::dotenv().ok();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.log);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg)
                .await
                .context("search server failed")?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Vocab { category } => {
            vocab::list_vocabulary(&cfg, category.as_deref())?;
        }
    }

    Ok(())
}
