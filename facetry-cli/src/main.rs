use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use facetry::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "facetry")]
#[command(about = "Facetry CLI - schema resolution and facet counting tools")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "FACETRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check schema files for problems
    Lint {
        /// Schema file or directory of YAML schemas
        path: PathBuf,
    },

    /// Show the plan a field name resolves to
    Resolve {
        /// Schema YAML file
        #[arg(short, long)]
        schema: PathBuf,

        /// Concrete field name
        field: String,

        /// Generic (template) field name
        #[arg(short, long)]
        generic: Option<String>,

        /// Sample JSON value used for type inference
        #[arg(long)]
        sample: Option<String>,
    },

    /// Index JSONL documents and print facet counts
    Facets {
        /// Schema YAML file
        #[arg(short, long)]
        schema: PathBuf,

        /// Documents, one JSON object per line
        #[arg(short, long)]
        docs: PathBuf,

        /// Facet requests as a JSON object keyed by dimension
        #[arg(short, long)]
        request: PathBuf,

        /// Base query as a JSON predicate; defaults to all documents
        #[arg(short, long)]
        query: Option<String>,

        #[arg(long, value_enum, default_value = "memory")]
        backend: Backend,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Tantivy,
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
    );
    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_logging(&config)?;

    match cli.command {
        Commands::Lint { path } => commands::run_lint(&path),
        Commands::Resolve {
            schema,
            field,
            generic,
            sample,
        } => commands::run_resolve(
            &config,
            &schema,
            generic.as_deref(),
            &field,
            sample.as_deref(),
        ),
        Commands::Facets {
            schema,
            docs,
            request,
            query,
            backend,
        } => commands::run_facets(
            &config,
            &schema,
            &docs,
            &request,
            query.as_deref(),
            backend,
        ),
    }
}
