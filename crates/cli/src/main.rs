//! citenet CLI
//!
//! Usage:
//!   citenet tree <identifier> [--uri] [--max-depth N] [--memoize]
//!   citenet batch <doi>... [--file path] [--retry-rounds N]
//!
//! Both commands print JSON to stdout; logs go to stderr.

use anyhow::Context;
use citenet_common::config::{AppConfig, ObservabilityConfig};
use citenet_common::http::{NetworkClient, ReqwestClient};
use citenet_common::{metrics, IdKind, VERSION};
use citenet_fetch::FetchEngine;
use citenet_graph::{ApiDataSource, GraphBuilder};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "citenet", version, about = "Citation network builder")]
struct Cli {
    /// Configuration file (defaults to config/default + APP__ environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand one paper into a citation network
    Tree {
        /// DOI, or database uri with --uri
        identifier: String,
        /// Treat the identifier as a database uri
        #[arg(long)]
        uri: bool,
        /// Reference hops to follow
        #[arg(long)]
        max_depth: Option<u32>,
        /// Skip re-expanding papers already expanded
        #[arg(long)]
        memoize: bool,
    },
    /// Resolve a batch of DOIs through the XML parsing endpoint
    Batch {
        /// DOIs to resolve
        dois: Vec<String>,
        /// File with one DOI per line
        #[arg(long)]
        file: Option<PathBuf>,
        /// Retry rounds after the first pass
        #[arg(long)]
        retry_rounds: Option<u32>,
        /// Leave payloads out of the output
        #[arg(long)]
        summary: bool,
    },
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_dois(mut dois: Vec<String>, file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        dois.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(dois)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    init_tracing(&config.observability);
    metrics::register_metrics();
    tracing::info!("Starting citenet v{}", VERSION);

    match cli.command {
        Commands::Tree {
            identifier,
            uri,
            max_depth,
            memoize,
        } => {
            if let Some(max_depth) = max_depth {
                config.graph.max_depth = max_depth;
            }
            config.graph.memoize |= memoize;

            let client: Arc<dyn NetworkClient> = Arc::new(ReqwestClient::new(config.datasource.timeout())?);
            let source = Arc::new(ApiDataSource::new(client, &config.datasource));
            let builder = GraphBuilder::new(source, config.graph.clone());

            let kind = if uri { IdKind::Uri } else { IdKind::Doi };
            let graph = builder.build(&identifier, kind).await?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Commands::Batch {
            dois,
            file,
            retry_rounds,
            summary,
        } => {
            if let Some(rounds) = retry_rounds {
                config.fetch.retry_rounds = rounds;
            }
            let dois = read_dois(dois, file)?;
            anyhow::ensure!(!dois.is_empty(), "no DOIs given");

            let client: Arc<dyn NetworkClient> = Arc::new(ReqwestClient::new(config.fetch.timeout())?);
            let engine = FetchEngine::new(client, config.fetch.clone())?;

            let mut items = engine.resolve_batch(dois.as_slice()).await;
            if summary {
                for item in &mut items {
                    item.payload = None;
                }
            }
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
