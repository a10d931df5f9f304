//! List Pages CLI
//!
//! Runs list configurations from a site fixture against the in-memory
//! backends and prints the result, the compiled SQL or the list sources.
//!
//! Usage:
//!   list-pages run --fixture site.yml --list articles --query 'f[0]=tags:1'

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use list_pages::config::EngineConfig;
use list_pages::entity::EntityLookup;
use list_pages::fixture::{SiteFixture, SiteServices};
use list_pages::index::sql::SqlQueryCompiler;
use list_pages::list::{ListBuilder, ListPageConfiguration, ListRequest, SortOption};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a list and print the build as JSON.
    Run(ListArgs),

    /// Print the PostgreSQL a list's query compiles to.
    Sql {
        #[command(flatten)]
        list: ListArgs,

        /// Print the count query instead.
        #[arg(long)]
        count: bool,
    },

    /// Print the available list sources and their sort options.
    Sources {
        /// Site fixture (JSON or YAML).
        #[arg(long)]
        fixture: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Site fixture (JSON or YAML).
    #[arg(long)]
    fixture: PathBuf,

    /// Name of a list configuration in the fixture.
    #[arg(long)]
    list: String,

    /// Query string carrying facet filters.
    #[arg(long, default_value = "")]
    query: String,

    /// Zero-based page.
    #[arg(long, default_value = "0")]
    page: usize,

    /// Language of results and labels.
    #[arg(long)]
    langcode: Option<String>,

    /// Current entity as `entity_type:id`, for contextual filters.
    #[arg(long)]
    current: Option<String>,
}

#[derive(Serialize)]
struct SourceSummary {
    entity_type: String,
    bundle: String,
    index_id: String,
    facet_source_id: String,
    sort_options: Vec<SortOption>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Run(args) => {
            let services = load(&args.fixture, config)?;
            let (configuration, request) = list_request(&services, &args)?;
            let Some(execution) = services.manager.execute_list(&configuration, &request)? else {
                info!(list = %args.list, "nothing to render");
                println!("null");
                return Ok(());
            };
            let build = ListBuilder::new(&services.manager).build(&execution);
            println!("{}", serde_json::to_string_pretty(&build)?);
        }
        Command::Sql { list, count } => {
            let services = load(&list.fixture, config)?;
            let (configuration, request) = list_request(&services, &list)?;
            let Some(query) = services.manager.build_query(&configuration, &request)? else {
                info!(list = %list.list, "nothing to render");
                return Ok(());
            };
            let index = services
                .manager
                .index_client()
                .index(&query.index_id)
                .with_context(|| format!("index '{}' not found", query.index_id))?;
            let compiler = SqlQueryCompiler::new(&index, &query);
            let sql = if count { compiler.build_count() } else { compiler.build() };
            println!("{sql}");
        }
        Command::Sources { fixture } => {
            let services = load(&fixture, config)?;
            let summaries: Vec<SourceSummary> = services
                .manager
                .list_sources()
                .into_iter()
                .map(|source| SourceSummary {
                    sort_options: services.manager.sort_options(&source),
                    entity_type: source.entity_type,
                    bundle: source.bundle,
                    index_id: source.index_id,
                    facet_source_id: source.facet_source_id,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}

fn load(path: &Path, config: EngineConfig) -> Result<SiteServices> {
    let fixture = SiteFixture::from_path(path)?;
    fixture.into_services(config)
}

fn list_request(
    services: &SiteServices,
    args: &ListArgs,
) -> Result<(ListPageConfiguration, ListRequest)> {
    let configuration = services
        .lists
        .get(&args.list)
        .cloned()
        .with_context(|| format!("list '{}' not found in fixture", args.list))?;

    let mut request = ListRequest::new()
        .with_query_string(args.query.as_str())
        .with_page(args.page);
    if let Some(langcode) = &args.langcode {
        request = request.with_langcode(langcode.as_str());
    }
    if let Some(current) = &args.current {
        let (entity_type, id) = current
            .split_once(':')
            .with_context(|| format!("--current must be entity_type:id, got '{current}'"))?;
        let entity = services
            .entities
            .load(entity_type, id)
            .with_context(|| format!("current entity {current} not found"))?;
        request = request.with_current_entity(entity);
    }
    Ok((configuration, request))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
