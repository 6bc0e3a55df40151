use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webshop_search::{
    app::App,
    backlog::EntityRef,
    config::Config,
    search::{QuickSearchOutcome, SearchParams},
};

#[derive(Parser)]
#[command(name = "webshop-search-cli")]
#[command(about = "Webshop search operator CLI", long_about = None)]
struct Cli {
    /// Configuration file (overrides CONFIG_PATH)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// JSON catalog snapshot to load into the primary store
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the backlog into the search index once
    Sync,

    /// Print the number of pending backlog entries
    BacklogCount,

    /// Queue products for re-indexing
    Enqueue {
        #[arg(value_name = "PRODUCT_ID", required = true)]
        ids: Vec<i64>,
    },

    /// Declare index settings and the product mapping
    UpdateMapping,

    /// Run a storefront search
    Search {
        /// Search phrase
        #[arg(default_value = "")]
        phrase: String,

        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Attribute filter as key=value; repeat for several values
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    /// Suggest product names for a phrase
    Autocomplete {
        phrase: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        std::env::set_var("CONFIG_PATH", path);
    }

    let mut config = Config::load().context("failed to load configuration")?;
    if cli.catalog.is_some() {
        config.catalog.snapshot_path = cli.catalog.clone();
    }
    webshop_search::app::init_tracing(&config.observability);

    let track_snapshot = matches!(cli.command, Commands::Sync);
    let app = App::build(config, track_snapshot).await?;

    match cli.command {
        Commands::Sync => {
            app.declare_index().await?;
            let report = app.synchronizer.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::BacklogCount => {
            println!("{}", app.backlog.count().await?);
        }

        Commands::Enqueue { ids } => {
            let entities: Vec<EntityRef> = ids.into_iter().map(EntityRef::product).collect();
            let added = app.backlog.enqueue(&entities).await?;
            println!("{} queued, {} already pending", added, entities.len() - added);
        }

        Commands::UpdateMapping => {
            app.declare_index().await?;
            println!("Index settings and mapping declared");
        }

        Commands::Search {
            phrase,
            page,
            filters,
        } => {
            let mut pairs = vec![("q".to_string(), phrase), ("page".to_string(), page.to_string())];
            for filter in filters {
                let Some((key, value)) = filter.split_once('=') else {
                    bail!("filter '{}' is not in KEY=VALUE form", filter);
                };
                pairs.push((key.to_string(), value.to_string()));
            }

            let outcome = app.search.quick_search(&SearchParams::from_query_pairs(pairs)).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if let QuickSearchOutcome::Unavailable { .. } = outcome {
                std::process::exit(2);
            }
        }

        Commands::Autocomplete { phrase, limit } => {
            let items = app.search.autocomplete(&phrase, limit).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
