//! Component wiring shared by the worker daemon and the operator CLI

use crate::backlog::{create_backlog, BacklogHook, BacklogStore};
use crate::catalog::{CatalogSnapshot, InMemoryCatalog};
use crate::config::{Config, ObservabilityConfig};
use crate::error::Result;
use crate::search::{
    create_index_client, index_settings, product_mapping, CatalogDocumentSource, IndexClient,
    ProductSearchService, PRODUCT_DOC_TYPE,
};
use crate::sync::BatchSynchronizer;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env filter and plain or JSON output on stderr
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("webshop_search={}", config.log_level).into());

    let json = config.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let plain = (!config.json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

/// Fully wired set of components
pub struct App {
    pub config: Config,
    pub backlog: Arc<dyn BacklogStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub client: Arc<dyn IndexClient>,
    pub synchronizer: Arc<BatchSynchronizer>,
    pub search: ProductSearchService,
}

impl App {
    /// Build every component from configuration.
    ///
    /// With `track_snapshot`, products of the configured catalog snapshot are
    /// queued for indexing as they are imported.
    pub async fn build(config: Config, track_snapshot: bool) -> Result<Self> {
        tracing::info!(
            backlog = ?config.backlog.backend,
            engine = %config.search.engine,
            "Building components"
        );

        let backlog = create_backlog(&config.backlog)?;
        let client = create_index_client(&config.search).await?;

        let catalog = Arc::new(InMemoryCatalog::new());
        let hook = Arc::new(BacklogHook::new(backlog.clone()));
        if track_snapshot {
            catalog.subscribe(hook.clone());
        }
        if let Some(path) = &config.catalog.snapshot_path {
            let json = tokio::fs::read_to_string(path).await?;
            catalog.import(CatalogSnapshot::from_json(&json)?).await?;
        }
        if !track_snapshot {
            catalog.subscribe(hook);
        }

        let synchronizer = Arc::new(BatchSynchronizer::new(
            backlog.clone(),
            Arc::new(CatalogDocumentSource::new(catalog.clone())),
            client.clone(),
            config.sync.batch_size,
        ));
        let search = ProductSearchService::new(client.clone(), catalog.clone(), config.search.clone());

        Ok(Self {
            config,
            backlog,
            catalog,
            client,
            synchronizer,
            search,
        })
    }

    /// Declare analysis settings and the product mapping.
    ///
    /// A rejected declaration affects all later indexing, so it is returned
    /// as an error rather than retried.
    pub async fn declare_index(&self) -> Result<()> {
        if let Err(e) = self.client.update_settings(PRODUCT_DOC_TYPE, &index_settings()).await {
            tracing::error!(doc_type = PRODUCT_DOC_TYPE, error = %e, "Index settings rejected");
            return Err(e.into());
        }
        if let Err(e) = self.client.update_mapping(PRODUCT_DOC_TYPE, &product_mapping()).await {
            tracing::error!(doc_type = PRODUCT_DOC_TYPE, error = %e, "Index mapping rejected");
            return Err(e.into());
        }
        tracing::info!(doc_type = PRODUCT_DOC_TYPE, "Index settings and mapping declared");
        Ok(())
    }
}
