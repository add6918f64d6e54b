// src/main.rs
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use move_inventory::api::{self, ApiState};
use move_inventory::autobox::AutoBoxConfig;
use move_inventory::catalog::Catalog;
use move_inventory::config::AppConfig;
use move_inventory::inventory::InventoryContext;
use move_inventory::store::{InventoryStore, JsonFileStore, MemoryStore};
use move_inventory::tags::TagRules;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("move_inventory=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();

    let catalog = match app_config.catalog.path() {
        Some(path) => match Catalog::from_json_file(path) {
            Ok(catalog) => {
                tracing::info!(path = %path.display(), items = catalog.items().len(), "catalog loaded");
                catalog
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "could not load catalog");
                std::process::exit(1);
            }
        },
        None => Catalog::builtin(),
    };

    let store: Arc<dyn InventoryStore> = match app_config.store.data_dir() {
        Some(dir) => Arc::new(JsonFileStore::new(dir.clone())),
        None => Arc::new(MemoryStore::new()),
    };
    tracing::info!(backend = store.backend_name(), "inventory store ready");

    let engine: AutoBoxConfig = app_config.autobox.engine_config();
    let ctx = InventoryContext::new(catalog, TagRules::standard(), engine);
    let state = ApiState::new(ctx, store, app_config.autobox.enabled());

    tracing::info!("inventory service starting");
    if let Err(err) = api::start_api_server(app_config.api.clone(), state).await {
        tracing::error!(error = %err, "API server terminated with an error");
        std::process::exit(1);
    }
}
