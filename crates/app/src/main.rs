mod admin;
mod columns;
mod importer;
mod meta;
mod problem;
mod router;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use tracing::info;

use domain_catalog_core::types::FieldSet;
use domain_catalog_storage::Database;
use domain_catalog_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let storage = Database::connect(&config.database_url).await?;
    storage.run_migrations().await?;

    let fields = match &config.catalog_fields {
        Some(raw) => FieldSet::parse_list(raw),
        None => FieldSet::default(),
    };
    let admin_token: Arc<[u8]> = Arc::from(config.admin_token.clone().into_bytes().into_boxed_slice());

    let state = router::AppState::new(metrics, storage, fields, admin_token);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
