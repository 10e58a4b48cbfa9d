use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use domain_catalog_core::types::FieldSet;
use domain_catalog_storage::Database;

use crate::importer::ImportExecutor;
use crate::{admin, columns, meta, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    fields: FieldSet,
    admin_token: Arc<[u8]>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    importer: ImportExecutor,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        fields: FieldSet,
        admin_token: Arc<[u8]>,
    ) -> Self {
        let clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync> = Arc::new(Utc::now);
        let importer = ImportExecutor::new(storage.clone(), clock.clone());
        Self {
            metrics,
            storage,
            fields,
            admin_token,
            clock,
            importer,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn admin_token(&self) -> &[u8] {
        &self.admin_token
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn importer(&self) -> &ImportExecutor {
        &self.importer
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/domains", get(columns::list))
        .route("/domains/:id/details", get(meta::read).post(meta::save))
        .route("/admin/import", post(admin::import))
        .route("/admin/delete-all", post(admin::delete_all))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}
