use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use metrics::counter;
use serde::Serialize;
use tracing::error;

use domain_catalog_core::types::{DomainRecord, FieldSet};
use domain_catalog_storage::DomainError;

use crate::admin::require_admin;
use crate::problem::ProblemResponse;
use crate::router::AppState;

/// One editable field of the details form: the current raw value plus the
/// input hints (`min 0`, two-decimal step) the form renders with.
#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub value: Option<String>,
    pub min: f64,
    pub step: f64,
    pub placeholder: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetailsResponse {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

fn descriptor(record: &DomainRecord, fields: &FieldSet) -> DetailsResponse {
    DetailsResponse {
        id: record.id.clone(),
        name: record.name.clone(),
        fields: fields
            .iter()
            .map(|key| FieldDescriptor {
                name: key.to_string(),
                label: FieldSet::label(key),
                value: record.attribute(key).map(str::to_string),
                min: 0.0,
                step: 0.01,
                placeholder: "0.00",
            })
            .collect(),
    }
}

fn not_found() -> ProblemResponse {
    ProblemResponse::new(
        StatusCode::NOT_FOUND,
        "domain_not_found",
        "no catalog record with that id",
    )
}

fn storage_failure(err: DomainError) -> ProblemResponse {
    error!(stage = "details", error = %err, "details request failed");
    ProblemResponse::internal("the record could not be loaded")
}

/// Handles `GET /domains/:id/details`.
pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DetailsResponse>, ProblemResponse> {
    let record = state
        .storage()
        .domains()
        .fetch(&id)
        .await
        .map_err(storage_failure)?
        .ok_or_else(not_found)?;

    Ok(Json(descriptor(&record, state.fields())))
}

/// Handles `POST /domains/:id/details`: a field-level upsert. For each
/// configured attribute present in the submission, an empty value deletes
/// the attribute and anything else is stored verbatim. Fields absent from
/// the submission are left untouched; unknown keys are ignored.
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(submission): Json<BTreeMap<String, String>>,
) -> Result<Json<DetailsResponse>, ProblemResponse> {
    require_admin(&state, &headers)?;

    let repo = state.storage().domains();
    if repo.fetch(&id).await.map_err(storage_failure)?.is_none() {
        return Err(not_found());
    }

    let now = state.now();
    let mut tx = repo
        .begin()
        .await
        .map_err(|err| storage_failure(DomainError::from(err)))?;

    for key in state.fields().iter() {
        let Some(value) = submission.get(key) else {
            continue;
        };
        if value.is_empty() {
            repo.delete_attribute(&mut tx, &id, key)
                .await
                .map_err(storage_failure)?;
        } else {
            repo.set_attribute(&mut tx, &id, key, value, now)
                .await
                .map_err(storage_failure)?;
        }
    }

    tx.commit()
        .await
        .map_err(|err| storage_failure(DomainError::from(err)))?;
    counter!("details_saves_total").increment(1);

    let record = state
        .storage()
        .domains()
        .fetch(&id)
        .await
        .map_err(storage_failure)?
        .ok_or_else(not_found)?;
    Ok(Json(descriptor(&record, state.fields())))
}
