use axum::{
    extract::{Query, State},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::error;

use domain_catalog_core::money::format_currency;
use domain_catalog_core::query::{apply_column_sort, DomainListQuery, Ordering, SortDirection};
use domain_catalog_core::types::{DomainStatus, FieldSet};

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    dir: SortDirection,
}

/// One admin-list column, derived from the configured field set.
#[derive(Debug, Serialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
    pub sortable: bool,
}

/// One rendered cell: the raw stored value plus its currency rendering.
#[derive(Debug, Serialize)]
pub struct Cell {
    pub key: String,
    pub raw: Option<String>,
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct ListRow {
    pub id: String,
    pub name: String,
    pub status: DomainStatus,
    pub categories: Vec<String>,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Serialize)]
pub struct DomainListResponse {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<ListRow>,
    pub total: usize,
}

/// Handles `GET /domains`: the list view with one currency column per
/// configured attribute. The requested sort key flows through the column
/// sort adapter, so attribute keys order numerically and keep records that
/// lack the attribute.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DomainListResponse>, ProblemResponse> {
    let mut query = DomainListQuery::new(params.sort, params.dir);
    apply_column_sort(&mut query, state.fields());

    let ordering_label = match &query.ordering {
        Ordering::Name => "name",
        Ordering::AttributeNumeric { .. } => "attribute",
    };
    counter!("list_requests_total", "ordering" => ordering_label).increment(1);

    let records = state.storage().domains().list(&query).await.map_err(|err| {
        error!(stage = "list", error = %err, "failed to list the catalog");
        ProblemResponse::internal("the catalog could not be listed")
    })?;

    let columns = state
        .fields()
        .iter()
        .map(|key| ColumnSpec {
            key: key.to_string(),
            label: FieldSet::label(key),
            sortable: true,
        })
        .collect();

    let category_repo = state.storage().categories();
    let mut rows: Vec<ListRow> = Vec::with_capacity(records.len());
    for record in records {
        let categories = category_repo
            .list_for_domain(&record.id)
            .await
            .map_err(|err| {
                error!(stage = "list", error = %err, "failed to load category terms");
                ProblemResponse::internal("the catalog could not be listed")
            })?
            .into_iter()
            .map(|category| category.name)
            .collect();
        let cells = state
            .fields()
            .iter()
            .map(|key| {
                let raw = record.attribute(key).map(str::to_string);
                Cell {
                    display: format_currency(raw.as_deref()),
                    key: key.to_string(),
                    raw,
                }
            })
            .collect();
        rows.push(ListRow {
            id: record.id,
            name: record.name,
            status: record.status,
            categories,
            cells,
        });
    }

    let total = rows.len();
    Ok(Json(DomainListResponse {
        columns,
        rows,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::router::testutil::{test_state, TEST_ADMIN_TOKEN};
    use crate::router::{app_router, AppState};

    async fn import_csv(state: &AppState, csv: &str) {
        const BOUNDARY: &str = "catalog-test-boundary";
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"csv\"; filename=\"domains.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/admin/import")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {TEST_ADMIN_TOKEN}"))
            .body(Body::from(body))
            .unwrap();
        let response = app_router(state.clone())
            .oneshot(request)
            .await
            .expect("import should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn get_list(state: &AppState, uri: &str) -> Value {
        let response = app_router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        serde_json::from_slice(&collected.to_bytes()).expect("json body")
    }

    #[tokio::test]
    async fn list_renders_one_currency_column_per_configured_field() {
        let state = test_state().await;
        import_csv(&state, "domain,minimum_bid\nexample.com,1234.5").await;

        let body = get_list(&state, "/domains").await;
        let columns: Vec<&str> = body["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|col| col["key"].as_str().unwrap())
            .collect();
        assert_eq!(columns, vec!["minimum_bid", "buy_it_now", "lease_to_own"]);
        assert_eq!(body["columns"][0]["label"], "Minimum Bid");

        let row = &body["rows"][0];
        assert_eq!(row["name"], "example.com");
        assert_eq!(row["cells"][0]["display"], "£1,234.50");
        assert_eq!(row["cells"][1]["display"], "£0.00");
        assert_eq!(row["cells"][1]["raw"], Value::Null);
    }

    #[tokio::test]
    async fn sorting_by_an_attribute_orders_numerically_and_keeps_bare_records() {
        let state = test_state().await;
        import_csv(
            &state,
            "domain,minimum_bid\nnine.com,9\neighty.com,80\nbare.com,",
        )
        .await;

        let body = get_list(&state, "/domains?sort=minimum_bid&dir=desc").await;
        let names: Vec<&str> = body["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["eighty.com", "nine.com", "bare.com"]);
        assert_eq!(body["total"], 3);
    }

    #[tokio::test]
    async fn list_includes_assigned_category_terms() {
        let state = test_state().await;
        import_csv(&state, "domain\nexample.com").await;

        let body = get_list(&state, "/domains").await;
        let id = body["rows"][0]["id"].as_str().unwrap().to_string();

        let categories = state.storage().categories();
        let premium = categories
            .ensure("premium", chrono::Utc::now())
            .await
            .expect("ensure");
        categories.assign(&id, &premium.id).await.expect("assign");

        let body = get_list(&state, "/domains").await;
        assert_eq!(body["rows"][0]["categories"][0], "premium");
    }

    #[tokio::test]
    async fn unconfigured_sort_key_falls_back_to_name_ordering() {
        let state = test_state().await;
        import_csv(&state, "domain\nzebra.com\nalpha.com").await;

        let body = get_list(&state, "/domains?sort=title").await;
        let names: Vec<&str> = body["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["alpha.com", "zebra.com"]);
    }
}
