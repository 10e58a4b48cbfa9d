use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use domain_catalog_core::import::{ImportBatch, ImportError};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Notice shown when the uploaded file has no `domain` header. Kept verbatim
/// from the admin screen this surface replaces.
pub const INVALID_CSV_NOTICE: &str =
    "Invalid CSV - At Least One Column Needs To Have \"domain\" As A Header";

/// Inline notice returned by the bulk admin actions.
#[derive(Debug, Serialize)]
pub struct AdminNotice {
    pub status: &'static str,
    pub message: String,
    pub count: u64,
}

impl AdminNotice {
    fn success(message: String, count: u64) -> Self {
        Self {
            status: "success",
            message,
            count,
        }
    }
}

/// Capability check for the admin surface: a bearer token compared in
/// constant time against the configured admin token. Failures are reported
/// explicitly rather than silently ignored.
pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ProblemResponse> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let authorized = provided
        .map(|token| bool::from(token.as_bytes().ct_eq(state.admin_token())))
        .unwrap_or(false);

    if !authorized {
        counter!("admin_unauthorized_total").increment(1);
        warn!(stage = "admin", "rejected request without a valid admin token");
        return Err(ProblemResponse::new(
            StatusCode::FORBIDDEN,
            "missing_capability",
            "a valid admin bearer token is required for this action",
        ));
    }
    Ok(())
}

/// Handles `POST /admin/import`: reads the `csv` file part, validates the
/// batch, and upserts every row inside one transaction.
pub async fn import(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AdminNotice>, ProblemResponse> {
    require_admin(&state, &headers)?;

    let mut csv_bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "invalid_upload",
            format!("failed to read the multipart body: {err}"),
        )
    })? {
        if field.name() == Some("csv") {
            let bytes = field.bytes().await.map_err(|err| {
                ProblemResponse::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_upload",
                    format!("failed to read the csv file part: {err}"),
                )
            })?;
            csv_bytes = Some(bytes);
            break;
        }
    }

    let Some(bytes) = csv_bytes else {
        return Err(ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "missing_upload",
            "the request must include a file part named \"csv\"",
        ));
    };

    let batch = ImportBatch::parse(&bytes).map_err(|err| {
        counter!("import_batches_total", "result" => "invalid").increment(1);
        match err {
            ImportError::MissingDomainColumn => ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_csv",
                INVALID_CSV_NOTICE,
            ),
            ImportError::Csv(err) => ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_csv",
                format!("failed to parse csv: {err}"),
            ),
        }
    })?;

    let processed = state.importer().run(&batch).await.map_err(|err| {
        counter!("import_batches_total", "result" => "failed").increment(1);
        error!(stage = "import", error = %err, "import batch rolled back");
        ProblemResponse::internal("the import could not be committed")
    })?;

    counter!("import_batches_total", "result" => "ok").increment(1);
    counter!("import_rows_total").increment(processed);
    info!(stage = "import", rows = processed, "csv import committed");

    Ok(Json(AdminNotice::success(
        format!("{processed} Domains Added Successfully"),
        processed,
    )))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllRequest {
    #[serde(default)]
    pub delete_all_domains: bool,
}

/// Handles `POST /admin/delete-all`: permanently removes every catalog
/// record regardless of status once the confirmation flag is set.
pub async fn delete_all(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeleteAllRequest>,
) -> Result<Json<AdminNotice>, ProblemResponse> {
    require_admin(&state, &headers)?;

    if !request.delete_all_domains {
        return Err(ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "confirmation_required",
            "set delete_all_domains to true to delete the whole catalog",
        ));
    }

    let deleted = state.storage().domains().delete_all().await.map_err(|err| {
        error!(stage = "admin", error = %err, "bulk delete failed");
        ProblemResponse::internal("the catalog could not be deleted")
    })?;

    counter!("domains_deleted_total").increment(deleted);
    info!(stage = "admin", deleted, "catalog emptied");

    Ok(Json(AdminNotice::success(
        format!("{deleted} Domains Deleted Successfully"),
        deleted,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::router::testutil::{test_state, TEST_ADMIN_TOKEN};
    use crate::router::{app_router, AppState};

    const BOUNDARY: &str = "catalog-test-boundary";

    fn import_request(token: Option<&str>, field_name: &str, csv: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field_name}\"; filename=\"domains.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let mut builder = Request::builder()
            .method("POST")
            .uri("/admin/import")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn delete_request(token: Option<&str>, confirmed: bool) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/admin/delete-all")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(format!(
                "{{\"delete_all_domains\": {confirmed}}}"
            )))
            .unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = app_router(state.clone())
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let value = serde_json::from_slice(&collected.to_bytes()).expect("json body");
        (status, value)
    }

    #[tokio::test]
    async fn import_creates_records_and_reports_the_notice() {
        let state = test_state().await;
        let csv = "domain,minimum_bid\nexample.com,500\nfoo.com,";
        let (status, body) = send(&state, import_request(Some(TEST_ADMIN_TOKEN), "csv", csv)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "2 Domains Added Successfully");
        assert_eq!(body["count"], 2);
        assert_eq!(state.storage().domains().count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn import_rejects_csv_without_a_domain_header() {
        let state = test_state().await;
        let csv = "name,price\nexample.com,500";
        let (status, body) = send(&state, import_request(Some(TEST_ADMIN_TOKEN), "csv", csv)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], INVALID_CSV_NOTICE);
        assert_eq!(
            state.storage().domains().count().await.expect("count"),
            0,
            "a rejected batch must not mutate the store"
        );
    }

    #[tokio::test]
    async fn import_requires_a_valid_admin_token() {
        let state = test_state().await;
        let csv = "domain\nexample.com";

        let (status, _) = send(&state, import_request(None, "csv", csv)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&state, import_request(Some("wrong-token"), "csv", csv)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert_eq!(state.storage().domains().count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn import_without_a_csv_part_is_an_explicit_error() {
        let state = test_state().await;
        let (status, body) = send(
            &state,
            import_request(Some(TEST_ADMIN_TOKEN), "attachment", "domain\nexample.com"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "missing_upload");
    }

    #[tokio::test]
    async fn delete_all_empties_the_catalog_and_reports_the_count() {
        let state = test_state().await;
        let csv = "domain,minimum_bid\nexample.com,500\nfoo.com,250";
        send(&state, import_request(Some(TEST_ADMIN_TOKEN), "csv", csv)).await;

        let (status, body) = send(&state, delete_request(Some(TEST_ADMIN_TOKEN), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "2 Domains Deleted Successfully");
        assert_eq!(state.storage().domains().count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn delete_all_requires_the_confirmation_flag() {
        let state = test_state().await;
        let csv = "domain\nexample.com";
        send(&state, import_request(Some(TEST_ADMIN_TOKEN), "csv", csv)).await;

        let (status, body) = send(&state, delete_request(Some(TEST_ADMIN_TOKEN), false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "confirmation_required");
        assert_eq!(state.storage().domains().count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_all_requires_a_valid_admin_token() {
        let state = test_state().await;
        let (status, _) = send(&state, delete_request(None, true)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
