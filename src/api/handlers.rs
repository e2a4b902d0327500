//! HTTP request handlers for the workforce sync API.
//!
//! This module contains the handler functions for all API endpoints.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::alerts::AlertRuleDraft;
use crate::error::EngineResult;
use crate::export;
use crate::import::ImportPreview;
use crate::models::{FileKind, ImportMapping, ImportRequest};
use crate::quality::IssueFilter;
use crate::sync::SyncRequest;

use super::request::{
    CancelRequest, EvaluateRequest, ImportCommitRequest, ImportFileRequest, NotificationQuery,
    RecalculateRequest, RuleActivation, SyncJobQuery, SyncStartQuery,
};
use super::response::ApiErrorResponse;
use super::state::AppState;

type ApiResult = Result<Response, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/imports/preview", post(preview_import_handler))
        .route("/imports/commit", post(commit_import_handler))
        .route("/profiles/:owner/:file_kind", get(list_profiles_handler))
        .route(
            "/profiles/:owner/:file_kind/:name",
            get(load_profile_handler)
                .put(save_profile_handler)
                .delete(delete_profile_handler),
        )
        .route("/sync/jobs", post(start_sync_handler).get(list_jobs_handler))
        .route("/sync/jobs/:id", get(get_job_handler))
        .route("/sync/jobs/:id/cancel", post(cancel_job_handler))
        .route("/quality/recalculate", post(recalculate_handler))
        .route("/quality/issues", get(list_issues_handler))
        .route("/quality/issues/:id/resolve", post(resolve_issue_handler))
        .route("/alerts/rules", get(list_rules_handler).post(create_rule_handler))
        .route(
            "/alerts/rules/:id",
            get(get_rule_handler)
                .put(update_rule_handler)
                .patch(activate_rule_handler)
                .delete(delete_rule_handler),
        )
        .route("/alerts/evaluate", post(evaluate_alerts_handler))
        .route("/alerts/notifications", get(list_notifications_handler))
        .route("/alerts/notifications/:id/read", post(mark_read_handler))
        .route("/exports/sync-jobs", get(export_jobs_handler))
        .route("/exports/issues", get(export_issues_handler))
        .route("/exports/notifications", get(export_notifications_handler))
        .with_state(state)
}

fn json<T: serde::Serialize>(status: StatusCode, body: T) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], Json(body)).into_response()
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

fn preview_file(state: &AppState, file: &ImportFileRequest) -> EngineResult<ImportPreview> {
    let mapping = match (&file.mapping, &file.profile) {
        (Some(mapping), _) => Some(mapping.clone()),
        (None, Some(profile)) => Some(
            state
                .profiles()
                .load(&profile.owner, file.file_kind, &profile.name)?
                .mapping,
        ),
        (None, None) => None,
    };
    state
        .importer()
        .preview(file.file_kind, &file.headers, &file.rows, mapping)
}

/// Handler for POST /imports/preview.
///
/// Maps and validates a parsed file without writing it.
async fn preview_import_handler(
    State(state): State<AppState>,
    payload: Result<Json<ImportFileRequest>, JsonRejection>,
) -> ApiResult {
    let correlation_id = Uuid::new_v4();
    let Json(file) = payload?;
    info!(
        correlation_id = %correlation_id,
        file_kind = %file.file_kind,
        rows = file.rows.len(),
        "Processing import preview"
    );

    let preview = preview_file(&state, &file).inspect_err(|err| {
        warn!(correlation_id = %correlation_id, error = %err, "Import preview rejected");
    })?;
    Ok(json(StatusCode::OK, preview))
}

/// Handler for POST /imports/commit.
///
/// Validates the file again and writes it if the import policy allows.
async fn commit_import_handler(
    State(state): State<AppState>,
    payload: Result<Json<ImportCommitRequest>, JsonRejection>,
) -> ApiResult {
    let correlation_id = Uuid::new_v4();
    let Json(commit) = payload?;
    info!(
        correlation_id = %correlation_id,
        file_kind = %commit.file.file_kind,
        strategy = %commit.strategy,
        force = commit.force_non_critical,
        "Processing import commit"
    );

    let request = ImportRequest {
        strategy: commit.strategy,
        force_non_critical: commit.force_non_critical,
    };
    let outcome = preview_file(&state, &commit.file)
        .and_then(|preview| state.importer().commit(&preview, request))
        .inspect_err(|err| {
            warn!(correlation_id = %correlation_id, error = %err, "Import commit rejected");
        })?;

    info!(
        correlation_id = %correlation_id,
        inserted = outcome.report.inserted,
        updated = outcome.report.updated,
        errored = outcome.report.errored,
        "Import committed"
    );
    Ok(json(StatusCode::OK, outcome))
}

/// Handler for GET /profiles/:owner/:file_kind.
async fn list_profiles_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, FileKind)>, PathRejection>,
) -> ApiResult {
    let Path((owner, file_kind)) = path?;
    Ok(json(StatusCode::OK, state.profiles().list(&owner, file_kind)))
}

/// Handler for GET /profiles/:owner/:file_kind/:name.
async fn load_profile_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, FileKind, String)>, PathRejection>,
) -> ApiResult {
    let Path((owner, file_kind, name)) = path?;
    let profile = state.profiles().load(&owner, file_kind, &name)?;
    Ok(json(StatusCode::OK, profile))
}

/// Handler for PUT /profiles/:owner/:file_kind/:name.
async fn save_profile_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, FileKind, String)>, PathRejection>,
    payload: Result<Json<ImportMapping>, JsonRejection>,
) -> ApiResult {
    let Path((owner, file_kind, name)) = path?;
    let Json(mapping) = payload?;
    let profile = state.profiles().save(&owner, file_kind, &name, mapping);
    Ok(json(StatusCode::OK, profile))
}

/// Handler for DELETE /profiles/:owner/:file_kind/:name.
async fn delete_profile_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, FileKind, String)>, PathRejection>,
) -> ApiResult {
    let Path((owner, file_kind, name)) = path?;
    state.profiles().delete(&owner, file_kind, &name)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for POST /sync/jobs.
///
/// Opens a job and runs it in the background, answering `202` with the
/// running job. With `?wait=true` the job runs before the response and the
/// finalized job is returned.
async fn start_sync_handler(
    State(state): State<AppState>,
    query: Result<Query<SyncStartQuery>, QueryRejection>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> ApiResult {
    let correlation_id = Uuid::new_v4();
    let Query(query) = query?;
    let Json(request) = payload?;
    info!(
        correlation_id = %correlation_id,
        entity = %request.entity,
        centre_code = ?request.centre_code,
        wait = query.wait,
        "Processing sync request"
    );

    let job = state.sync().start(&request).inspect_err(|err| {
        warn!(correlation_id = %correlation_id, error = %err, "Sync request rejected");
    })?;

    if query.wait {
        let finished = state.sync().execute(job.id, &request).await?;
        return Ok(json(StatusCode::OK, finished));
    }

    let orchestrator = state.sync().clone();
    let job_id = job.id;
    tokio::spawn(async move {
        if let Err(err) = orchestrator.execute(job_id, &request).await {
            warn!(correlation_id = %correlation_id, job_id = %job_id, error = %err, "Background sync failed");
        }
    });
    Ok(json(StatusCode::ACCEPTED, job))
}

/// Handler for GET /sync/jobs.
async fn list_jobs_handler(
    State(state): State<AppState>,
    query: Result<Query<SyncJobQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    Ok(json(
        StatusCode::OK,
        state.sync().jobs().list(query.entity, query.status),
    ))
}

/// Handler for GET /sync/jobs/:id.
async fn get_job_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(job_id) = path?;
    Ok(json(StatusCode::OK, state.sync().jobs().get(job_id)?))
}

/// Handler for POST /sync/jobs/:id/cancel.
async fn cancel_job_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult {
    let Path(job_id) = path?;
    let Json(cancel) = payload?;
    let job = state.sync().cancel(job_id, &cancel.reason)?;
    Ok(json(StatusCode::OK, job))
}

/// Handler for POST /quality/recalculate.
async fn recalculate_handler(
    State(state): State<AppState>,
    payload: Result<Json<RecalculateRequest>, JsonRejection>,
) -> ApiResult {
    let correlation_id = Uuid::new_v4();
    let Json(request) = payload?;
    let period = request.period()?;
    info!(
        correlation_id = %correlation_id,
        start = %period.start,
        end = %period.end,
        centre_code = ?request.centre_code,
        "Processing quality recalculation"
    );

    let report = state
        .quality()
        .recalculate(period, request.centre_code.as_deref());
    Ok(json(StatusCode::OK, report))
}

/// Handler for GET /quality/issues.
async fn list_issues_handler(
    State(state): State<AppState>,
    query: Result<Query<IssueFilter>, QueryRejection>,
) -> ApiResult {
    let Query(filter) = query?;
    Ok(json(StatusCode::OK, state.quality().issues().list(&filter)))
}

/// Handler for POST /quality/issues/:id/resolve.
async fn resolve_issue_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(issue_id) = path?;
    let issue = state.quality().issues().resolve(issue_id, Utc::now())?;
    info!(issue_id = %issue_id, kind = %issue.kind, "Data quality issue resolved");
    Ok(json(StatusCode::OK, issue))
}

/// Handler for GET /alerts/rules.
async fn list_rules_handler(State(state): State<AppState>) -> ApiResult {
    Ok(json(StatusCode::OK, state.alert_rules().list()))
}

/// Handler for POST /alerts/rules.
async fn create_rule_handler(
    State(state): State<AppState>,
    payload: Result<Json<AlertRuleDraft>, JsonRejection>,
) -> ApiResult {
    let Json(draft) = payload?;
    let rule = state.alert_rules().create(draft)?;
    Ok(json(StatusCode::CREATED, rule))
}

/// Handler for GET /alerts/rules/:id.
async fn get_rule_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(rule_id) = path?;
    Ok(json(StatusCode::OK, state.alert_rules().get(rule_id)?))
}

/// Handler for PUT /alerts/rules/:id.
async fn update_rule_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AlertRuleDraft>, JsonRejection>,
) -> ApiResult {
    let Path(rule_id) = path?;
    let Json(draft) = payload?;
    Ok(json(StatusCode::OK, state.alert_rules().update(rule_id, draft)?))
}

/// Handler for PATCH /alerts/rules/:id.
async fn activate_rule_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RuleActivation>, JsonRejection>,
) -> ApiResult {
    let Path(rule_id) = path?;
    let Json(activation) = payload?;
    let rule = state.alert_rules().set_active(rule_id, activation.active)?;
    Ok(json(StatusCode::OK, rule))
}

/// Handler for DELETE /alerts/rules/:id.
async fn delete_rule_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(rule_id) = path?;
    state.alert_rules().delete(rule_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Handler for POST /alerts/evaluate.
async fn evaluate_alerts_handler(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult {
    let correlation_id = Uuid::new_v4();
    let Json(request) = payload?;
    let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
    info!(correlation_id = %correlation_id, as_of = %as_of, "Processing alert evaluation");

    let report = state.alerts().evaluate(as_of);
    Ok(json(StatusCode::OK, report))
}

/// Handler for GET /alerts/notifications.
async fn list_notifications_handler(
    State(state): State<AppState>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    Ok(json(
        StatusCode::OK,
        state.notifications().list(query.unread_only),
    ))
}

/// Handler for POST /alerts/notifications/:id/read.
async fn mark_read_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(notification_id) = path?;
    Ok(json(
        StatusCode::OK,
        state.notifications().mark_read(notification_id)?,
    ))
}

/// Handler for GET /exports/sync-jobs.
async fn export_jobs_handler(
    State(state): State<AppState>,
    query: Result<Query<SyncJobQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let jobs = state.sync().jobs().list(query.entity, query.status);
    Ok(csv_attachment("sync_jobs.csv", export::sync_jobs_csv(&jobs)?))
}

/// Handler for GET /exports/issues.
async fn export_issues_handler(
    State(state): State<AppState>,
    query: Result<Query<IssueFilter>, QueryRejection>,
) -> ApiResult {
    let Query(filter) = query?;
    let issues = state.quality().issues().list(&filter);
    Ok(csv_attachment("data_quality_issues.csv", export::issues_csv(&issues)?))
}

/// Handler for GET /exports/notifications.
async fn export_notifications_handler(
    State(state): State<AppState>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let notifications = state.notifications().list(query.unread_only);
    Ok(csv_attachment(
        "alert_notifications.csv",
        export::notifications_csv(&notifications)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::OutboxSink;
    use crate::config::ConfigLoader;
    use crate::sync::FixtureSchedulingApi;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json as json_value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        let config = ConfigLoader::load("./config/default").expect("Failed to load config");
        AppState::new(
            config,
            Arc::new(FixtureSchedulingApi::default()),
            Arc::new(OutboxSink::new()),
        )
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/imports/preview")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let router = create_router(create_test_state());
        let (status, body) = send(router, "POST", "/imports/preview", Some(json_value!({"rows": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_job_returns_404() {
        let router = create_router(create_test_state());
        let uri = format!("/sync/jobs/{}", Uuid::new_v4());
        let (status, body) = send(router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "JOB_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bad_uuid_in_path_returns_400() {
        let router = create_router(create_test_state());
        let (status, _) = send(router, "POST", "/quality/issues/not-a-uuid/resolve", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let state = create_test_state();
        let mapping = json_value!({"bindings": [{"column": "Código", "field": "payroll_code"}]});

        let (status, saved) = send(
            create_router(state.clone()),
            "PUT",
            "/profiles/ana/payroll/nomina-mensual",
            Some(mapping),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, listed) = send(create_router(state.clone()), "GET", "/profiles/ana/payroll", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], saved["id"]);

        let (status, _) = send(
            create_router(state.clone()),
            "DELETE",
            "/profiles/ana/payroll/nomina-mensual",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            create_router(state),
            "GET",
            "/profiles/ana/payroll/nomina-mensual",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PROFILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_alert_rule_returns_400() {
        let router = create_router(create_test_state());
        let (status, body) = send(
            router,
            "POST",
            "/alerts/rules",
            Some(json_value!({
                "name": "Horas",
                "kind": "worked_hours",
                "threshold": "160",
                "operator": ">",
                "period": "week",
                "channels": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ALERT_RULE");
    }
}
