use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{de, Deserialize, Deserializer};
use serde_json::json;

use super::domain::RejectionDraft;
use super::pipeline::{QueueQuery, SortBy};
use super::queue::{FilterType, QueueItemId};
use super::service::{ApprovalCoordinator, ApprovalError};
use super::source::{ApprovalDataSource, CapabilityCheck, Notifier, SourceError};

/// Query-string or body form of a queue view. Missing sort falls back to the configured default.
///
/// An empty `filter` or `sort` (`?filter=&sort=`) counts as missing.
#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub filter: Option<FilterType>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sort: Option<SortBy>,
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

impl QueueParams {
    pub fn into_query(self, default_sort: SortBy) -> QueueQuery {
        QueueQuery::new(
            self.filter.unwrap_or_default(),
            self.search.unwrap_or_default(),
            self.sort.unwrap_or(default_sort),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub item: QueueItemId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub item: QueueItemId,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Router builder exposing the approvals tab over HTTP.
pub fn approval_router<S, P, N>(coordinator: Arc<ApprovalCoordinator<S, P, N>>) -> Router
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/get-ready/approvals", get(queue_handler::<S, P, N>))
        .route(
            "/api/v1/get-ready/approvals/refresh",
            post(refresh_handler::<S, P, N>),
        )
        .route(
            "/api/v1/get-ready/approvals/selection/toggle",
            post(toggle_handler::<S, P, N>),
        )
        .route(
            "/api/v1/get-ready/approvals/selection/all",
            post(select_all_handler::<S, P, N>),
        )
        .route(
            "/api/v1/get-ready/approvals/approve",
            post(approve_handler::<S, P, N>),
        )
        .route(
            "/api/v1/get-ready/approvals/reject",
            post(reject_handler::<S, P, N>),
        )
        .route(
            "/api/v1/get-ready/approvals/bulk-approve",
            post(bulk_approve_handler::<S, P, N>),
        )
        .with_state(coordinator)
}

impl ApprovalError {
    /// HTTP status used when the error reaches the approvals endpoints.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingRejectionReason | Self::EmptySelection => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::UnknownQueueItem(_) | Self::Source(SourceError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Source(_) | Self::BulkApprovalFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

pub(crate) fn error_response(error: &ApprovalError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn queue_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Query(params): Query<QueueParams>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let query = params.into_query(coordinator.config().default_sort);
    let summary = coordinator.summary().await;
    let view = coordinator.view(&query, summary, Utc::now());
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn refresh_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    match coordinator.refresh().await {
        Ok(count) => (StatusCode::OK, Json(json!({ "vehicles": count }))).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn toggle_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Json(id): Json<QueueItemId>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let selected = coordinator.toggle(id.clone());
    let payload = json!({
        "id": id,
        "selected": selected,
        "selection": coordinator.selected(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn select_all_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Json(params): Json<QueueParams>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let query = params.into_query(coordinator.config().default_sort);
    let visible = coordinator.queue(&query, Utc::now());
    coordinator.select_all(&visible);
    let payload = json!({ "selection": coordinator.selected() });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn approve_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Json(request): Json<ApproveRequest>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let Some(item) = coordinator.find(&request.item, Utc::now()) else {
        return error_response(&ApprovalError::UnknownQueueItem(request.item));
    };

    match coordinator.approve(&item, request.notes.as_deref()).await {
        Ok(()) => {
            let payload = json!({ "id": request.item, "status": "approved" });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn reject_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let RejectRequest {
        item: id,
        reason,
        notes,
    } = request;

    let Some(item) = coordinator.find(&id, Utc::now()) else {
        return error_response(&ApprovalError::UnknownQueueItem(id));
    };

    let draft = RejectionDraft { reason, notes };
    match coordinator.reject(&item, draft).await {
        Ok(()) => {
            let status = if item.is_vehicle() {
                "rejected"
            } else {
                "declined"
            };
            let payload = json!({ "id": id, "status": status });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn bulk_approve_handler<S, P, N>(
    State(coordinator): State<Arc<ApprovalCoordinator<S, P, N>>>,
    Json(params): Json<QueueParams>,
) -> Response
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    let query = params.into_query(coordinator.config().default_sort);
    let visible = coordinator.queue(&query, Utc::now());

    match coordinator.bulk_approve(&visible).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(&error),
    }
}
