use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::history::{HistoryStore, NewUser, StoreError, User, UserId, EXPORT_FILE_NAME};
use crate::notify::SummaryNotifier;
use crate::service::{MoodService, ServiceError};

/// Header carrying the caller id set by the upstream identity layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Router builder exposing check-in, history, and account endpoints.
pub fn mood_router<S, N>(service: Arc<MoodService<S, N>>) -> Router
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    Router::new()
        .route("/api/v1/checkins", post(check_in_handler::<S, N>))
        .route("/api/v1/history", get(history_handler::<S, N>))
        .route("/api/v1/history/export", get(export_handler::<S, N>))
        .route("/api/v1/history/summary", post(summary_handler::<S, N>))
        .route(
            "/api/v1/admin/users",
            get(list_users_handler::<S, N>).post(create_user_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/users/:user_id",
            delete(delete_user_handler::<S, N>),
        )
        .with_state(service)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

fn service_error(err: ServiceError) -> Response {
    match err {
        ServiceError::UnknownCaller(_) => error_body(StatusCode::UNAUTHORIZED, err.to_string()),
        ServiceError::Forbidden(_) => error_body(StatusCode::FORBIDDEN, err.to_string()),
        ServiceError::Store(StoreError::Conflict(_)) => {
            error_body(StatusCode::CONFLICT, err.to_string())
        }
        ServiceError::Store(StoreError::UnknownUser(_)) => {
            error_body(StatusCode::NOT_FOUND, err.to_string())
        }
        other => {
            error!(error = %other, "request failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Caller identity, if the request carries one. A malformed or unknown id is
/// rejected rather than treated as anonymous.
async fn caller<S, N>(
    service: &MoodService<S, N>,
    headers: &HeaderMap,
) -> Result<Option<User>, Response>
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let id = raw
        .to_str()
        .ok()
        .and_then(|value| value.parse::<UserId>().ok())
        .ok_or_else(|| error_body(StatusCode::UNAUTHORIZED, "malformed x-user-id header"))?;

    service.identify(id).await.map(Some).map_err(service_error)
}

async fn required_caller<S, N>(
    service: &MoodService<S, N>,
    headers: &HeaderMap,
) -> Result<User, Response>
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    caller(service, headers)
        .await?
        .ok_or_else(|| error_body(StatusCode::UNAUTHORIZED, "sign in to view your history"))
}

pub(crate) async fn check_in_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let user = match caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.check_in_form(user.as_ref(), &form).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn history_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let user = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.history(&user).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn export_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let user = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.export(&user).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn summary_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let user = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.send_summary(&user).await {
        Ok(handle) => {
            let payload = json!({ "queued": handle.is_some() });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn list_users_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let admin = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.users(&admin).await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn create_user_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
    Json(user): Json<NewUser>,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let admin = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.create_user(&admin, user).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn delete_user_handler<S, N>(
    State(service): State<Arc<MoodService<S, N>>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    let admin = match required_caller(&service, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.remove_user(&admin, UserId(user_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error(err),
    }
}
