use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use divtrack_core::util::normalize_text_option;
use divtrack_core::{Dividend, DividendId, DividendStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: Arc<dyn DividendStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DividendStore>, config: Arc<AppConfig>) -> Self {
        Self { config, store }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/dividends",
            get(list_dividends).post(submit_dividends),
        )
        .route("/api/dividends/{id}", delete(delete_dividend))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    timestamp: i64,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.store.backend().label(),
        timestamp: Utc::now().timestamp(),
    })
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<usize>,
}

async fn list_dividends(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Dividend>>, AppError> {
    let Some(user_id) = normalize_text_option(query.user_id) else {
        return Ok(Json(Vec::new()));
    };

    let dividends = state.store.list_by_user(&user_id).await?;
    tracing::info!(
        endpoint = "list_dividends",
        user = user_fingerprint(&user_id),
        count = dividends.len(),
        "Listed dividends"
    );
    Ok(Json(dividends))
}

async fn submit_dividends(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WriteResponse>, AppError> {
    let records = parse_batch(&body)?;
    state.store.upsert_batch(&records).await?;

    let mut users: Vec<&str> = records.iter().map(|d| d.user_id.as_str()).collect();
    users.sort_unstable();
    users.dedup();
    tracing::info!(
        endpoint = "submit_dividends",
        users = users.len(),
        user = users.first().map_or(0, |user_id| user_fingerprint(user_id)),
        count = records.len(),
        "Upserted dividends"
    );
    Ok(Json(WriteResponse {
        success: true,
        deleted: None,
    }))
}

async fn delete_dividend(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<WriteResponse>, AppError> {
    let id = id
        .parse::<DividendId>()
        .map_err(|_| AppError::bad_request(format!("`{id}` is not a dividend id")))?;
    let user_id = normalize_text_option(query.user_id)
        .ok_or_else(|| AppError::bad_request("userId is required"))?;

    let deleted = state.store.delete_batch(&user_id, &[id]).await?;
    tracing::info!(
        endpoint = "delete_dividend",
        user = user_fingerprint(&user_id),
        deleted,
        "Deleted dividend"
    );
    Ok(Json(WriteResponse {
        success: true,
        deleted: Some(deleted),
    }))
}

/// Decode a POST body, which must be a JSON array of dividend records
fn parse_batch(body: &[u8]) -> Result<Vec<Dividend>, AppError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("body is not valid JSON: {err}")))?;
    if !value.is_array() {
        return Err(AppError::bad_request(
            "body must be a JSON array of dividends",
        ));
    }
    serde_json::from_value(value)
        .map_err(|err| AppError::bad_request(format!("malformed dividend: {err}")))
}

fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}
