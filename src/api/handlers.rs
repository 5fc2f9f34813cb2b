//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::DynamoCache;
use crate::codec::HostValue;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, EntriesResponse, GetResponse, HealthResponse, KeysResponse,
    PrefixQuery, SetRequest, SetResponse, ValuesResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DynamoCache>,
}

impl AppState {
    pub fn new(cache: DynamoCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let value = HostValue::from(req.value);
    state.cache.put(&req.key, &value, req.idle, req.until).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let entry = state.cache.get_entry(&key).await?;
    Ok(Json(GetResponse::from_entry(entry)))
}

/// Handler for DELETE /del/:key
///
/// Missing and expired keys are reported as not found.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.remove(&key).await? {
        return Err(CacheError::missing_key(&key, state.cache.table()));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<KeysResponse>> {
    let keys = match query.prefix.as_deref() {
        Some(prefix) => {
            state
                .cache
                .keys_matching(&|k: &str| k.starts_with(prefix))
                .await?
        }
        None => state.cache.keys().await?,
    };
    Ok(Json(KeysResponse::new(keys)))
}

/// Handler for GET /values
pub async fn values_handler(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<ValuesResponse>> {
    let values = match query.prefix.as_deref() {
        Some(prefix) => {
            state
                .cache
                .values_matching(&|k: &str| k.starts_with(prefix))
                .await?
        }
        None => state.cache.values().await?,
    };
    Ok(Json(ValuesResponse::new(values)))
}

/// Handler for GET /entries
pub async fn entries_handler(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<EntriesResponse>> {
    let entries = match query.prefix.as_deref() {
        Some(prefix) => {
            state
                .cache
                .entries_matching(&|k: &str| k.starts_with(prefix))
                .await?
        }
        None => state.cache.entries().await?,
    };
    Ok(Json(EntriesResponse::new(&entries)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let removed = state.cache.clear().await?;
    Ok(Json(ClearResponse { removed }))
}

/// Handler for GET /info
pub async fn info_handler(State(state): State<AppState>) -> Result<Json<HostValue>> {
    let info = state.cache.custom_info().await?;
    Ok(Json(HostValue::Map(info)))
}

/// Handler for POST /command/:action
pub async fn command_handler(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(args): Json<serde_json::Value>,
) -> Result<Json<HostValue>> {
    let result = state.cache.command(&action, &HostValue::from(args)).await?;
    Ok(Json(result))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
