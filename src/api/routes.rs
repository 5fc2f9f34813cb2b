//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, command_handler, delete_handler, entries_handler, get_handler,
    health_handler, info_handler, keys_handler, set_handler, values_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a value
/// - `GET /get/:key` - Retrieve an entry by key
/// - `DELETE /del/:key` - Delete a key
/// - `GET /keys?prefix=` - List live keys
/// - `GET /values?prefix=` - List live values
/// - `GET /entries?prefix=` - List live entries with their metadata
/// - `DELETE /clear` - Delete every live key
/// - `GET /info` - Table and connection metadata
/// - `POST /command/:action` - Raw item action on the cache table
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/keys", get(keys_handler))
        .route("/values", get(values_handler))
        .route("/entries", get(entries_handler))
        .route("/clear", delete(clear_handler))
        .route("/info", get(info_handler))
        .route("/command/:action", post(command_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
