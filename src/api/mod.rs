//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set`, `GET /get/:key`, `DELETE /del/:key` - Single-key operations
//! - `GET /keys`, `GET /values`, `GET /entries` - Enumeration, optionally by key prefix
//! - `DELETE /clear` - Remove every live key
//! - `GET /info` - Table metadata
//! - `POST /command/:action` - Raw item actions
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
