//! Request and Response models for the cache server API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{PrefixQuery, SetRequest};
pub use responses::{
    ClearResponse, DeleteResponse, EntriesResponse, GetResponse, HealthResponse, KeysResponse,
    SetResponse, ValuesResponse,
};
