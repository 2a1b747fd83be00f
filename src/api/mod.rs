//! API Module
//!
//! HTTP handlers and routing exposing one `TieredCache`.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Read a value under a strategy
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Drop both tiers
//! - `GET /stats` - Memory tier statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
