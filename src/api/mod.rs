//! API Module
//!
//! HTTP handlers and routing for the cache facade.
//!
//! # Endpoints
//! - `PUT /set` - Store a value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /has/:key` - Advisory presence check
//! - `POST /get_multiple` - Retrieve several values
//! - `PUT /set_multiple` - Store several values with one TTL
//! - `POST /delete_multiple` - Delete several keys
//! - `POST /clear` - Remove records under the configured prefix
//! - `POST /clear_all` - Remove every record
//! - `GET /stats` - Driver statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
