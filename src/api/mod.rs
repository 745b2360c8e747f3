//! API Module
//!
//! HTTP handlers and routing: the smart-cache management API, worker
//! events, and the caching proxy that serves everything else.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
