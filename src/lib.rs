//! Storefront Cache - caching layer for a product landing page
//!
//! Two independent caches: a service-worker style router that serves page
//! requests cache-first, stale-while-revalidate or network-first, and a
//! TTL- and version-checked key/value cache persisted to local storage.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod smart;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use smart::SmartCache;
pub use tasks::spawn_cleanup_task;
pub use worker::ServiceWorker;
