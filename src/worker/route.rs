//! Request classification.

use std::collections::HashSet;
use std::fmt;

use axum::http::Method;
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::error::{CacheError, Result};
use crate::worker::WorkerConfig;

/// How a GET request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    StaleWhileRevalidate,
    NetworkFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkFirst => "network-first",
        };
        f.write_str(name)
    }
}

// == Route Table ==
/// Compiled classification rules.
///
/// First match wins: an exact critical-asset path, then any dynamic
/// pattern, then the network-first default.
#[derive(Debug, Clone)]
pub struct RouteTable {
    critical_paths: HashSet<String>,
    dynamic_patterns: Vec<Regex>,
}

impl RouteTable {
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let dynamic_patterns = config
            .dynamic_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    CacheError::InvalidRequest(format!("bad route pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            critical_paths: config.critical_assets.iter().cloned().collect(),
            dynamic_patterns,
        })
    }

    /// Strategy for the request, or `None` when it must bypass the caches.
    pub fn classify(&self, method: &Method, url: &Url) -> Option<Strategy> {
        if *method != Method::GET {
            return None;
        }

        if self.critical_paths.contains(url.path()) {
            Some(Strategy::CacheFirst)
        } else if self
            .dynamic_patterns
            .iter()
            .any(|pattern| pattern.is_match(url.as_str()))
        {
            Some(Strategy::StaleWhileRevalidate)
        } else {
            Some(Strategy::NetworkFirst)
        }
    }
}
