//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{fetcher, CacheStats, Fetcher, Strategy, TieredCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetQuery, GetResponse, HealthResponse, SetRequest, SetResponse,
};

/// Origin server fetched on cache misses.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// A fetcher for `GET {base_url}/{key}` expecting a JSON body.
    pub fn fetcher(&self, key: &str) -> Fetcher<Value> {
        let client = self.client.clone();
        let url = format!("{}/{}", self.base_url, key);
        fetcher(move || async move {
            debug!(url = %url, "Fetching from upstream");
            let value = client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;
            Ok(value)
        })
    }
}

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: TieredCache,
    pub upstream: Option<Upstream>,
}

impl AppState {
    /// Creates a new AppState serving `cache` with no upstream.
    pub fn new(cache: TieredCache) -> Self {
        Self {
            cache,
            upstream: None,
        }
    }

    pub fn with_upstream(mut self, upstream: Upstream) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(cache: TieredCache, config: &Config) -> Self {
        Self {
            cache,
            upstream: config.upstream_url.as_deref().map(Upstream::new),
        }
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in both tiers.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, &req.value, req.options()).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Reads a value under the requested strategy. Without an upstream the
/// strategy defaults to cache-only.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>> {
    let mut options = query.options()?;
    let fetcher = match &state.upstream {
        Some(upstream) => Some(upstream.fetcher(&key)),
        None => {
            options.strategy.get_or_insert(Strategy::CacheOnly);
            None
        }
    };

    match state.cache.get::<Value>(&key, fetcher, options).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
///
/// Drops both tiers, including the whole durable store.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear().await?;

    Ok(Json(ClearResponse::new()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.janitor().is_running()))
}
