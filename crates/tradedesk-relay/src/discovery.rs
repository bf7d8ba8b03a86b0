//! Feed endpoint discovery.

use crate::error::RelayResult;
use async_trait::async_trait;

/// Resolves the live-feed WebSocket URL.
#[async_trait]
pub trait EndpointDiscovery: Send + Sync {
    async fn discover(&self) -> RelayResult<String>;
}

/// Fixed endpoint, no network call.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub String);

#[async_trait]
impl EndpointDiscovery for StaticEndpoint {
    async fn discover(&self) -> RelayResult<String> {
        Ok(self.0.clone())
    }
}

/// Endpoint with its query string and fragment removed.
///
/// Feed URLs carry the API token as a query parameter; log this instead.
pub fn redact_endpoint(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
