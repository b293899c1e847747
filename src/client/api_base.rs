use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{client::quiz_client_error::QuizClientError, config::config::ApiConfig};

pub const DEFAULT_API_BASE: &str = "http://localhost:3001";

/// Origin every session call is issued against. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self(origin.trim().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryResponse {
    api_base: Option<String>,
}

/// Picks the configured origin, falls back to the discovery endpoint and
/// finally to the local default. Discovery failures are not fatal.
pub async fn resolve_api_base(config: &ApiConfig, client: &Client) -> ApiBase {
    if let Some(base_url) = config.base_url.as_deref().filter(|url| !url.trim().is_empty()) {
        info!("Using configured api base: {}", base_url);
        return ApiBase::new(base_url);
    }

    if let Some(discovery_url) = config.discovery_url.as_deref() {
        match discover(discovery_url, client).await {
            Ok(Some(base)) => {
                info!("Discovered api base: {}", base.as_str());
                return base;
            }
            Ok(None) => warn!("Discovery at {} returned no api base", discovery_url),
            Err(e) => warn!("Failed to discover api base at {}: {}", discovery_url, e),
        }
    }

    info!("Falling back to default api base: {}", DEFAULT_API_BASE);
    ApiBase::new(DEFAULT_API_BASE)
}

async fn discover(discovery_url: &str, client: &Client) -> Result<Option<ApiBase>, QuizClientError> {
    let response = client.get(discovery_url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(QuizClientError::Api(status, body));
    }

    let discovery: DiscoveryResponse = serde_json::from_str(&body)?;
    Ok(discovery
        .api_base
        .filter(|base| !base.trim().is_empty())
        .map(ApiBase::new))
}
