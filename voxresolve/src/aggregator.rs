//! HTTP client for the link-aggregation service
//!
//! Talks to an Odesli-style endpoint: `GET {base}/links?url={reference}`
//! returns, among other things, a `linksByPlatform` map carrying the
//! equivalent link on each platform the service knows about. Only the audio
//! platform's entry is of interest here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::reference::SourceRef;
use crate::resolver::AggregationService;

/// Default aggregation API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.song.link/v1-alpha.1";

/// Default timeout for aggregation requests (15 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// `linksByPlatform` key for the audio platform
const AUDIO_PLATFORM_KEY: &str = "youtube";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksResponse {
    #[serde(default)]
    links_by_platform: HashMap<String, PlatformLink>,
}

#[derive(Debug, Deserialize)]
struct PlatformLink {
    url: String,
}

/// Aggregation-service HTTP client.
///
/// Stateless; rate limiting lives in [`crate::RequestThrottle`], which every
/// caller must hold a permit from while calling this client.
#[derive(Debug, Clone)]
pub struct LinkAggregator {
    client: Client,
    base_url: String,
}

impl LinkAggregator {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> LinkAggregatorBuilder {
        LinkAggregatorBuilder::default()
    }
}

#[async_trait]
impl AggregationService for LinkAggregator {
    async fn equivalent_audio_link(&self, source: &SourceRef) -> Result<Option<String>> {
        let endpoint = format!("{}/links", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .query(&[("url", source.raw.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(Error::QuotaExhausted),
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(Error::BadResponse(format!(
                    "aggregation service returned HTTP {status}"
                )));
            }
            _ => {}
        }

        let body: LinksResponse = response.json().await?;
        let link = body
            .links_by_platform
            .get(AUDIO_PLATFORM_KEY)
            .map(|l| l.url.clone());

        debug!(
            reference = %source,
            platforms = body.links_by_platform.len(),
            found = link.is_some(),
            "aggregation lookup"
        );
        Ok(link)
    }
}

/// Builder for [`LinkAggregator`].
#[derive(Debug)]
pub struct LinkAggregatorBuilder {
    base_url: String,
    timeout: Duration,
}

impl Default for LinkAggregatorBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl LinkAggregatorBuilder {
    /// Override the API base URL (no trailing slash).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<LinkAggregator> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(LinkAggregator {
            client,
            base_url: self.base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_response_parses_odesli_shape() {
        let json = r#"{
            "entityUniqueId": "SPOTIFY_SONG::4uLU6hMCjMI",
            "linksByPlatform": {
                "youtube": { "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" },
                "deezer": { "url": "https://www.deezer.com/track/3135556" }
            }
        }"#;
        let parsed: LinksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.links_by_platform.get(AUDIO_PLATFORM_KEY).unwrap().url,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn links_response_tolerates_missing_map() {
        let parsed: LinksResponse = serde_json::from_str(r#"{"entityUniqueId":"x"}"#).unwrap();
        assert!(parsed.links_by_platform.is_empty());
    }
}
