//! HTTP registry client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sctv_models::StreamDescriptor;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RegistryError, RegistryResult};
use crate::response::{parse_descriptors, unwrap_stream_list};
use crate::StreamRegistry;

/// Path of the active-camera listing, relative to the API base.
pub const ACTIVE_STREAMS_PATH: &str = "/api/v1/stream/cameras/active";

/// Configuration for the registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the streaming API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:44322".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Full URL of the active-stream listing.
    pub fn active_streams_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), ACTIVE_STREAMS_PATH)
    }

    /// Local development APIs run on self-signed certificates.
    pub fn is_local(&self) -> RegistryResult<bool> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        Ok(matches!(
            url.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
        ))
    }
}

/// Registry client for the streaming API.
pub struct RegistryClient {
    http: Client,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Create a new registry client.
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let local = config.is_local()?;
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(local)
            .build()?;

        if local {
            debug!("Registry is local, accepting self-signed certificates");
        }

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Fetch and unwrap the active-stream listing.
    pub async fn fetch_active(&self) -> RegistryResult<Vec<StreamDescriptor>> {
        let url = self.config.active_streams_url();
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RegistryError::BadStatus(response.status().as_u16()));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Registry returned unparsable body, treating as empty: {}", e);
            Value::Null
        });

        let descriptors = parse_descriptors(unwrap_stream_list(body));
        debug!("Registry listed {} active streams", descriptors.len());
        Ok(descriptors)
    }
}

#[async_trait]
impl StreamRegistry for RegistryClient {
    async fn active_streams(&self) -> RegistryResult<Vec<StreamDescriptor>> {
        self.fetch_active().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_url_joins_cleanly() {
        let config = RegistryConfig {
            base_url: "http://api:5004/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.active_streams_url(),
            "http://api:5004/api/v1/stream/cameras/active"
        );
    }

    #[test]
    fn test_local_detection() {
        assert!(RegistryConfig::default().is_local().unwrap());

        let remote = RegistryConfig {
            base_url: "https://streaming.example.com".to_string(),
            ..Default::default()
        };
        assert!(!remote.is_local().unwrap());

        let broken = RegistryConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(broken.is_local().is_err());
    }
}
