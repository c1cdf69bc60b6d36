//! Page fetcher backed by reqwest.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::application::clip::{FetchError, PageFetcher};

use super::error::InfraError;

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

/// Statuses 200 through 399 count as success.
fn is_success(status: u16) -> bool {
    status / 200 == 1
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let started_at = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| {
                warn!(
                    target = "webclip::infra::fetch",
                    url = %url,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Source page request failed"
                );
                FetchError::transport(err)
            })?;

        let status = response.status().as_u16();
        if !is_success(status) {
            return Err(FetchError::Status { status });
        }

        let body = response.text().await.map_err(FetchError::transport)?;
        debug!(
            target = "webclip::infra::fetch",
            url = %url,
            status,
            bytes = body.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Source page fetched"
        );
        Ok(body)
    }
}
