//! Remote card catalog client.
//!
//! The catalog exposes a paginated listing endpoint
//! (`/api/search/v1/cards?offset=&limit=`) and plain byte-stream image URLs.
//! The client classifies failures as transient or permanent and retries
//! transient ones with exponential backoff; the acquisition pipeline itself
//! never retries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CardlensError, Result};

/// Image renditions published for each print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Small,
    Normal,
    Large,
}

/// One print record from the catalog listing.
///
/// Only the fields the pipeline interprets are typed; everything else is
/// captured in `extra` so the record can be persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintRecord {
    pub print_id: String,
    #[serde(default)]
    pub card_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub pitch: Option<String>,
    #[serde(default)]
    pub image: HashMap<ImageSize, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PrintRecord {
    /// URL of the given image rendition, if published.
    pub fn image_url(&self, size: ImageSize) -> Option<&str> {
        self.image.get(&size).map(String::as_str)
    }

    /// File name for the large rendition: the final non-empty path segment of
    /// its URL.
    pub fn image_name(&self) -> Option<String> {
        let raw = self.image_url(ImageSize::Large)?;
        let parsed = url::Url::parse(raw).ok()?;
        parsed
            .path_segments()?
            .rev()
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// The full record as JSON, for verbatim storage.
    pub fn raw_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One page of the catalog listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PrintPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<PrintRecord>,
}

/// A paginated source of print records and their image bytes.
#[async_trait]
pub trait CardCatalog: Send + Sync {
    /// Fetch one listing page.
    async fn fetch_page(&self, offset: u32, limit: u32) -> Result<PrintPage>;

    /// Fetch reference image bytes from a record's image URL.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

/// Configuration for the HTTP catalog client.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Catalog base URL.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cards.fabtcg.com".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
        }
    }
}

/// HTTP catalog client with retry and backoff.
pub struct HttpCatalog {
    client: Client,
    config: CatalogConfig,
}

impl HttpCatalog {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CardlensError::Fetch(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }

    async fn get_once(
        &self,
        url: &str,
        what: &str,
    ) -> std::result::Result<reqwest::Response, backoff::Error<CardlensError>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if is_transient_error(&e) {
                warn!(error = %e, url, "transient error, will retry");
                backoff::Error::transient(CardlensError::Fetch(format!(
                    "transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, url, "permanent error, aborting");
                backoff::Error::permanent(CardlensError::Fetch(format!(
                    "{what} request failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let err = CardlensError::Fetch(format!("{what} returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, url, "transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, url, "permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        Ok(response)
    }

    async fn get_with_retry(&self, url: &str, what: &str) -> Result<reqwest::Response> {
        retry_notify(
            self.build_backoff(),
            || async { self.get_once(url, what).await },
            |err: CardlensError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "retry scheduled"
                );
            },
        )
        .await
    }
}

#[async_trait]
impl CardCatalog for HttpCatalog {
    async fn fetch_page(&self, offset: u32, limit: u32) -> Result<PrintPage> {
        let url = format!(
            "{}/api/search/v1/cards?offset={offset}&limit={limit}",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(offset, limit, "fetching catalog page");

        let response = self.get_with_retry(&url, "catalog listing").await?;
        let page: PrintPage = response
            .json()
            .await
            .map_err(|e| CardlensError::Fetch(format!("failed to parse listing page: {e}")))?;

        debug!(
            count = page.count,
            results = page.results.len(),
            has_next = page.next.is_some(),
            "catalog page received"
        );
        Ok(page)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get_with_retry(url, "image download").await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardlensError::Fetch(format!("failed to read image body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Check if a reqwest error is transient and should be retried.
fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
