//! CLI configuration
//!
//! Loaded from environment variables with sensible defaults; no config files.

use std::path::PathBuf;

use cardlens_core::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_SIZE, DEFAULT_TOP_K};

/// Runtime configuration shared by all commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Index database path (default: ./state/cards.db)
    pub db_path: PathBuf,
    /// Directory holding downloaded reference images (default: ./state/cards)
    pub images_dir: PathBuf,
    /// Remote catalog base URL
    pub catalog_url: String,
    /// Listing page size
    pub page_size: u32,
    /// Download concurrency cap
    pub max_concurrency: usize,
    /// Number of match results to print
    pub top_k: usize,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,
    /// Default snapshot feed for the scan command
    pub feed_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./state/cards.db"),
            images_dir: PathBuf::from("./state/cards"),
            catalog_url: "https://cards.fabtcg.com".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            top_k: DEFAULT_TOP_K,
            http_timeout_secs: 30,
            feed_url: "http://127.0.0.1:8080/shot.jpg".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db_path = std::env::var("CARDLENS_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let images_dir = std::env::var("CARDLENS_IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.images_dir);

        let catalog_url = std::env::var("CARDLENS_CATALOG_URL").unwrap_or(defaults.catalog_url);

        let page_size = std::env::var("CARDLENS_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.page_size);

        let max_concurrency = std::env::var("CARDLENS_MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_concurrency);

        let top_k = std::env::var("CARDLENS_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.top_k);

        let http_timeout_secs = std::env::var("CARDLENS_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.http_timeout_secs);

        let feed_url = std::env::var("CARDLENS_FEED_URL").unwrap_or(defaults.feed_url);

        Self {
            db_path,
            images_dir,
            catalog_url,
            page_size,
            max_concurrency,
            top_k,
            http_timeout_secs,
            feed_url,
        }
    }
}
