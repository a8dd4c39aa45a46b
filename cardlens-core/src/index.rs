//! The card index contract consumed by the acquisition pipeline and the
//! matching engine.
//!
//! Concrete storage lives with the application (the CLI ships a SQLite-backed
//! implementation); the core only relies on this trait. An in-memory
//! implementation is provided for tests and experimentation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// Errors raised by a card index implementation.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Database connection failed
    #[error("database connection error: {0}")]
    Connection(String),

    /// Migration execution failed
    #[error("migration error: {0}")]
    Migration(String),

    /// Query execution failed
    #[error("query error: {0}")]
    Query(String),

    /// Image bytes could not be written or removed
    #[error("image store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be interpreted
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// One indexed reference card.
///
/// Created exclusively by the acquisition pipeline after a successful
/// download and hash; immutable once written. `print_id` and `image` are each
/// unique across the index.
#[derive(Debug, Clone)]
pub struct ReferenceCard {
    /// Stable print identifier from the remote catalog.
    pub print_id: String,
    /// Card name.
    pub name: String,
    /// Pitch attribute, when the catalog provides one.
    pub pitch: Option<String>,
    /// The raw catalog record, stored verbatim.
    pub raw_data: serde_json::Value,
    /// File name of the downloaded reference image.
    pub image: String,
    /// Perceptual fingerprint of the reference image.
    pub fingerprint: Fingerprint,
}

/// The (image, fingerprint) projection used by the matching engine.
#[derive(Debug, Clone)]
pub struct IndexedFingerprint {
    pub image: String,
    pub fingerprint: Fingerprint,
}

/// Persistence contract for reference cards.
#[async_trait]
pub trait CardIndex: Send + Sync {
    /// Whether a card with this print identifier is already indexed.
    async fn exists_by_print_id(&self, print_id: &str) -> Result<bool, IndexError>;

    /// Whether an image with this file name is already indexed.
    async fn exists_by_image(&self, image: &str) -> Result<bool, IndexError>;

    /// Persist a card entry together with its image bytes.
    ///
    /// Atomic: after a failure, neither the metadata row nor the image bytes
    /// may be visible to readers.
    async fn insert(&self, card: &ReferenceCard, image_bytes: &[u8]) -> Result<(), IndexError>;

    /// Materialize every (image, fingerprint) pair in the index.
    async fn list_fingerprints(&self) -> Result<Vec<IndexedFingerprint>, IndexError>;
}

#[derive(Default)]
struct MemoryInner {
    cards: Vec<ReferenceCard>,
    images: HashMap<String, Vec<u8>>,
}

/// In-memory card index for tests and experimentation.
#[derive(Default)]
pub struct MemoryCardIndex {
    inner: Mutex<MemoryInner>,
}

impl MemoryCardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed cards.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("index lock poisoned").cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored bytes for an image name, if present.
    pub fn image_bytes(&self, image: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("index lock poisoned")
            .images
            .get(image)
            .cloned()
    }
}

#[async_trait]
impl CardIndex for MemoryCardIndex {
    async fn exists_by_print_id(&self, print_id: &str) -> Result<bool, IndexError> {
        let inner = self.inner.lock().expect("index lock poisoned");
        Ok(inner.cards.iter().any(|c| c.print_id == print_id))
    }

    async fn exists_by_image(&self, image: &str) -> Result<bool, IndexError> {
        let inner = self.inner.lock().expect("index lock poisoned");
        Ok(inner.images.contains_key(image))
    }

    async fn insert(&self, card: &ReferenceCard, image_bytes: &[u8]) -> Result<(), IndexError> {
        let mut inner = self.inner.lock().expect("index lock poisoned");
        if inner.cards.iter().any(|c| c.print_id == card.print_id) {
            return Err(IndexError::Query(format!(
                "duplicate print_id: {}",
                card.print_id
            )));
        }
        if inner.images.contains_key(&card.image) {
            return Err(IndexError::Query(format!(
                "duplicate image: {}",
                card.image
            )));
        }
        inner.images.insert(card.image.clone(), image_bytes.to_vec());
        inner.cards.push(card.clone());
        Ok(())
    }

    async fn list_fingerprints(&self) -> Result<Vec<IndexedFingerprint>, IndexError> {
        let inner = self.inner.lock().expect("index lock poisoned");
        Ok(inner
            .cards
            .iter()
            .map(|c| IndexedFingerprint {
                image: c.image.clone(),
                fingerprint: c.fingerprint.clone(),
            })
            .collect())
    }
}
