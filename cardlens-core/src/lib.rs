//! Cardlens Core - trading-card acquisition and visual matching library
//!
//! This crate provides the building blocks for recognizing physical trading
//! cards from photographs:
//!
//! - Perceptual fingerprinting of card images (Blockhash64)
//! - Card boundary detection and perspective rectification of camera frames
//! - A paginated remote-catalog client with retry and backoff
//! - A bounded-concurrency pipeline that downloads, deduplicates, and indexes
//!   reference images
//! - A top-K matching engine over the fingerprint index
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardlens_core::{
//!     AcquisitionPipeline, Blockhash64Hasher, CatalogConfig, HttpCatalog, ImageHasher,
//!     Matcher, MemoryCardIndex,
//! };
//!
//! # async fn example() -> cardlens_core::Result<()> {
//! let catalog = Arc::new(HttpCatalog::new(CatalogConfig::default())?);
//! let index = Arc::new(MemoryCardIndex::new());
//! let hasher = Arc::new(Blockhash64Hasher::default());
//!
//! let report = AcquisitionPipeline::new(catalog, Arc::clone(&index), Arc::clone(&hasher))
//!     .run()
//!     .await?;
//! println!("saved {} cards ({} failures)", report.succeeded, report.failed);
//!
//! let photo = std::fs::read("photo.jpg").expect("readable file");
//! let query = hasher.hash_bytes(&photo)?;
//! let matcher = Matcher::load(&*index).await?;
//! for result in matcher.rank(&query, 5) {
//!     println!("{}% {}", result.similarity_percent(), result.image);
//! }
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod catalog;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod matcher;
pub mod rectify;

// Re-export main types for convenience
pub use acquire::{
    AcquisitionPipeline, AcquisitionReport, CancelFlag, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_PAGE_SIZE,
};
pub use catalog::{CardCatalog, CatalogConfig, HttpCatalog, ImageSize, PrintPage, PrintRecord};
pub use error::{CardlensError, Result};
pub use fingerprint::{Blockhash64Hasher, Fingerprint, ImageHasher, FINGERPRINT_SIZE};
pub use index::{CardIndex, IndexError, IndexedFingerprint, MemoryCardIndex, ReferenceCard};
pub use matcher::{MatchResult, Matcher, TopK, DEFAULT_TOP_K};
pub use rectify::{FrameRectifier, CARD_HEIGHT, CARD_WIDTH};
