//! Match command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use cardlens_core::{Blockhash64Hasher, ImageHasher, Matcher};

use crate::config::Config;
use crate::store::SqliteCardIndex;

/// Execute the match command.
pub async fn execute(config: Config, image: PathBuf, top: Option<usize>) -> Result<()> {
    let k = top.unwrap_or(config.top_k);

    let index = SqliteCardIndex::open(&config.db_path, &config.images_dir)
        .await
        .context("failed to open the card index")?;

    let matcher = Matcher::load(&index)
        .await
        .context("failed to load fingerprints")?;
    if matcher.is_empty() {
        println!(
            "{}",
            "The card index is empty - run `cardlens download` first.".yellow()
        );
        return Ok(());
    }
    info!(entries = matcher.len(), "fingerprint index loaded");

    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image: {}", image.display()))?;
    let query = Blockhash64Hasher
        .hash_bytes(&bytes)
        .context("could not fingerprint the input image")?;

    let results = matcher.rank(&query, k);

    println!("Top matches:");
    for result in &results {
        println!(
            "   {:>3}%  {}",
            result.similarity_percent(),
            result.image.bold()
        );
    }

    Ok(())
}
