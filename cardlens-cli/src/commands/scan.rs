//! Scan command implementation: continuous frame-by-frame matching against a
//! camera snapshot feed.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{debug, warn};

use cardlens_core::{Blockhash64Hasher, FrameRectifier, ImageHasher, MatchResult, Matcher};

use crate::config::Config;
use crate::store::SqliteCardIndex;

/// Execute the scan command.
///
/// Pulls one JPEG frame per request from the snapshot endpoint, rectifies and
/// matches each frame, and prints the best match. Frames without a detectable
/// card boundary are skipped. Ctrl-C exits.
pub async fn execute(config: Config, feed_url: Option<String>, no_rectify: bool) -> Result<()> {
    let feed_url = feed_url.unwrap_or_else(|| config.feed_url.clone());

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

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .context("failed to create HTTP client")?;

    let hasher = Blockhash64Hasher;
    let rectifier = FrameRectifier::new();

    println!("Scanning {} - press Ctrl-C to stop", feed_url.bold());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Scan stopped".green());
                break;
            }
            frame = fetch_frame(&client, &feed_url) => {
                match frame {
                    Ok(bytes) => {
                        if let Some(best) =
                            frame_best_match(&bytes, no_rectify, &rectifier, &hasher, &matcher)
                        {
                            println!(
                                "best match: {} ({}%)",
                                best.image.bold(),
                                best.similarity_percent()
                            );
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "could not read camera frame");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn fetch_frame(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Rectify (unless disabled), fingerprint, and rank one frame.
fn frame_best_match(
    bytes: &[u8],
    no_rectify: bool,
    rectifier: &FrameRectifier,
    hasher: &Blockhash64Hasher,
    matcher: &Matcher,
) -> Option<MatchResult> {
    let frame = match image::load_from_memory(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "frame is not a decodable image");
            return None;
        }
    };

    let query = if no_rectify {
        hasher.hash_image(&frame)
    } else {
        let card = rectifier.rectify(&frame)?;
        hasher.hash_image(&card)
    };

    matcher.rank(&query, 1).into_iter().next()
}
