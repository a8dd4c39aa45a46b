//! Download command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use cardlens_core::{AcquisitionPipeline, Blockhash64Hasher, CatalogConfig, HttpCatalog};

use crate::config::Config;
use crate::store::SqliteCardIndex;

/// Execute the download command.
pub async fn execute(config: Config, concurrency: Option<usize>) -> Result<()> {
    let index = Arc::new(
        SqliteCardIndex::open(&config.db_path, &config.images_dir)
            .await
            .context("failed to open the card index")?,
    );

    let catalog = Arc::new(
        HttpCatalog::new(CatalogConfig {
            base_url: config.catalog_url.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
            ..CatalogConfig::default()
        })
        .context("failed to create catalog client")?,
    );

    let max_concurrency = concurrency.unwrap_or(config.max_concurrency);
    info!(
        catalog = %config.catalog_url,
        max_concurrency,
        "starting acquisition"
    );

    let pipeline = AcquisitionPipeline::new(catalog, index, Arc::new(Blockhash64Hasher))
        .with_max_concurrency(max_concurrency)
        .with_page_size(config.page_size);

    // Ctrl-C stops dispatch; in-flight downloads are drained, not dropped.
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupt received - finishing in-flight downloads".yellow()
            );
            cancel.cancel();
        }
    });

    let report = pipeline.run().await.context("acquisition failed")?;

    println!();
    println!("{}", "Download complete".green().bold());
    println!();
    println!("   {} {}", "Saved:".dimmed(), report.succeeded);
    println!("   {} {}", "Failed:".dimmed(), report.failed);

    Ok(())
}
