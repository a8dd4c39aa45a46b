//! Bounded-concurrency acquisition of reference card images.
//!
//! The pipeline walks the catalog listing page by page, skips prints that are
//! already indexed, and runs each remaining candidate as one unit of work:
//! download the image, fingerprint it, insert it into the card index. At most
//! `max_concurrency` units are in flight at once; the driver loop is the sole
//! owner of the success/failure tally, so no counters are shared across
//! units. Per-unit failures are counted and the run continues; only a failed
//! listing fetch (no further candidates obtainable) propagates out of
//! [`AcquisitionPipeline::run`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::{CardCatalog, ImageSize, PrintRecord};
use crate::error::{CardlensError, Result};
use crate::fingerprint::ImageHasher;
use crate::index::{CardIndex, ReferenceCard};

/// Default cap on simultaneously in-flight download units.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;
/// Default listing page size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Final tally of an acquisition run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Units that inserted a new card.
    pub succeeded: u64,
    /// Units that failed (fetch, decode, or storage).
    pub failed: u64,
}

/// Handle for requesting a graceful stop of a running acquisition.
///
/// Cancelling stops the dispatch of new candidates; units already in flight
/// are drained and counted before the run returns.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives catalog pagination into bounded parallel download units.
pub struct AcquisitionPipeline<C, I, H> {
    catalog: Arc<C>,
    index: Arc<I>,
    hasher: Arc<H>,
    max_concurrency: usize,
    page_size: u32,
    cancel: CancelFlag,
}

impl<C, I, H> AcquisitionPipeline<C, I, H>
where
    C: CardCatalog + 'static,
    I: CardIndex + 'static,
    H: ImageHasher + 'static,
{
    pub fn new(catalog: Arc<C>, index: Arc<I>, hasher: Arc<H>) -> Self {
        Self {
            catalog,
            index,
            hasher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            cancel: CancelFlag::default(),
        }
    }

    /// Cap on simultaneously in-flight units (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Listing page size (at least 1).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// A flag that can stop this run from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the acquisition to completion (or cancellation) and report counts.
    pub async fn run(&self) -> Result<AcquisitionReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut units: JoinSet<std::result::Result<(), CardlensError>> = JoinSet::new();
        let mut report = AcquisitionReport::default();
        let mut offset = 0u32;

        'pages: loop {
            if self.cancel.is_cancelled() {
                break 'pages;
            }

            let page = match self.catalog.fetch_page(offset, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, offset, "listing page fetch failed, draining in-flight units");
                    drain(&mut units, &mut report).await;
                    return Err(e);
                }
            };

            if page.results.is_empty() {
                break;
            }
            let has_next = page.next.is_some();

            for record in page.results {
                if self.cancel.is_cancelled() {
                    break 'pages;
                }

                // Free completed slots and fold their outcomes in.
                while let Some(outcome) = units.try_join_next() {
                    tally(&mut report, outcome);
                }

                let image_name = match record.image_name() {
                    Some(name) => name,
                    None => {
                        warn!(print_id = %record.print_id, "record has no large image URL");
                        report.failed += 1;
                        continue;
                    }
                };

                match self.already_indexed(&record.print_id, &image_name).await {
                    Ok(true) => {
                        debug!(print_id = %record.print_id, "already indexed, skipping");
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(print_id = %record.print_id, error = %e, "existence check failed");
                        report.failed += 1;
                        continue;
                    }
                }

                // Dispatch blocks here once the cap is reached.
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");

                let catalog = Arc::clone(&self.catalog);
                let index = Arc::clone(&self.index);
                let hasher = Arc::clone(&self.hasher);
                units.spawn(async move {
                    let _permit = permit;
                    process_unit(&*catalog, &*index, &*hasher, record, image_name).await
                });
            }

            if !has_next {
                break;
            }
            offset += self.page_size;
        }

        if self.cancel.is_cancelled() {
            info!("cancellation requested, draining in-flight units");
        }
        drain(&mut units, &mut report).await;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "acquisition complete"
        );
        Ok(report)
    }

    async fn already_indexed(&self, print_id: &str, image: &str) -> Result<bool> {
        Ok(self.index.exists_by_print_id(print_id).await?
            || self.index.exists_by_image(image).await?)
    }
}

/// One unit of work: download, fingerprint, insert.
async fn process_unit<C, I, H>(
    catalog: &C,
    index: &I,
    hasher: &H,
    record: PrintRecord,
    image_name: String,
) -> std::result::Result<(), CardlensError>
where
    C: CardCatalog + ?Sized,
    I: CardIndex + ?Sized,
    H: ImageHasher + ?Sized,
{
    let url = record
        .image_url(ImageSize::Large)
        .ok_or_else(|| CardlensError::Fetch("record has no large image URL".into()))?;

    let bytes = catalog.fetch_image(url).await?;
    let fingerprint = hasher.hash_bytes(&bytes)?;

    let card = ReferenceCard {
        print_id: record.print_id.clone(),
        name: record.name.clone(),
        pitch: record.pitch.clone(),
        raw_data: record.raw_json(),
        image: image_name,
        fingerprint,
    };
    index.insert(&card, &bytes).await?;

    info!(print_id = %card.print_id, image = %card.image, "saved card");
    Ok(())
}

fn tally(
    report: &mut AcquisitionReport,
    outcome: std::result::Result<std::result::Result<(), CardlensError>, tokio::task::JoinError>,
) {
    match outcome {
        Ok(Ok(())) => report.succeeded += 1,
        Ok(Err(e @ CardlensError::Storage(_))) => {
            warn!(error = %e, "storage failure while saving card");
            report.failed += 1;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "download unit failed");
            report.failed += 1;
        }
        Err(e) => {
            warn!(error = %e, "download unit panicked");
            report.failed += 1;
        }
    }
}

async fn drain(
    units: &mut JoinSet<std::result::Result<(), CardlensError>>,
    report: &mut AcquisitionReport,
) {
    while let Some(outcome) = units.join_next().await {
        tally(report, outcome);
    }
}
