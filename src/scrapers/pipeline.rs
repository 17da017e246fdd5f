//! Paginated scraping, listing deduplication and job bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::traits::ListingSource;
use super::types::{
    NormalizedListing, PageCursor, ScrapeBatch, ScrapeError, ScrapeFilters, ScrapeProgress,
    ScrapeRequest, UpsertOutcome,
};
use crate::error::{Result, StoreError};
use crate::models::{JobStatus, ScrapeSource, ScrapedListing, ScrapingJob};
use crate::store::Store;

struct PageState {
    next: Option<PageCursor>,
    progress: ScrapeProgress,
    filters: ScrapeFilters,
    max_pages: u32,
}

/// Lazily scrape up to `request.pages` pages from `source`.
///
/// Yields one batch per page in page order. Nothing is fetched until the
/// stream is polled, and the next page is only requested after the consumer
/// asks for it, so at most one fetch is in flight. The stream ends after
/// `request.pages` batches, when the source reports no further page, or right
/// after yielding the first error.
pub fn scrape_pages<'a>(
    source: &'a dyn ListingSource,
    request: ScrapeRequest,
    page_delay: Duration,
) -> impl Stream<Item = std::result::Result<ScrapeBatch, ScrapeError>> + Send + 'a {
    let seed = PageState {
        next: Some(PageCursor::first()),
        progress: ScrapeProgress::default(),
        filters: request.filters,
        max_pages: request.pages,
    };

    stream::unfold(seed, move |mut state| async move {
        if state.progress.pages_scraped >= state.max_pages {
            return None;
        }
        let cursor = state.next.take()?;

        if state.progress.pages_scraped > 0 && !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }

        match source.fetch_page(&cursor, &state.filters).await {
            Ok(page) => {
                state.progress.pages_scraped += 1;
                state.progress.listings_found += page.listings.len() as u32;
                state.next = page.next_cursor;

                let batch = ScrapeBatch {
                    page: cursor.page,
                    listings: page.listings,
                    progress: state.progress,
                };
                Some((Ok(batch), state))
            }
            // `state.next` is already empty, so the stream ends after this item
            Err(e) => Some((Err(e), state)),
        }
    })
}

fn new_listing(source: ScrapeSource, listing: &NormalizedListing) -> ScrapedListing {
    let now = Utc::now();
    ScrapedListing {
        id: Uuid::new_v4(),
        source,
        external_id: listing.external_id.clone(),
        url: listing.url.clone(),
        title: listing.title.clone(),
        description: listing.description.clone(),
        price: listing.price,
        currency: listing.currency.clone(),
        operation: listing.operation,
        property_type: listing.property_type.clone(),
        address: listing.address.clone(),
        city: listing.city.clone(),
        state: listing.state.clone(),
        bedrooms: listing.bedrooms,
        bathrooms: listing.bathrooms,
        area_m2: listing.area_m2,
        images: listing.images.clone(),
        raw_data: listing.raw_data.clone(),
        first_seen_at: now,
        scraped_at: now,
        imported: false,
        property_id: None,
    }
}

/// Refresh the mutable fields of a stored listing, keeping its identity
/// and import state.
fn refreshed(existing: ScrapedListing, listing: &NormalizedListing) -> ScrapedListing {
    ScrapedListing {
        url: listing.url.clone(),
        title: listing.title.clone(),
        description: listing.description.clone(),
        price: listing.price,
        currency: listing.currency.clone(),
        operation: listing.operation,
        property_type: listing.property_type.clone(),
        address: listing.address.clone(),
        city: listing.city.clone(),
        state: listing.state.clone(),
        bedrooms: listing.bedrooms,
        bathrooms: listing.bathrooms,
        area_m2: listing.area_m2,
        images: listing.images.clone(),
        raw_data: listing.raw_data.clone(),
        scraped_at: Utc::now(),
        ..existing
    }
}

/// Insert or refresh one listing keyed by exact `(source, external_id)`.
///
/// Only a price or title change counts as an update; anything else is a
/// duplicate and nothing is written. Listings with a different external id
/// are never matched, even when they describe the same property.
pub async fn upsert_listing(
    store: &dyn Store,
    source: ScrapeSource,
    listing: &NormalizedListing,
) -> std::result::Result<UpsertOutcome, StoreError> {
    match store.find_scraped_listing(source, &listing.external_id).await? {
        None => {
            store.insert_scraped_listing(&new_listing(source, listing)).await?;
            Ok(UpsertOutcome::New)
        }
        Some(existing) if existing.price != listing.price || existing.title != listing.title => {
            store
                .update_scraped_listing(&refreshed(existing, listing))
                .await?;
            Ok(UpsertOutcome::Updated)
        }
        Some(_) => Ok(UpsertOutcome::Duplicate),
    }
}

/// Runs a scrape as a tracked job
pub struct ScrapeRunner {
    store: Arc<dyn Store>,
    page_delay: Duration,
}

impl ScrapeRunner {
    pub fn new(store: Arc<dyn Store>, page_delay: Duration) -> Self {
        Self { store, page_delay }
    }

    /// Scrape, upsert every listing and keep the job's counters current.
    ///
    /// A failing page ends the job as `failed` and keeps the counts gathered
    /// so far; that is returned as `Ok`. Store errors are returned as `Err`
    /// after a best-effort attempt to mark the job failed.
    pub async fn run(
        &self,
        agency_id: Uuid,
        source: &dyn ListingSource,
        request: ScrapeRequest,
    ) -> Result<ScrapingJob> {
        let mut job = ScrapingJob {
            id: Uuid::new_v4(),
            agency_id,
            source: source.source(),
            pages_requested: saturating_i32(request.pages),
            city: request.filters.city.clone(),
            operation: request.filters.operation,
            pages_scraped: 0,
            listings_found: 0,
            listings_new: 0,
            listings_updated: 0,
            listings_duplicate: 0,
            status: JobStatus::Running,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.store.create_scraping_job(&job).await?;
        info!(job_id = %job.id, source = %job.source, pages = request.pages, "🔎 Scraping job started");

        let outcome = self.consume(&mut job, source, request).await;

        job.completed_at = Some(Utc::now());
        match outcome {
            Ok(()) => {
                job.status = JobStatus::Completed;
                self.store.update_scraping_job(&job).await?;
                info!(
                    job_id = %job.id,
                    pages = job.pages_scraped,
                    found = job.listings_found,
                    new = job.listings_new,
                    updated = job.listings_updated,
                    duplicate = job.listings_duplicate,
                    "✅ Scraping job completed"
                );
                Ok(job)
            }
            Err(ScrapeError::Store(e)) => {
                job.status = JobStatus::Failed;
                job.error_message = Some(e.to_string());
                if let Err(update_err) = self.store.update_scraping_job(&job).await {
                    error!(job_id = %job.id, error = %update_err, "Could not record job failure");
                }
                Err(e.into())
            }
            Err(e) => {
                warn!(job_id = %job.id, pages = job.pages_scraped, error = %e, "Scraping job failed");
                job.status = JobStatus::Failed;
                job.error_message = Some(e.to_string());
                self.store.update_scraping_job(&job).await?;
                Ok(job)
            }
        }
    }

    async fn consume(
        &self,
        job: &mut ScrapingJob,
        source: &dyn ListingSource,
        request: ScrapeRequest,
    ) -> std::result::Result<(), ScrapeError> {
        let pages = scrape_pages(source, request, self.page_delay);
        futures::pin_mut!(pages);

        while let Some(batch) = pages.next().await {
            let batch = batch?;
            for listing in &batch.listings {
                match upsert_listing(self.store.as_ref(), job.source, listing).await? {
                    UpsertOutcome::New => job.listings_new += 1,
                    UpsertOutcome::Updated => job.listings_updated += 1,
                    UpsertOutcome::Duplicate => job.listings_duplicate += 1,
                }
            }
            job.pages_scraped = saturating_i32(batch.progress.pages_scraped);
            job.listings_found = saturating_i32(batch.progress.listings_found);
            self.store.update_scraping_job(job).await?;

            info!(
                job_id = %job.id,
                page = batch.page,
                listings = batch.listings.len(),
                "Page processed"
            );
        }
        Ok(())
    }
}

/// Job counters are `INTEGER` columns
fn saturating_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;
    use crate::scrapers::sandbox::SandboxSource;
    use crate::scrapers::types::ScrapedPage;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request(pages: u32) -> ScrapeRequest {
        ScrapeRequest {
            pages,
            filters: ScrapeFilters::default(),
        }
    }

    fn listing(external_id: &str, title: &str, price: i64) -> NormalizedListing {
        NormalizedListing {
            external_id: external_id.to_string(),
            url: format!("https://example.com/{}", external_id),
            title: title.to_string(),
            description: None,
            price: Some(price),
            currency: "MXN".to_string(),
            operation: Some(Operation::Sale),
            property_type: None,
            address: None,
            city: Some("Guadalajara".to_string()),
            state: None,
            bedrooms: Some(2),
            bathrooms: None,
            area_m2: None,
            images: vec![],
            raw_data: json!({}),
        }
    }

    /// Fails on one page and counts fetches
    struct FlakySource {
        fail_on: u32,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl ListingSource for FlakySource {
        async fn fetch_page(
            &self,
            cursor: &PageCursor,
            filters: &ScrapeFilters,
        ) -> std::result::Result<ScrapedPage, ScrapeError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if cursor.page == self.fail_on {
                return Err(ScrapeError::Status {
                    portal: ScrapeSource::Sandbox,
                    status: 503,
                    page: cursor.page,
                });
            }
            SandboxSource::new(10, 5).fetch_page(cursor, filters).await
        }

        fn source(&self) -> ScrapeSource {
            ScrapeSource::Sandbox
        }
    }

    #[tokio::test]
    async fn stops_at_requested_pages() {
        let source = SandboxSource::new(10, 4);
        let batches: Vec<_> = scrape_pages(&source, request(3), Duration::ZERO).collect().await;
        assert_eq!(batches.len(), 3);
    }

    #[tokio::test]
    async fn stops_when_source_runs_out() {
        let source = SandboxSource::new(2, 4);
        let batches: Vec<_> = scrape_pages(&source, request(20), Duration::ZERO).collect().await;
        assert_eq!(batches.len(), 2);
    }

    #[tokio::test]
    async fn progress_is_cumulative_and_in_page_order() {
        let source = SandboxSource::new(5, 3);
        let batches: Vec<ScrapeBatch> = scrape_pages(&source, request(4), Duration::ZERO)
            .map(|b| b.unwrap())
            .collect()
            .await;

        let pages: Vec<u32> = batches.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.progress.pages_scraped, i as u32 + 1);
            assert_eq!(batch.progress.listings_found, (i as u32 + 1) * 3);
        }
    }

    #[tokio::test]
    async fn zero_pages_fetches_nothing() {
        let source = FlakySource {
            fail_on: 0,
            fetches: AtomicU32::new(0),
        };
        let batches: Vec<_> = scrape_pages(&source, request(0), Duration::ZERO).collect().await;
        assert!(batches.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_ends_the_stream() {
        let source = FlakySource {
            fail_on: 2,
            fetches: AtomicU32::new(0),
        };
        let items: Vec<_> = scrape_pages(&source, request(5), Duration::ZERO).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_fetching() {
        let source = FlakySource {
            fail_on: 0,
            fetches: AtomicU32::new(0),
        };
        {
            let pages = scrape_pages(&source, request(10), Duration::ZERO);
            futures::pin_mut!(pages);
            pages.next().await.unwrap().unwrap();
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_listing_twice_is_a_duplicate() {
        let store = MemoryStore::new();
        let l = listing("A1", "Casa en Zapopan", 3_000_000);

        let first = upsert_listing(&store, ScrapeSource::Sandbox, &l).await.unwrap();
        let second = upsert_listing(&store, ScrapeSource::Sandbox, &l).await.unwrap();

        assert_eq!(first, UpsertOutcome::New);
        assert_eq!(second, UpsertOutcome::Duplicate);
        assert_eq!(store.scraped_listings().await.len(), 1);
    }

    #[tokio::test]
    async fn price_change_updates_stored_row() {
        let store = MemoryStore::new();
        upsert_listing(&store, ScrapeSource::Sandbox, &listing("A1", "Casa", 3_000_000))
            .await
            .unwrap();
        let before = store.scraped_listings().await[0].clone();

        let outcome = upsert_listing(&store, ScrapeSource::Sandbox, &listing("A1", "Casa", 2_750_000))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        let rows = store.scraped_listings().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, Some(2_750_000));
        assert_eq!(rows[0].id, before.id);
        assert_eq!(rows[0].first_seen_at, before.first_seen_at);
        assert!(rows[0].scraped_at >= before.scraped_at);
    }

    #[tokio::test]
    async fn title_change_updates_stored_row() {
        let store = MemoryStore::new();
        upsert_listing(&store, ScrapeSource::Sandbox, &listing("A1", "Casa", 3_000_000))
            .await
            .unwrap();

        let outcome = upsert_listing(
            &store,
            ScrapeSource::Sandbox,
            &listing("A1", "Casa remodelada", 3_000_000),
        )
        .await
        .unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.scraped_listings().await[0].title, "Casa remodelada");
    }

    #[tokio::test]
    async fn same_external_id_on_another_source_is_new() {
        let store = MemoryStore::new();
        let l = listing("A1", "Casa", 3_000_000);

        upsert_listing(&store, ScrapeSource::Sandbox, &l).await.unwrap();
        let outcome = upsert_listing(&store, ScrapeSource::Inmuebles24, &l).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::New);
        assert_eq!(store.scraped_listings().await.len(), 2);
    }

    #[tokio::test]
    async fn huge_page_request_is_recorded_without_wrapping() {
        let store = Arc::new(MemoryStore::new());
        let runner = ScrapeRunner::new(store.clone(), Duration::ZERO);

        let job = runner
            .run(Uuid::new_v4(), &SandboxSource::new(2, 5), request(u32::MAX))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_requested, i32::MAX);
        assert_eq!(job.pages_scraped, 2);
        assert_eq!(job.listings_found, 10);
    }

    #[tokio::test]
    async fn failed_page_keeps_partial_counts() {
        let store = Arc::new(MemoryStore::new());
        let runner = ScrapeRunner::new(store.clone(), Duration::ZERO);
        let source = FlakySource {
            fail_on: 3,
            fetches: AtomicU32::new(0),
        };

        let job = runner.run(Uuid::new_v4(), &source, request(5)).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.pages_scraped, 2);
        assert_eq!(job.listings_found, 10);
        assert_eq!(job.listings_new, 10);
        assert!(job.error_message.unwrap().contains("503"));
        assert!(job.completed_at.is_some());

        let stored = store.get_scraping_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.pages_scraped, 2);
    }
}
