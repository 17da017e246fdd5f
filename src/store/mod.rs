//! Persistence port for publication records, scraping jobs and broadcasts.
//!
//! The services only talk to [`Store`]; [`MemoryStore`] backs tests and local
//! runs, [`PgStore`] targets the CRM's Postgres schema.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    Broadcast, BroadcastRecipient, BroadcastStatus, Contact, PortalIntegration, Property,
    PropertyData, PublicationLog, PublicationRecord, RecipientStatus, ScrapeSource,
    ScrapedListing, ScrapingJob,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // --- properties -------------------------------------------------------

    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>>;

    async fn create_property(&self, agency_id: Uuid, data: &PropertyData) -> StoreResult<Property>;

    // --- portal integrations ---------------------------------------------

    /// All stored integrations of an agency, active or not
    async fn portal_integrations(&self, agency_id: Uuid) -> StoreResult<Vec<PortalIntegration>>;

    // --- publications -----------------------------------------------------

    async fn find_publication(
        &self,
        property_id: Uuid,
        portal: &str,
    ) -> StoreResult<Option<PublicationRecord>>;

    async fn publications_for_property(
        &self,
        property_id: Uuid,
    ) -> StoreResult<Vec<PublicationRecord>>;

    /// Insert or replace the record for `(property_id, portal)`.
    ///
    /// An existing row keeps its id and `created_at`.
    async fn save_publication(&self, record: &PublicationRecord)
        -> StoreResult<PublicationRecord>;

    async fn append_publication_log(&self, entry: &PublicationLog) -> StoreResult<()>;

    async fn publication_logs(&self, property_id: Uuid) -> StoreResult<Vec<PublicationLog>>;

    // --- scraping ---------------------------------------------------------

    async fn create_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()>;

    async fn update_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()>;

    async fn get_scraping_job(&self, id: Uuid) -> StoreResult<Option<ScrapingJob>>;

    async fn find_scraped_listing(
        &self,
        source: ScrapeSource,
        external_id: &str,
    ) -> StoreResult<Option<ScrapedListing>>;

    async fn get_scraped_listing(&self, id: Uuid) -> StoreResult<Option<ScrapedListing>>;

    async fn insert_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()>;

    async fn update_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()>;

    async fn mark_listing_imported(&self, id: Uuid, property_id: Uuid) -> StoreResult<()>;

    // --- broadcasts -------------------------------------------------------

    async fn get_broadcast(&self, id: Uuid) -> StoreResult<Option<Broadcast>>;

    /// Set the campaign status; `Completed` also stamps `completed_at`
    async fn set_broadcast_status(&self, id: Uuid, status: BroadcastStatus) -> StoreResult<()>;

    /// Atomically move up to `limit` pending recipients to `Processing` and
    /// return them. Two concurrent callers never receive the same recipient.
    async fn claim_pending_recipients(
        &self,
        broadcast_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<BroadcastRecipient>>;

    /// Hand claimed recipients back as `Pending` so a later batch retries them.
    ///
    /// Only rows still in `Processing` are touched.
    async fn release_recipients(&self, ids: &[Uuid]) -> StoreResult<()>;

    /// Persist the final status, error and `sent_at` of a claimed recipient
    async fn finish_recipient(&self, recipient: &BroadcastRecipient) -> StoreResult<()>;

    /// Add to the running totals in a single atomic update
    async fn increment_broadcast_counters(
        &self,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> StoreResult<()>;

    async fn count_recipients(
        &self,
        broadcast_id: Uuid,
        statuses: &[RecipientStatus],
    ) -> StoreResult<i64>;

    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>>;
}
