use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Broadcast, BroadcastRecipient, BroadcastStatus, Contact, PortalIntegration, Property,
    PropertyData, PublicationLog, PublicationRecord, RecipientStatus, ScrapeSource,
    ScrapedListing, ScrapingJob,
};

#[derive(Default)]
struct Tables {
    properties: HashMap<Uuid, Property>,
    integrations: Vec<PortalIntegration>,
    publications: Vec<PublicationRecord>,
    publication_logs: Vec<PublicationLog>,
    jobs: HashMap<Uuid, ScrapingJob>,
    listings: Vec<ScrapedListing>,
    broadcasts: HashMap<Uuid, Broadcast>,
    // insertion order is claim order
    recipients: Vec<BroadcastRecipient>,
    contacts: HashMap<Uuid, Contact>,
}

/// In-process store behind a single lock
///
/// Every trait method takes the lock once, so each call is atomic with
/// respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_property(&self, property: Property) {
        self.tables
            .write()
            .await
            .properties
            .insert(property.id, property);
    }

    pub async fn add_integration(&self, integration: PortalIntegration) {
        self.tables.write().await.integrations.push(integration);
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.tables.write().await.contacts.insert(contact.id, contact);
    }

    pub async fn insert_broadcast(&self, broadcast: Broadcast, recipients: Vec<BroadcastRecipient>) {
        let mut tables = self.tables.write().await;
        tables.broadcasts.insert(broadcast.id, broadcast);
        tables.recipients.extend(recipients);
    }

    pub async fn recipients(&self, broadcast_id: Uuid) -> Vec<BroadcastRecipient> {
        self.tables
            .read()
            .await
            .recipients
            .iter()
            .filter(|r| r.broadcast_id == broadcast_id)
            .cloned()
            .collect()
    }

    pub async fn scraped_listings(&self) -> Vec<ScrapedListing> {
        self.tables.read().await.listings.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.tables.read().await.properties.get(&id).cloned())
    }

    async fn create_property(&self, agency_id: Uuid, data: &PropertyData) -> StoreResult<Property> {
        let property = Property {
            id: Uuid::new_v4(),
            agency_id,
            data: data.clone(),
        };
        self.tables
            .write()
            .await
            .properties
            .insert(property.id, property.clone());
        Ok(property)
    }

    async fn portal_integrations(&self, agency_id: Uuid) -> StoreResult<Vec<PortalIntegration>> {
        Ok(self
            .tables
            .read()
            .await
            .integrations
            .iter()
            .filter(|i| i.agency_id == agency_id)
            .cloned()
            .collect())
    }

    async fn find_publication(
        &self,
        property_id: Uuid,
        portal: &str,
    ) -> StoreResult<Option<PublicationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .publications
            .iter()
            .find(|p| p.property_id == property_id && p.portal == portal)
            .cloned())
    }

    async fn publications_for_property(
        &self,
        property_id: Uuid,
    ) -> StoreResult<Vec<PublicationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .publications
            .iter()
            .filter(|p| p.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn save_publication(
        &self,
        record: &PublicationRecord,
    ) -> StoreResult<PublicationRecord> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .publications
            .iter_mut()
            .find(|p| p.property_id == record.property_id && p.portal == record.portal);

        match existing {
            Some(row) => {
                let id = row.id;
                let created_at = row.created_at;
                *row = record.clone();
                row.id = id;
                row.created_at = created_at;
                Ok(row.clone())
            }
            None => {
                tables.publications.push(record.clone());
                Ok(record.clone())
            }
        }
    }

    async fn append_publication_log(&self, entry: &PublicationLog) -> StoreResult<()> {
        self.tables.write().await.publication_logs.push(entry.clone());
        Ok(())
    }

    async fn publication_logs(&self, property_id: Uuid) -> StoreResult<Vec<PublicationLog>> {
        Ok(self
            .tables
            .read()
            .await
            .publication_logs
            .iter()
            .filter(|l| l.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn create_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
        self.tables.write().await.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.jobs.get_mut(&job.id) {
            Some(row) => {
                *row = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "scraping job",
                id: job.id.to_string(),
            }),
        }
    }

    async fn get_scraping_job(&self, id: Uuid) -> StoreResult<Option<ScrapingJob>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn find_scraped_listing(
        &self,
        source: ScrapeSource,
        external_id: &str,
    ) -> StoreResult<Option<ScrapedListing>> {
        Ok(self
            .tables
            .read()
            .await
            .listings
            .iter()
            .find(|l| l.source == source && l.external_id == external_id)
            .cloned())
    }

    async fn get_scraped_listing(&self, id: Uuid) -> StoreResult<Option<ScrapedListing>> {
        Ok(self
            .tables
            .read()
            .await
            .listings
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn insert_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        // mirrors the unique (source, external_id) index
        if tables
            .listings
            .iter()
            .any(|l| l.source == listing.source && l.external_id == listing.external_id)
        {
            return Err(StoreError::Corrupt(format!(
                "duplicate scraped listing {}/{}",
                listing.source, listing.external_id
            )));
        }
        tables.listings.push(listing.clone());
        Ok(())
    }

    async fn update_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.listings.iter_mut().find(|l| l.id == listing.id) {
            Some(row) => {
                *row = listing.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "scraped listing",
                id: listing.id.to_string(),
            }),
        }
    }

    async fn mark_listing_imported(&self, id: Uuid, property_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.listings.iter_mut().find(|l| l.id == id) {
            Some(row) => {
                row.imported = true;
                row.property_id = Some(property_id);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "scraped listing",
                id: id.to_string(),
            }),
        }
    }

    async fn get_broadcast(&self, id: Uuid) -> StoreResult<Option<Broadcast>> {
        Ok(self.tables.read().await.broadcasts.get(&id).cloned())
    }

    async fn set_broadcast_status(&self, id: Uuid, status: BroadcastStatus) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let broadcast = tables
            .broadcasts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "broadcast",
                id: id.to_string(),
            })?;
        broadcast.status = status;
        if status == BroadcastStatus::Completed {
            broadcast.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn claim_pending_recipients(
        &self,
        broadcast_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<BroadcastRecipient>> {
        let mut tables = self.tables.write().await;
        let claimed = tables
            .recipients
            .iter_mut()
            .filter(|r| r.broadcast_id == broadcast_id && r.status == RecipientStatus::Pending)
            .take(limit)
            .map(|r| {
                r.status = RecipientStatus::Processing;
                r.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn release_recipients(&self, ids: &[Uuid]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for row in tables
            .recipients
            .iter_mut()
            .filter(|r| ids.contains(&r.id) && r.status == RecipientStatus::Processing)
        {
            row.status = RecipientStatus::Pending;
        }
        Ok(())
    }

    async fn finish_recipient(&self, recipient: &BroadcastRecipient) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .recipients
            .iter_mut()
            .find(|r| r.id == recipient.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "broadcast recipient",
                id: recipient.id.to_string(),
            })?;
        row.status = recipient.status;
        row.error_message = recipient.error_message.clone();
        row.sent_at = recipient.sent_at;
        Ok(())
    }

    async fn increment_broadcast_counters(
        &self,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let broadcast = tables
            .broadcasts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "broadcast",
                id: id.to_string(),
            })?;
        broadcast.sent_count += sent;
        broadcast.failed_count += failed;
        Ok(())
    }

    async fn count_recipients(
        &self,
        broadcast_id: Uuid,
        statuses: &[RecipientStatus],
    ) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .recipients
            .iter()
            .filter(|r| r.broadcast_id == broadcast_id && statuses.contains(&r.status))
            .count() as i64)
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.tables.read().await.contacts.get(&id).cloned())
    }
}
