//! Postgres-backed [`Store`] for the CRM's existing tables.
//!
//! Enum columns are plain `TEXT`; rows are read into flat `*Row` structs and
//! converted, so an unexpected value surfaces as [`StoreError::Corrupt`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Broadcast, BroadcastRecipient, BroadcastStatus, Contact, Location, PortalIntegration,
    Property, PropertyData, PublicationLog, PublicationRecord, RecipientStatus, ScrapeSource,
    ScrapedListing, ScrapingJob,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    agency_id: Uuid,
    title: String,
    description: String,
    price: i64,
    currency: String,
    operation: String,
    property_type: String,
    address: String,
    neighborhood: Option<String>,
    city: String,
    state: String,
    postal_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    bedrooms: Option<i32>,
    bathrooms: Option<f32>,
    parking_spaces: Option<i32>,
    construction_m2: Option<f64>,
    land_m2: Option<f64>,
    features: Vec<String>,
    images: Vec<String>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = StoreError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        Ok(Property {
            id: row.id,
            agency_id: row.agency_id,
            data: PropertyData {
                title: row.title,
                description: row.description,
                price: row.price,
                currency: row.currency,
                operation: row.operation.parse()?,
                property_type: row.property_type,
                location: Location {
                    address: row.address,
                    neighborhood: row.neighborhood,
                    city: row.city,
                    state: row.state,
                    postal_code: row.postal_code,
                    latitude: row.latitude,
                    longitude: row.longitude,
                },
                bedrooms: row.bedrooms,
                bathrooms: row.bathrooms,
                parking_spaces: row.parking_spaces,
                construction_m2: row.construction_m2,
                land_m2: row.land_m2,
                features: row.features,
                images: row.images,
            },
        })
    }
}

const PROPERTY_COLUMNS: &str = "id, agency_id, title, description, price, currency, operation, \
     property_type, address, neighborhood, city, state, postal_code, latitude, longitude, \
     bedrooms, bathrooms, parking_spaces, construction_m2, land_m2, features, images";

#[derive(sqlx::FromRow)]
struct PublicationRow {
    id: Uuid,
    property_id: Uuid,
    agency_id: Uuid,
    portal: String,
    external_id: String,
    external_url: Option<String>,
    status: String,
    views: i64,
    contacts: i64,
    published_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
    unpublished_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PublicationRow> for PublicationRecord {
    type Error = StoreError;

    fn try_from(row: PublicationRow) -> Result<Self, Self::Error> {
        Ok(PublicationRecord {
            id: row.id,
            property_id: row.property_id,
            agency_id: row.agency_id,
            portal: row.portal,
            external_id: row.external_id,
            external_url: row.external_url,
            status: row.status.parse()?,
            views: row.views,
            contacts: row.contacts,
            published_at: row.published_at,
            last_synced_at: row.last_synced_at,
            unpublished_at: row.unpublished_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PublicationLogRow {
    id: Uuid,
    property_id: Uuid,
    publication_id: Option<Uuid>,
    portal: String,
    action: String,
    success: bool,
    error_message: Option<String>,
    response: serde_json::Value,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<PublicationLogRow> for PublicationLog {
    type Error = StoreError;

    fn try_from(row: PublicationLogRow) -> Result<Self, Self::Error> {
        Ok(PublicationLog {
            id: row.id,
            property_id: row.property_id,
            publication_id: row.publication_id,
            portal: row.portal,
            action: row.action.parse()?,
            success: row.success,
            error_message: row.error_message,
            response: row.response,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScrapingJobRow {
    id: Uuid,
    agency_id: Uuid,
    source: String,
    pages_requested: i32,
    city: Option<String>,
    operation: Option<String>,
    pages_scraped: i32,
    listings_found: i32,
    listings_new: i32,
    listings_updated: i32,
    listings_duplicate: i32,
    status: String,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScrapingJobRow> for ScrapingJob {
    type Error = StoreError;

    fn try_from(row: ScrapingJobRow) -> Result<Self, Self::Error> {
        Ok(ScrapingJob {
            id: row.id,
            agency_id: row.agency_id,
            source: row.source.parse()?,
            pages_requested: row.pages_requested,
            city: row.city,
            operation: row.operation.as_deref().map(str::parse).transpose()?,
            pages_scraped: row.pages_scraped,
            listings_found: row.listings_found,
            listings_new: row.listings_new,
            listings_updated: row.listings_updated,
            listings_duplicate: row.listings_duplicate,
            status: row.status.parse()?,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScrapedListingRow {
    id: Uuid,
    source: String,
    external_id: String,
    url: String,
    title: String,
    description: Option<String>,
    price: Option<i64>,
    currency: String,
    operation: Option<String>,
    property_type: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    bedrooms: Option<i32>,
    bathrooms: Option<f32>,
    area_m2: Option<f64>,
    images: Vec<String>,
    raw_data: serde_json::Value,
    first_seen_at: DateTime<Utc>,
    scraped_at: DateTime<Utc>,
    imported: bool,
    property_id: Option<Uuid>,
}

impl TryFrom<ScrapedListingRow> for ScrapedListing {
    type Error = StoreError;

    fn try_from(row: ScrapedListingRow) -> Result<Self, Self::Error> {
        Ok(ScrapedListing {
            id: row.id,
            source: row.source.parse()?,
            external_id: row.external_id,
            url: row.url,
            title: row.title,
            description: row.description,
            price: row.price,
            currency: row.currency,
            operation: row.operation.as_deref().map(str::parse).transpose()?,
            property_type: row.property_type,
            address: row.address,
            city: row.city,
            state: row.state,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area_m2: row.area_m2,
            images: row.images,
            raw_data: row.raw_data,
            first_seen_at: row.first_seen_at,
            scraped_at: row.scraped_at,
            imported: row.imported,
            property_id: row.property_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BroadcastRow {
    id: Uuid,
    agency_id: Uuid,
    name: String,
    message_template: String,
    status: String,
    total_recipients: i32,
    sent_count: i32,
    failed_count: i32,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BroadcastRow> for Broadcast {
    type Error = StoreError;

    fn try_from(row: BroadcastRow) -> Result<Self, Self::Error> {
        Ok(Broadcast {
            id: row.id,
            agency_id: row.agency_id,
            name: row.name,
            message_template: row.message_template,
            status: row.status.parse()?,
            total_recipients: row.total_recipients,
            sent_count: row.sent_count,
            failed_count: row.failed_count,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    broadcast_id: Uuid,
    contact_id: Uuid,
    status: String,
    error_message: Option<String>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecipientRow> for BroadcastRecipient {
    type Error = StoreError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        Ok(BroadcastRecipient {
            id: row.id,
            broadcast_id: row.broadcast_id,
            contact_id: row.contact_id,
            status: row.status.parse()?,
            error_message: row.error_message,
            sent_at: row.sent_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: Uuid,
    first_name: String,
    last_name: Option<String>,
    full_name: Option<String>,
    phone: Option<String>,
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        let row: Option<PropertyRow> = sqlx::query_as(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Property::try_from).transpose()
    }

    async fn create_property(&self, agency_id: Uuid, data: &PropertyData) -> StoreResult<Property> {
        let row: PropertyRow = sqlx::query_as(&format!(
            "INSERT INTO properties (
                id, agency_id, title, description, price, currency, operation,
                property_type, address, neighborhood, city, state, postal_code,
                latitude, longitude, bedrooms, bathrooms, parking_spaces,
                construction_m2, land_m2, features, images
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                     $14, $15, $16, $17, $18, $19, $20, $21, $22)
             RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(agency_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.price)
        .bind(&data.currency)
        .bind(data.operation.as_str())
        .bind(&data.property_type)
        .bind(&data.location.address)
        .bind(&data.location.neighborhood)
        .bind(&data.location.city)
        .bind(&data.location.state)
        .bind(&data.location.postal_code)
        .bind(data.location.latitude)
        .bind(data.location.longitude)
        .bind(data.bedrooms)
        .bind(data.bathrooms)
        .bind(data.parking_spaces)
        .bind(data.construction_m2)
        .bind(data.land_m2)
        .bind(&data.features)
        .bind(&data.images)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(property_id = %row.id, %agency_id, "Created property");
        Property::try_from(row)
    }

    async fn portal_integrations(&self, agency_id: Uuid) -> StoreResult<Vec<PortalIntegration>> {
        let rows: Vec<(Uuid, Uuid, String, serde_json::Value, serde_json::Value, bool)> =
            sqlx::query_as(
                "SELECT id, agency_id, portal, credentials, settings, is_active
                 FROM portal_integrations
                 WHERE agency_id = $1
                 ORDER BY created_at",
            )
            .bind(agency_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, agency_id, portal, credentials, settings, is_active)| PortalIntegration {
                    id,
                    agency_id,
                    portal,
                    credentials,
                    settings,
                    is_active,
                },
            )
            .collect())
    }

    async fn find_publication(
        &self,
        property_id: Uuid,
        portal: &str,
    ) -> StoreResult<Option<PublicationRecord>> {
        let row: Option<PublicationRow> = sqlx::query_as(
            "SELECT * FROM property_publications WHERE property_id = $1 AND portal = $2",
        )
        .bind(property_id)
        .bind(portal)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PublicationRecord::try_from).transpose()
    }

    async fn publications_for_property(
        &self,
        property_id: Uuid,
    ) -> StoreResult<Vec<PublicationRecord>> {
        let rows: Vec<PublicationRow> = sqlx::query_as(
            "SELECT * FROM property_publications WHERE property_id = $1 ORDER BY created_at",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn save_publication(
        &self,
        record: &PublicationRecord,
    ) -> StoreResult<PublicationRecord> {
        let row: PublicationRow = sqlx::query_as(
            r#"
            INSERT INTO property_publications (
                id, property_id, agency_id, portal, external_id, external_url, status,
                views, contacts, published_at, last_synced_at, unpublished_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (property_id, portal) DO UPDATE SET
                external_id = EXCLUDED.external_id,
                external_url = EXCLUDED.external_url,
                status = EXCLUDED.status,
                views = EXCLUDED.views,
                contacts = EXCLUDED.contacts,
                published_at = EXCLUDED.published_at,
                last_synced_at = EXCLUDED.last_synced_at,
                unpublished_at = EXCLUDED.unpublished_at,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.property_id)
        .bind(record.agency_id)
        .bind(&record.portal)
        .bind(&record.external_id)
        .bind(&record.external_url)
        .bind(record.status.as_str())
        .bind(record.views)
        .bind(record.contacts)
        .bind(record.published_at)
        .bind(record.last_synced_at)
        .bind(record.unpublished_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        PublicationRecord::try_from(row)
    }

    async fn append_publication_log(&self, entry: &PublicationLog) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO publication_logs (
                id, property_id, publication_id, portal, action, success,
                error_message, response, user_id, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(entry.id)
        .bind(entry.property_id)
        .bind(entry.publication_id)
        .bind(&entry.portal)
        .bind(entry.action.as_str())
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(&entry.response)
        .bind(entry.user_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn publication_logs(&self, property_id: Uuid) -> StoreResult<Vec<PublicationLog>> {
        let rows: Vec<PublicationLogRow> = sqlx::query_as(
            "SELECT * FROM publication_logs WHERE property_id = $1 ORDER BY created_at",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn create_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scraping_jobs (
                id, agency_id, source, pages_requested, city, operation,
                pages_scraped, listings_found, listings_new, listings_updated,
                listings_duplicate, status, error_message, started_at, completed_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(job.id)
        .bind(job.agency_id)
        .bind(job.source.as_str())
        .bind(job.pages_requested)
        .bind(&job.city)
        .bind(job.operation.map(|o| o.as_str()))
        .bind(job.pages_scraped)
        .bind(job.listings_found)
        .bind(job.listings_new)
        .bind(job.listings_updated)
        .bind(job.listings_duplicate)
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scraping_jobs
            SET pages_scraped = $2,
                listings_found = $3,
                listings_new = $4,
                listings_updated = $5,
                listings_duplicate = $6,
                status = $7,
                error_message = $8,
                completed_at = $9
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.pages_scraped)
        .bind(job.listings_found)
        .bind(job.listings_new)
        .bind(job.listings_updated)
        .bind(job.listings_duplicate)
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "scraping job",
                id: job.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_scraping_job(&self, id: Uuid) -> StoreResult<Option<ScrapingJob>> {
        let row: Option<ScrapingJobRow> =
            sqlx::query_as("SELECT * FROM scraping_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ScrapingJob::try_from).transpose()
    }

    async fn find_scraped_listing(
        &self,
        source: ScrapeSource,
        external_id: &str,
    ) -> StoreResult<Option<ScrapedListing>> {
        let row: Option<ScrapedListingRow> = sqlx::query_as(
            "SELECT * FROM scraped_listings WHERE source = $1 AND external_id = $2",
        )
        .bind(source.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScrapedListing::try_from).transpose()
    }

    async fn get_scraped_listing(&self, id: Uuid) -> StoreResult<Option<ScrapedListing>> {
        let row: Option<ScrapedListingRow> =
            sqlx::query_as("SELECT * FROM scraped_listings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ScrapedListing::try_from).transpose()
    }

    async fn insert_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scraped_listings (
                id, source, external_id, url, title, description, price, currency,
                operation, property_type, address, city, state, bedrooms, bathrooms,
                area_m2, images, raw_data, first_seen_at, scraped_at, imported, property_id
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                     $15, $16, $17, $18, $19, $20, $21, $22)",
        )
        .bind(listing.id)
        .bind(listing.source.as_str())
        .bind(&listing.external_id)
        .bind(&listing.url)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(listing.operation.map(|o| o.as_str()))
        .bind(&listing.property_type)
        .bind(&listing.address)
        .bind(&listing.city)
        .bind(&listing.state)
        .bind(listing.bedrooms)
        .bind(listing.bathrooms)
        .bind(listing.area_m2)
        .bind(&listing.images)
        .bind(&listing.raw_data)
        .bind(listing.first_seen_at)
        .bind(listing.scraped_at)
        .bind(listing.imported)
        .bind(listing.property_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE scraped_listings
            SET url = $2,
                title = $3,
                description = $4,
                price = $5,
                currency = $6,
                operation = $7,
                property_type = $8,
                address = $9,
                city = $10,
                state = $11,
                bedrooms = $12,
                bathrooms = $13,
                area_m2 = $14,
                images = $15,
                raw_data = $16,
                scraped_at = $17
            WHERE id = $1
            "#,
        )
        .bind(listing.id)
        .bind(&listing.url)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(listing.operation.map(|o| o.as_str()))
        .bind(&listing.property_type)
        .bind(&listing.address)
        .bind(&listing.city)
        .bind(&listing.state)
        .bind(listing.bedrooms)
        .bind(listing.bathrooms)
        .bind(listing.area_m2)
        .bind(&listing.images)
        .bind(&listing.raw_data)
        .bind(listing.scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_listing_imported(&self, id: Uuid, property_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE scraped_listings SET imported = TRUE, property_id = $2 WHERE id = $1")
            .bind(id)
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_broadcast(&self, id: Uuid) -> StoreResult<Option<Broadcast>> {
        let row: Option<BroadcastRow> = sqlx::query_as(
            "SELECT id, agency_id, name, message_template, status, total_recipients,
                    sent_count, failed_count, created_at, completed_at
             FROM broadcasts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Broadcast::try_from).transpose()
    }

    async fn set_broadcast_status(&self, id: Uuid, status: BroadcastStatus) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE broadcasts
            SET status = $2,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_pending_recipients(
        &self,
        broadcast_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<BroadcastRecipient>> {
        let rows: Vec<RecipientRow> = sqlx::query_as(
            r#"
            UPDATE broadcast_recipients
            SET status = 'processing'
            WHERE id IN (
                SELECT id FROM broadcast_recipients
                WHERE broadcast_id = $1 AND status = 'pending'
                ORDER BY created_at, id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, broadcast_id, contact_id, status, error_message, sent_at
            "#,
        )
        .bind(broadcast_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn release_recipients(&self, ids: &[Uuid]) -> StoreResult<()> {
        sqlx::query(
            "UPDATE broadcast_recipients
             SET status = 'pending'
             WHERE id = ANY($1) AND status = 'processing'",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_recipient(&self, recipient: &BroadcastRecipient) -> StoreResult<()> {
        sqlx::query(
            "UPDATE broadcast_recipients
             SET status = $2, error_message = $3, sent_at = $4
             WHERE id = $1",
        )
        .bind(recipient.id)
        .bind(recipient.status.as_str())
        .bind(&recipient.error_message)
        .bind(recipient.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_broadcast_counters(
        &self,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE broadcasts
             SET sent_count = sent_count + $2, failed_count = failed_count + $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_recipients(
        &self,
        broadcast_id: Uuid,
        statuses: &[RecipientStatus],
    ) -> StoreResult<i64> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM broadcast_recipients
             WHERE broadcast_id = $1 AND status = ANY($2)",
        )
        .bind(broadcast_id)
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(
            "SELECT id, first_name, last_name, full_name, phone FROM contacts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Contact {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            full_name: row.full_name,
            phone: row.phone,
        }))
    }
}
