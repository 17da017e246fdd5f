//! Publish, update and unpublish properties across an agency's portals.
//!
//! Per (property, portal) the record moves `published -> updated* ->
//! unpublished`. A failed portal call never touches the record; it is only
//! visible in the publication log. Tenant authorization is the caller's job:
//! the service trusts that the user may act on the property.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::models::{
    Property, PublicationAction, PublicationLog, PublicationRecord, PublicationStatus,
};
use crate::portals::{create_client, ConnectionTest, PortalClient, PortalId, PortalResult, PortalStatus};
use crate::store::Store;

/// Result of one portal attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalOutcome {
    pub portal: String,
    pub success: bool,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub error: Option<String>,
}

impl PortalOutcome {
    fn from_result(portal: PortalId, result: &PortalResult) -> Self {
        Self {
            portal: portal.as_str().to_string(),
            success: result.success,
            external_id: result.external_id.clone(),
            external_url: result.external_url.clone(),
            error: result.error.clone(),
        }
    }
}

/// Per-portal results of a publish/update/unpublish call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationSummary {
    pub property_id: Uuid,
    pub action: PublicationAction,
    pub results: Vec<PortalOutcome>,
    /// Requested portals that were not attempted
    pub skipped: Vec<String>,
}

impl PublicationSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Engagement read back for one live publication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSync {
    pub portal: String,
    pub status: PortalStatus,
}

pub struct PublicationService {
    store: Arc<dyn Store>,
    http: reqwest::Client,
}

impl PublicationService {
    pub fn new(store: Arc<dyn Store>, http: reqwest::Client) -> Self {
        Self { store, http }
    }

    /// One client per active, recognized and correctly configured integration.
    ///
    /// A misconfigured integration is logged and left out, so it only affects
    /// its own portal. An empty list means there is nothing to do.
    pub async fn initialize_for_agency(&self, agency_id: Uuid) -> Result<Vec<Box<dyn PortalClient>>> {
        let integrations = self.store.portal_integrations(agency_id).await?;

        let mut clients = Vec::new();
        for integration in integrations.iter().filter(|i| i.is_active) {
            match create_client(
                &integration.portal,
                &integration.credentials,
                &integration.settings,
                &self.http,
            ) {
                Ok(Some(client)) => clients.push(client),
                Ok(None) => warn!(
                    %agency_id,
                    portal = %integration.portal,
                    "No client for configured portal, skipping"
                ),
                Err(e) => warn!(
                    %agency_id,
                    portal = %integration.portal,
                    error = %e,
                    "Portal integration misconfigured, skipping"
                ),
            }
        }

        if clients.is_empty() {
            info!(%agency_id, "No portals configured for agency");
        }
        Ok(clients)
    }

    async fn load_property(&self, property_id: Uuid) -> Result<Property> {
        self.store
            .get_property(property_id)
            .await?
            .ok_or(ServiceError::PropertyNotFound(property_id))
    }

    /// Publish to each requested portal the agency has configured.
    ///
    /// Portals run concurrently and fail independently. Unknown or
    /// unconfigured ids are listed in `skipped` and never attempted.
    pub async fn publish_property(
        &self,
        property_id: Uuid,
        portal_ids: &[String],
        user_id: Uuid,
    ) -> Result<PublicationSummary> {
        let property = self.load_property(property_id).await?;
        let clients = self.initialize_for_agency(property.agency_id).await?;
        let (targets, skipped) = select_clients(&clients, portal_ids);

        info!(%property_id, portals = targets.len(), skipped = skipped.len(), "📤 Publishing property");

        let attempts = targets
            .into_iter()
            .map(|client| self.publish_one(&property, client, user_id));
        let results = join_all(attempts)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(PublicationSummary {
            property_id,
            action: PublicationAction::Publish,
            results,
            skipped,
        })
    }

    async fn publish_one(
        &self,
        property: &Property,
        client: &dyn PortalClient,
        user_id: Uuid,
    ) -> Result<PortalOutcome> {
        let portal = client.portal();
        let mut result = client.publish(&property.data).await;
        if result.success && result.external_id.is_none() {
            result = PortalResult::failed(
                format!("{} reported success without a listing id", portal.display_name()),
                result.raw_response,
            );
        }

        let publication_id = match result.external_id.as_deref().filter(|_| result.success) {
            Some(external_id) => {
                let record = PublicationRecord::new(
                    property.id,
                    property.agency_id,
                    portal.as_str(),
                    external_id.to_string(),
                    result.external_url.clone(),
                );
                let saved = self.store.save_publication(&record).await?;
                info!(property_id = %property.id, %portal, %external_id, "✅ Published");
                Some(saved.id)
            }
            None => {
                warn!(property_id = %property.id, %portal, error = ?result.error, "Publish failed");
                self.store
                    .find_publication(property.id, portal.as_str())
                    .await?
                    .map(|r| r.id)
            }
        };

        self.log_attempt(property.id, publication_id, portal, PublicationAction::Publish, &result, user_id)
            .await?;
        Ok(PortalOutcome::from_result(portal, &result))
    }

    /// Push the current property data to every portal it is live on
    pub async fn update_property(&self, property_id: Uuid, user_id: Uuid) -> Result<PublicationSummary> {
        let property = self.load_property(property_id).await?;
        let clients = self.initialize_for_agency(property.agency_id).await?;
        let records = self.store.publications_for_property(property_id).await?;

        let mut targets = Vec::new();
        let mut skipped = Vec::new();
        for record in records.into_iter().filter(|r| r.status.is_live()) {
            match client_for(&clients, &record.portal) {
                Some(client) => targets.push((record, client)),
                None => {
                    warn!(%property_id, portal = %record.portal, "Live publication without a configured client");
                    skipped.push(record.portal);
                }
            }
        }

        info!(%property_id, portals = targets.len(), "🔄 Updating property on portals");

        let attempts = targets
            .into_iter()
            .map(|(record, client)| self.update_one(&property, record, client, user_id));
        let results = join_all(attempts)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(PublicationSummary {
            property_id,
            action: PublicationAction::Update,
            results,
            skipped,
        })
    }

    async fn update_one(
        &self,
        property: &Property,
        mut record: PublicationRecord,
        client: &dyn PortalClient,
        user_id: Uuid,
    ) -> Result<PortalOutcome> {
        let portal = client.portal();
        let result = client.update(&record.external_id, &property.data).await;

        if result.success {
            record.status = PublicationStatus::Updated;
            if let Some(url) = &result.external_url {
                record.external_url = Some(url.clone());
            }
            record.updated_at = Utc::now();
            self.store.save_publication(&record).await?;
        } else {
            warn!(property_id = %property.id, %portal, error = ?result.error, "Update failed");
        }

        self.log_attempt(property.id, Some(record.id), portal, PublicationAction::Update, &result, user_id)
            .await?;
        Ok(PortalOutcome::from_result(portal, &result))
    }

    /// Take the property down from the requested portals.
    ///
    /// Records are kept and marked unpublished.
    pub async fn unpublish_property(
        &self,
        property_id: Uuid,
        portal_ids: &[String],
        user_id: Uuid,
    ) -> Result<PublicationSummary> {
        let property = self.load_property(property_id).await?;
        let clients = self.initialize_for_agency(property.agency_id).await?;
        let (selected, mut skipped) = select_clients(&clients, portal_ids);

        let mut targets = Vec::new();
        for client in selected {
            let portal = client.portal();
            match self.store.find_publication(property_id, portal.as_str()).await? {
                Some(record) => targets.push((record, client)),
                None => {
                    warn!(%property_id, %portal, "Nothing to unpublish");
                    skipped.push(portal.as_str().to_string());
                }
            }
        }

        info!(%property_id, portals = targets.len(), "📥 Unpublishing property");

        let attempts = targets
            .into_iter()
            .map(|(record, client)| self.unpublish_one(&property, record, client, user_id));
        let results = join_all(attempts)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(PublicationSummary {
            property_id,
            action: PublicationAction::Unpublish,
            results,
            skipped,
        })
    }

    async fn unpublish_one(
        &self,
        property: &Property,
        mut record: PublicationRecord,
        client: &dyn PortalClient,
        user_id: Uuid,
    ) -> Result<PortalOutcome> {
        let portal = client.portal();
        let result = client.unpublish(&record.external_id).await;

        if result.success {
            let now = Utc::now();
            record.status = PublicationStatus::Unpublished;
            record.unpublished_at = Some(now);
            record.updated_at = now;
            self.store.save_publication(&record).await?;
        } else {
            warn!(property_id = %property.id, %portal, error = ?result.error, "Unpublish failed");
        }

        self.log_attempt(property.id, Some(record.id), portal, PublicationAction::Unpublish, &result, user_id)
            .await?;
        Ok(PortalOutcome::from_result(portal, &result))
    }

    /// Refresh views/contacts of every live publication
    pub async fn sync_status(&self, property_id: Uuid) -> Result<Vec<StatusSync>> {
        let property = self.load_property(property_id).await?;
        let clients = self.initialize_for_agency(property.agency_id).await?;
        let records = self.store.publications_for_property(property_id).await?;

        let mut synced = Vec::new();
        for mut record in records.into_iter().filter(|r| r.status.is_live()) {
            let Some(client) = client_for(&clients, &record.portal) else {
                continue;
            };
            let status = client.get_status(&record.external_id).await;

            if status.error.is_none() {
                record.views = status.views;
                record.contacts = status.contacts;
                record.last_synced_at = Some(status.last_synced_at);
                if status.portal_url.is_some() {
                    record.external_url = status.portal_url.clone();
                }
                record.updated_at = Utc::now();
                self.store.save_publication(&record).await?;
            } else {
                warn!(%property_id, portal = %record.portal, error = ?status.error, "Status sync failed");
            }

            synced.push(StatusSync {
                portal: record.portal.clone(),
                status,
            });
        }
        Ok(synced)
    }

    /// Check every configured portal's credentials
    pub async fn test_connections(&self, agency_id: Uuid) -> Result<Vec<ConnectionTest>> {
        let clients = self.initialize_for_agency(agency_id).await?;
        Ok(join_all(clients.iter().map(|c| c.test_connection())).await)
    }

    async fn log_attempt(
        &self,
        property_id: Uuid,
        publication_id: Option<Uuid>,
        portal: PortalId,
        action: PublicationAction,
        result: &PortalResult,
        user_id: Uuid,
    ) -> Result<()> {
        let entry = PublicationLog {
            id: Uuid::new_v4(),
            property_id,
            publication_id,
            portal: portal.as_str().to_string(),
            action,
            success: result.success,
            error_message: result.error.clone(),
            response: result.raw_response.clone(),
            user_id,
            created_at: Utc::now(),
        };
        self.store.append_publication_log(&entry).await?;
        Ok(())
    }
}

fn client_for<'c>(clients: &'c [Box<dyn PortalClient>], portal: &str) -> Option<&'c dyn PortalClient> {
    clients
        .iter()
        .find(|c| c.portal().as_str() == portal)
        .map(|c| c.as_ref())
}

/// Requested ids intersected with the agency's clients, in request order
fn select_clients<'c>(
    clients: &'c [Box<dyn PortalClient>],
    requested: &[String],
) -> (Vec<&'c dyn PortalClient>, Vec<String>) {
    let mut selected: Vec<&'c dyn PortalClient> = Vec::new();
    let mut skipped = Vec::new();

    for raw in requested {
        let client = raw
            .parse::<PortalId>()
            .ok()
            .and_then(|id| client_for(clients, id.as_str()));
        match client {
            Some(client) if selected.iter().any(|s| s.portal() == client.portal()) => {}
            Some(client) => selected.push(client),
            None => {
                warn!(portal = %raw, "Portal not configured for agency, skipping");
                skipped.push(raw.clone());
            }
        }
    }
    (selected, skipped)
}
