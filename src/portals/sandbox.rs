use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::traits::{ConnectionTest, ListingState, PortalClient, PortalResult, PortalStatus};
use super::types::{PortalId, PortalSettings};
use crate::models::PropertyData;

/// Local stand-in for a portal, selected with `settings.sandbox`
///
/// Answers with portal-shaped ids and URLs after a fixed delay, so agencies can
/// exercise the publication flow before real credentials exist.
pub struct SandboxClient {
    portal: PortalId,
    latency: Duration,
    simulate_error: Option<String>,
}

impl SandboxClient {
    pub fn new(portal: PortalId, settings: &PortalSettings) -> Self {
        Self {
            portal,
            latency: Duration::from_millis(settings.simulated_latency_ms),
            simulate_error: settings.simulate_error.clone(),
        }
    }

    async fn simulate(&self, action: &str) {
        debug!(portal = %self.portal, action, "Simulating portal call");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn new_external_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        let prefix = match self.portal {
            PortalId::Inmuebles24 => "I24",
            PortalId::Vivanuncios => "VIV",
            PortalId::Lamudi => "LMD",
        };
        format!("{}-{}", prefix, &suffix[..12])
    }

    fn simulated_failure(&self, action: &str) -> Option<PortalResult> {
        self.simulate_error.as_ref().map(|message| {
            PortalResult::failed(
                message.clone(),
                json!({ "sandbox": true, "action": action, "error": message }),
            )
        })
    }
}

#[async_trait]
impl PortalClient for SandboxClient {
    fn portal(&self) -> PortalId {
        self.portal
    }

    async fn publish(&self, _property: &PropertyData) -> PortalResult {
        self.simulate("publish").await;
        if let Some(failed) = self.simulated_failure("publish") {
            return failed;
        }
        let id = self.new_external_id();
        let url = self.portal.listing_url(&id);
        PortalResult::ok(
            Some(id.clone()),
            Some(url),
            json!({ "sandbox": true, "action": "publish", "id": id }),
        )
    }

    async fn update(&self, external_id: &str, _property: &PropertyData) -> PortalResult {
        self.simulate("update").await;
        if let Some(failed) = self.simulated_failure("update") {
            return failed;
        }
        PortalResult::ok(
            Some(external_id.to_string()),
            Some(self.portal.listing_url(external_id)),
            json!({ "sandbox": true, "action": "update", "id": external_id }),
        )
    }

    async fn unpublish(&self, external_id: &str) -> PortalResult {
        self.simulate("unpublish").await;
        if let Some(failed) = self.simulated_failure("unpublish") {
            return failed;
        }
        PortalResult::ok(
            Some(external_id.to_string()),
            None,
            json!({ "sandbox": true, "action": "unpublish", "id": external_id }),
        )
    }

    async fn get_status(&self, external_id: &str) -> PortalStatus {
        self.simulate("status").await;
        PortalStatus {
            status: ListingState::Active,
            views: 0,
            contacts: 0,
            last_synced_at: Utc::now(),
            portal_url: Some(self.portal.listing_url(external_id)),
            error: None,
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        self.simulate("test_connection").await;
        ConnectionTest {
            connected: true,
            error: None,
            portal_name: format!("{} (sandbox)", self.portal.display_name()),
            tested_at: Utc::now(),
        }
    }
}
