use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PortalId;
use crate::models::PropertyData;

/// Uniform outcome of a portal mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResult {
    pub success: bool,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub error: Option<String>,
    /// Body returned by the portal, or a synthesized one for transport errors
    pub raw_response: Value,
}

impl PortalResult {
    pub fn ok(external_id: Option<String>, external_url: Option<String>, raw_response: Value) -> Self {
        Self {
            success: true,
            external_id,
            external_url,
            error: None,
            raw_response,
        }
    }

    pub fn failed(error: impl Into<String>, raw_response: Value) -> Self {
        Self {
            success: false,
            external_id: None,
            external_url: None,
            error: Some(error.into()),
            raw_response,
        }
    }
}

/// Portal-side state of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    Pending,
    Paused,
    Removed,
    Unknown,
}

/// Engagement metrics read back from a portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalStatus {
    pub status: ListingState,
    pub views: i64,
    pub contacts: i64,
    pub last_synced_at: DateTime<Utc>,
    pub portal_url: Option<String>,
    pub error: Option<String>,
}

impl PortalStatus {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            status: ListingState::Unknown,
            views: 0,
            contacts: 0,
            last_synced_at: Utc::now(),
            portal_url: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub connected: bool,
    pub error: Option<String>,
    pub portal_name: String,
    pub tested_at: DateTime<Utc>,
}

/// Adapter for one external listing portal
///
/// Expected failures (network, validation, unknown external id) come back as
/// `success = false` results; implementations never return them as errors.
#[async_trait]
pub trait PortalClient: Send + Sync {
    fn portal(&self) -> PortalId;

    /// Create a new listing. A successful result carries the portal's
    /// `external_id`.
    async fn publish(&self, property: &PropertyData) -> PortalResult;

    /// Replace the content of a listing created by `publish`
    async fn update(&self, external_id: &str, property: &PropertyData) -> PortalResult;

    /// Remove or deactivate a listing
    async fn unpublish(&self, external_id: &str) -> PortalResult;

    /// Read-only engagement sync
    async fn get_status(&self, external_id: &str) -> PortalStatus;

    /// Check the credentials without touching any listing
    async fn test_connection(&self) -> ConnectionTest;
}
