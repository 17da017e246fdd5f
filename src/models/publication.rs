use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Stored portal credentials for one agency
///
/// `portal` is kept as the raw stored string: an agency may have integrations
/// configured for portals this crate has no client for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalIntegration {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub portal: String,
    /// Portal-specific credential fields
    pub credentials: serde_json::Value,
    pub settings: serde_json::Value,
    pub is_active: bool,
}

/// Publication state of a property on one portal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    Published,
    Updated,
    Unpublished,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Published => "published",
            PublicationStatus::Updated => "updated",
            PublicationStatus::Unpublished => "unpublished",
        }
    }

    /// Whether the listing is currently live on the portal
    pub fn is_live(&self) -> bool {
        !matches!(self, PublicationStatus::Unpublished)
    }
}

impl std::str::FromStr for PublicationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(PublicationStatus::Published),
            "updated" => Ok(PublicationStatus::Updated),
            "unpublished" => Ok(PublicationStatus::Unpublished),
            other => Err(UnknownVariant::new("publication status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationAction {
    Publish,
    Update,
    Unpublish,
}

impl PublicationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationAction::Publish => "publish",
            PublicationAction::Update => "update",
            PublicationAction::Unpublish => "unpublish",
        }
    }
}

impl std::str::FromStr for PublicationAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(PublicationAction::Publish),
            "update" => Ok(PublicationAction::Update),
            "unpublish" => Ok(PublicationAction::Unpublish),
            other => Err(UnknownVariant::new("publication action", other)),
        }
    }
}

impl std::fmt::Display for PublicationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "This property is live on this portal", one per (property, portal)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: Uuid,
    pub property_id: Uuid,
    pub agency_id: Uuid,
    pub portal: String,
    pub external_id: String,
    pub external_url: Option<String>,
    pub status: PublicationStatus,
    pub views: i64,
    pub contacts: i64,
    pub published_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub unpublished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicationRecord {
    /// Fresh record for a successful first publish
    pub fn new(
        property_id: Uuid,
        agency_id: Uuid,
        portal: &str,
        external_id: String,
        external_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            property_id,
            agency_id,
            portal: portal.to_string(),
            external_id,
            external_url,
            status: PublicationStatus::Published,
            views: 0,
            contacts: 0,
            published_at: now,
            last_synced_at: None,
            unpublished_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One attempted portal operation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationLog {
    pub id: Uuid,
    pub property_id: Uuid,
    pub publication_id: Option<Uuid>,
    pub portal: String,
    pub action: PublicationAction,
    pub success: bool,
    pub error_message: Option<String>,
    pub response: serde_json::Value,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
