use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// CRM contact fields needed for messaging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    /// Stored full name, or first and last name joined
    pub fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return full.to_string();
        }
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Draft,
    Sending,
    Completed,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Draft => "draft",
            BroadcastStatus::Sending => "sending",
            BroadcastStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for BroadcastStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BroadcastStatus::Draft),
            "sending" => Ok(BroadcastStatus::Sending),
            "completed" => Ok(BroadcastStatus::Completed),
            other => Err(UnknownVariant::new("broadcast status", other)),
        }
    }
}

/// Outbound messaging campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: String,
    pub message_template: String,
    pub status: BroadcastStatus,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-recipient delivery state
///
/// Moves one way only: `Pending -> Processing -> Sent | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    /// Claimed by a running batch
    Processing,
    Sent,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Processing => "processing",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecipientStatus::Sent | RecipientStatus::Failed)
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "processing" => Ok(RecipientStatus::Processing),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            other => Err(UnknownVariant::new("recipient status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecipient {
    pub id: Uuid,
    pub broadcast_id: Uuid,
    pub contact_id: Uuid,
    pub status: RecipientStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(full_name: Option<&str>, last_name: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            first_name: "Ana".to_string(),
            last_name: last_name.map(str::to_string),
            full_name: full_name.map(str::to_string),
            phone: None,
        }
    }

    #[test]
    fn display_name_prefers_stored_full_name() {
        assert_eq!(contact(Some("Ana María Ruiz"), Some("Ruiz")).display_name(), "Ana María Ruiz");
        assert_eq!(contact(None, Some("Ruiz")).display_name(), "Ana Ruiz");
        assert_eq!(contact(Some("  "), None).display_name(), "Ana");
    }
}
