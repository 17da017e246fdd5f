//! Outbound WhatsApp messaging used by broadcasts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gateway error (status {status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Provider acknowledgement of a sent message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, phone: &str, content: &str) -> Result<SentMessage, MessagingError>;
}

/// Keep digits only; a leading `+` is implied by the gateway
pub fn normalize_phone(phone: &str) -> Result<String, MessagingError> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return Err(MessagingError::InvalidRecipient(phone.to_string()));
    }
    Ok(digits)
}

/// HTTP client for the WhatsApp session gateway
///
/// Each agency owns one WhatsApp session, addressed as `agency-<uuid>`.
pub struct WhatsAppGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
    session: String,
}

impl WhatsAppGateway {
    pub fn new(base_url: &str, token: &str, agency_id: Uuid, timeout: Duration) -> Result<Self, MessagingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            session: format!("agency-{}", agency_id),
        })
    }
}

#[async_trait]
impl MessageSender for WhatsAppGateway {
    async fn send_message(&self, phone: &str, content: &str) -> Result<SentMessage, MessagingError> {
        let to = normalize_phone(phone)?;
        let url = format!("{}/sessions/{}/messages", self.base_url, self.session);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "to": to, "type": "text", "text": content }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MessagingError::Gateway {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: Value = resp.json().await.unwrap_or(Value::Null);
        debug!(session = %self.session, "Message accepted by gateway");
        Ok(SentMessage {
            message_id: body["id"].as_str().map(str::to_string),
        })
    }
}

type SenderFactory = dyn Fn(Uuid) -> Result<Arc<dyn MessageSender>, MessagingError> + Send + Sync;

/// Per-agency message senders with an explicit lifecycle
///
/// A sender is created the first time an agency needs one and lives until
/// [`SenderPool::teardown`] or [`SenderPool::shutdown`].
pub struct SenderPool {
    factory: Box<SenderFactory>,
    senders: Mutex<HashMap<Uuid, Arc<dyn MessageSender>>>,
}

impl SenderPool {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(Uuid) -> Result<Arc<dyn MessageSender>, MessagingError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Pool backed by [`WhatsAppGateway`] sessions
    pub fn whatsapp(base_url: String, token: String, timeout: Duration) -> Self {
        Self::new(move |agency_id| {
            let gateway = WhatsAppGateway::new(&base_url, &token, agency_id, timeout)?;
            Ok(Arc::new(gateway) as Arc<dyn MessageSender>)
        })
    }

    pub async fn sender_for(&self, agency_id: Uuid) -> Result<Arc<dyn MessageSender>, MessagingError> {
        let mut senders = self.senders.lock().await;
        if let Some(sender) = senders.get(&agency_id) {
            return Ok(sender.clone());
        }

        info!(%agency_id, "Creating message sender");
        let sender = (self.factory)(agency_id)?;
        senders.insert(agency_id, sender.clone());
        Ok(sender)
    }

    /// Drop the agency's sender; the next use creates a fresh one
    pub async fn teardown(&self, agency_id: Uuid) -> bool {
        self.senders.lock().await.remove(&agency_id).is_some()
    }

    pub async fn shutdown(&self) {
        let mut senders = self.senders.lock().await;
        info!(count = senders.len(), "Shutting down message senders");
        senders.clear();
    }

    pub async fn len(&self) -> usize {
        self.senders.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullSender;

    #[async_trait]
    impl MessageSender for NullSender {
        async fn send_message(&self, _phone: &str, _content: &str) -> Result<SentMessage, MessagingError> {
            Ok(SentMessage { message_id: None })
        }
    }

    #[test]
    fn phone_is_reduced_to_digits() {
        assert_eq!(normalize_phone("+52 (33) 1234-5678").unwrap(), "523312345678");
        assert!(normalize_phone("12345").is_err());
    }

    #[tokio::test]
    async fn pool_creates_once_per_agency_until_teardown() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let pool = SenderPool::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullSender) as Arc<dyn MessageSender>)
        });

        let agency = Uuid::new_v4();
        pool.sender_for(agency).await.unwrap();
        pool.sender_for(agency).await.unwrap();
        pool.sender_for(Uuid::new_v4()).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len().await, 2);

        assert!(pool.teardown(agency).await);
        assert!(!pool.teardown(agency).await);
        pool.sender_for(agency).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 3);

        pool.shutdown().await;
        assert_eq!(pool.len().await, 0);
    }
}
