use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::messaging::{MessageSender, SenderPool};
use crate::models::{BroadcastRecipient, BroadcastStatus, Contact, RecipientStatus};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Recipients claimed per invocation
    pub batch_size: usize,
    /// Pause between two consecutive sends
    pub message_delay: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            message_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub broadcast_id: Uuid,
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Recipients not yet in a final state
    pub remaining: i64,
    pub completed: bool,
}

/// Fill `{first_name}`, `{last_name}` and `{full_name}` from the contact.
///
/// Any other `{...}` is copied through untouched.
pub fn render_template(template: &str, contact: &Contact) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let end = start + len;
        out.push_str(&rest[..start]);

        match placeholder(&rest[start + 1..end], contact) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}

fn placeholder(name: &str, contact: &Contact) -> Option<String> {
    match name {
        "first_name" => Some(contact.first_name.clone()),
        "last_name" => Some(contact.last_name.clone().unwrap_or_default()),
        "full_name" => Some(contact.display_name()),
        _ => None,
    }
}

/// Sends one bounded batch of a broadcast per call.
///
/// Callers invoke [`BroadcastProcessor::process_batch`] repeatedly until the
/// summary reports `completed`. Recipients are claimed before sending, so
/// overlapping invocations never message the same contact twice.
pub struct BroadcastProcessor {
    store: Arc<dyn Store>,
    senders: Arc<SenderPool>,
    settings: BroadcastSettings,
}

impl BroadcastProcessor {
    pub fn new(store: Arc<dyn Store>, senders: Arc<SenderPool>, settings: BroadcastSettings) -> Self {
        Self {
            store,
            senders,
            settings,
        }
    }

    pub async fn process_batch(&self, broadcast_id: Uuid) -> Result<BatchSummary> {
        let broadcast = self
            .store
            .get_broadcast(broadcast_id)
            .await?
            .ok_or(ServiceError::BroadcastNotFound(broadcast_id))?;

        if broadcast.status == BroadcastStatus::Completed {
            debug!(%broadcast_id, "Broadcast already completed");
            return Ok(BatchSummary {
                broadcast_id,
                processed: 0,
                sent: 0,
                failed: 0,
                remaining: 0,
                completed: true,
            });
        }
        if broadcast.status == BroadcastStatus::Draft {
            self.store
                .set_broadcast_status(broadcast_id, BroadcastStatus::Sending)
                .await?;
        }

        // before claiming: every claimed recipient must reach a final state
        let sender = self.senders.sender_for(broadcast.agency_id).await?;
        let recipients = self
            .store
            .claim_pending_recipients(broadcast_id, self.settings.batch_size)
            .await?;

        info!(%broadcast_id, claimed = recipients.len(), "📨 Processing broadcast batch");

        let mut sent = 0;
        let mut failed = 0;
        let mut attempted_send = false;
        let mut aborted = None;
        let mut claimed = recipients.into_iter();

        while let Some(recipient) = claimed.next() {
            let recipient_id = recipient.id;
            match self
                .deliver(sender.as_ref(), &broadcast.message_template, recipient, &mut attempted_send)
                .await
            {
                Ok(finished) if finished.status == RecipientStatus::Sent => sent += 1,
                Ok(_) => failed += 1,
                Err(e) => {
                    let unfinished: Vec<Uuid> = std::iter::once(recipient_id)
                        .chain(claimed.by_ref().map(|r| r.id))
                        .collect();
                    aborted = Some((e, unfinished));
                    break;
                }
            }
        }
        let processed = sent + failed;

        if let Some((err, unfinished)) = aborted {
            error!(%broadcast_id, sent, failed, unfinished = unfinished.len(), error = %err, "Batch aborted");
            if let Err(e) = self.store.release_recipients(&unfinished).await {
                error!(%broadcast_id, error = %e, "Could not release claimed recipients");
            }
            if processed > 0 {
                if let Err(e) = self
                    .store
                    .increment_broadcast_counters(broadcast_id, sent as i32, failed as i32)
                    .await
                {
                    error!(%broadcast_id, error = %e, "Could not record batch counters");
                }
            }
            return Err(err);
        }

        if processed > 0 {
            self.store
                .increment_broadcast_counters(broadcast_id, sent as i32, failed as i32)
                .await?;
        }

        let remaining = self
            .store
            .count_recipients(
                broadcast_id,
                &[RecipientStatus::Pending, RecipientStatus::Processing],
            )
            .await?;
        let completed = remaining == 0;
        if completed {
            self.store
                .set_broadcast_status(broadcast_id, BroadcastStatus::Completed)
                .await?;
            info!(%broadcast_id, "✅ Broadcast completed");
        }

        info!(%broadcast_id, processed, sent, failed, remaining, "Batch done");
        Ok(BatchSummary {
            broadcast_id,
            processed,
            sent,
            failed,
            remaining,
            completed,
        })
    }

    async fn deliver(
        &self,
        sender: &dyn MessageSender,
        template: &str,
        mut recipient: BroadcastRecipient,
        attempted_send: &mut bool,
    ) -> Result<BroadcastRecipient> {
        let contact = self.store.get_contact(recipient.contact_id).await?;
        let phone = contact
            .as_ref()
            .and_then(|c| c.phone.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty());

        match (contact.as_ref(), phone) {
            (Some(contact), Some(phone)) => {
                if *attempted_send && !self.settings.message_delay.is_zero() {
                    tokio::time::sleep(self.settings.message_delay).await;
                }
                *attempted_send = true;

                let content = render_template(template, contact);
                match sender.send_message(phone, &content).await {
                    Ok(_) => {
                        recipient.status = RecipientStatus::Sent;
                        recipient.sent_at = Some(Utc::now());
                    }
                    Err(e) => {
                        warn!(recipient_id = %recipient.id, error = %e, "Message not sent");
                        recipient.status = RecipientStatus::Failed;
                        recipient.error_message = Some(e.to_string());
                    }
                }
            }
            (Some(_), None) => {
                recipient.status = RecipientStatus::Failed;
                recipient.error_message = Some("Contact has no phone number".to_string());
            }
            (None, _) => {
                recipient.status = RecipientStatus::Failed;
                recipient.error_message = Some("Contact not found".to_string());
            }
        }

        self.store.finish_recipient(&recipient).await?;
        Ok(recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{MessagingError, SentMessage};
    use crate::error::{StoreError, StoreResult};
    use crate::models::{
        Broadcast, PortalIntegration, Property, PropertyData, PublicationLog, PublicationRecord,
        ScrapeSource, ScrapedListing, ScrapingJob,
    };
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(&self, phone: &str, content: &str) -> std::result::Result<SentMessage, MessagingError> {
            if phone.starts_with("000") {
                return Err(MessagingError::Gateway {
                    status: 400,
                    message: "number not on WhatsApp".to_string(),
                });
            }
            self.sent.lock().await.push((phone.to_string(), content.to_string()));
            Ok(SentMessage { message_id: None })
        }
    }

    fn contact(first_name: &str, last_name: Option<&str>, phone: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.map(str::to_string),
            full_name: None,
            phone: phone.map(str::to_string),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        sender: Arc<RecordingSender>,
        processor: BroadcastProcessor,
        broadcast_id: Uuid,
    }

    async fn fixture(template: &str, contacts: Vec<Contact>, batch_size: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::default());
        let agency_id = Uuid::new_v4();
        let broadcast = Broadcast {
            id: Uuid::new_v4(),
            agency_id,
            name: "Open house".to_string(),
            message_template: template.to_string(),
            status: BroadcastStatus::Draft,
            total_recipients: contacts.len() as i32,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        };

        let mut recipients = Vec::new();
        for contact in contacts {
            recipients.push(BroadcastRecipient {
                id: Uuid::new_v4(),
                broadcast_id: broadcast.id,
                contact_id: contact.id,
                status: RecipientStatus::Pending,
                error_message: None,
                sent_at: None,
            });
            store.insert_contact(contact).await;
        }
        let broadcast_id = broadcast.id;
        store.insert_broadcast(broadcast, recipients).await;

        let processor = processor(
            store.clone(),
            sender.clone(),
            BroadcastSettings {
                batch_size,
                message_delay: Duration::ZERO,
            },
        );

        Fixture {
            store,
            sender,
            processor,
            broadcast_id,
        }
    }

    fn processor(
        store: Arc<dyn Store>,
        sender: Arc<RecordingSender>,
        settings: BroadcastSettings,
    ) -> BroadcastProcessor {
        let senders = Arc::new(SenderPool::new(move |_| {
            Ok(sender.clone() as Arc<dyn MessageSender>)
        }));
        BroadcastProcessor::new(store, senders, settings)
    }

    #[test]
    fn renders_known_placeholders() {
        let ana = contact("Ana", Some("Ruiz"), None);
        assert_eq!(
            render_template("Hola {first_name}, tenemos una casa para {full_name}", &ana),
            "Hola Ana, tenemos una casa para Ana Ruiz"
        );
        assert_eq!(render_template("{last_name}!", &contact("Luis", None, None)), "!");
    }

    #[test]
    fn unknown_placeholders_stay_literal() {
        let ana = contact("Ana", None, None);
        assert_eq!(render_template("Hola {first_name}, {agent}", &ana), "Hola Ana, {agent}");
        assert_eq!(render_template("precio {", &ana), "precio {");
        assert_eq!(render_template("}{first_name}", &ana), "}Ana");
    }

    #[tokio::test]
    async fn large_broadcast_completes_over_several_batches() {
        let contacts = (0..120)
            .map(|i| contact("Ana", None, Some(&format!("+52 33 1000 {:04}", i))))
            .collect();
        let f = fixture("Hola {first_name}", contacts, 50).await;

        let first = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(first.processed, 50);
        assert_eq!(first.sent, 50);
        assert_eq!(first.remaining, 70);
        assert!(!first.completed);

        let pending = f
            .store
            .count_recipients(f.broadcast_id, &[RecipientStatus::Pending])
            .await
            .unwrap();
        assert_eq!(pending, 70);
        let broadcast = f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap();
        assert_eq!(broadcast.status, BroadcastStatus::Sending);

        let second = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(second.processed, 50);
        assert!(!second.completed);

        let third = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(third.processed, 20);
        assert!(third.completed);

        let broadcast = f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap();
        assert_eq!(broadcast.status, BroadcastStatus::Completed);
        assert_eq!(broadcast.sent_count, 120);
        assert_eq!(broadcast.failed_count, 0);
        assert!(broadcast.completed_at.is_some());
        assert_eq!(f.sender.sent.lock().await.len(), 120);

        // further calls are no-ops
        let again = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(again.processed, 0);
        assert!(again.completed);
        assert_eq!(f.sender.sent.lock().await.len(), 120);
    }

    #[tokio::test]
    async fn recipients_without_phone_fail_without_sending() {
        let contacts = vec![
            contact("Ana", Some("Ruiz"), Some("3312345678")),
            contact("Luis", None, None),
            contact("Eva", None, Some("   ")),
            contact("Sin", None, Some("0001234567")),
        ];
        let f = fixture("Hola {full_name}", contacts, 50).await;

        let summary = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 3);
        assert!(summary.completed);

        let sent = f.sender.sent.lock().await.clone();
        assert_eq!(sent, vec![("3312345678".to_string(), "Hola Ana Ruiz".to_string())]);

        let recipients = f.store.recipients(f.broadcast_id).await;
        let no_phone = recipients
            .iter()
            .filter(|r| r.error_message.as_deref() == Some("Contact has no phone number"))
            .count();
        assert_eq!(no_phone, 2);
        assert!(recipients.iter().all(|r| r.status.is_final()));

        let broadcast = f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap();
        assert_eq!(broadcast.sent_count, 1);
        assert_eq!(broadcast.failed_count, 3);
    }

    #[tokio::test]
    async fn missing_contact_fails_the_recipient() {
        let f = fixture("Hola", vec![], 10).await;
        f.store
            .insert_broadcast(
                f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap(),
                vec![BroadcastRecipient {
                    id: Uuid::new_v4(),
                    broadcast_id: f.broadcast_id,
                    contact_id: Uuid::new_v4(),
                    status: RecipientStatus::Pending,
                    error_message: None,
                    sent_at: None,
                }],
            )
            .await;

        let summary = f.processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(summary.failed, 1);
        let recipients = f.store.recipients(f.broadcast_id).await;
        assert_eq!(recipients[0].error_message.as_deref(), Some("Contact not found"));
    }

    #[tokio::test]
    async fn unknown_broadcast_is_an_error() {
        let f = fixture("Hola", vec![], 10).await;
        let missing = Uuid::new_v4();
        let err = f.processor.process_batch(missing).await.unwrap_err();
        assert!(matches!(err, ServiceError::BroadcastNotFound(id) if id == missing));
    }

    /// Delegates to a [`MemoryStore`] but fails one `get_contact` call
    struct FlakyContacts {
        inner: Arc<MemoryStore>,
        fail_on_call: usize,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Store for FlakyContacts {
        async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
            self.inner.get_property(id).await
        }
        async fn create_property(&self, agency_id: Uuid, data: &PropertyData) -> StoreResult<Property> {
            self.inner.create_property(agency_id, data).await
        }
        async fn portal_integrations(&self, agency_id: Uuid) -> StoreResult<Vec<PortalIntegration>> {
            self.inner.portal_integrations(agency_id).await
        }
        async fn find_publication(&self, property_id: Uuid, portal: &str) -> StoreResult<Option<PublicationRecord>> {
            self.inner.find_publication(property_id, portal).await
        }
        async fn publications_for_property(&self, property_id: Uuid) -> StoreResult<Vec<PublicationRecord>> {
            self.inner.publications_for_property(property_id).await
        }
        async fn save_publication(&self, record: &PublicationRecord) -> StoreResult<PublicationRecord> {
            self.inner.save_publication(record).await
        }
        async fn append_publication_log(&self, entry: &PublicationLog) -> StoreResult<()> {
            self.inner.append_publication_log(entry).await
        }
        async fn publication_logs(&self, property_id: Uuid) -> StoreResult<Vec<PublicationLog>> {
            self.inner.publication_logs(property_id).await
        }
        async fn create_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
            self.inner.create_scraping_job(job).await
        }
        async fn update_scraping_job(&self, job: &ScrapingJob) -> StoreResult<()> {
            self.inner.update_scraping_job(job).await
        }
        async fn get_scraping_job(&self, id: Uuid) -> StoreResult<Option<ScrapingJob>> {
            self.inner.get_scraping_job(id).await
        }
        async fn find_scraped_listing(&self, source: ScrapeSource, external_id: &str) -> StoreResult<Option<ScrapedListing>> {
            self.inner.find_scraped_listing(source, external_id).await
        }
        async fn get_scraped_listing(&self, id: Uuid) -> StoreResult<Option<ScrapedListing>> {
            self.inner.get_scraped_listing(id).await
        }
        async fn insert_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
            self.inner.insert_scraped_listing(listing).await
        }
        async fn update_scraped_listing(&self, listing: &ScrapedListing) -> StoreResult<()> {
            self.inner.update_scraped_listing(listing).await
        }
        async fn mark_listing_imported(&self, id: Uuid, property_id: Uuid) -> StoreResult<()> {
            self.inner.mark_listing_imported(id, property_id).await
        }
        async fn get_broadcast(&self, id: Uuid) -> StoreResult<Option<Broadcast>> {
            self.inner.get_broadcast(id).await
        }
        async fn set_broadcast_status(&self, id: Uuid, status: BroadcastStatus) -> StoreResult<()> {
            self.inner.set_broadcast_status(id, status).await
        }
        async fn claim_pending_recipients(&self, broadcast_id: Uuid, limit: usize) -> StoreResult<Vec<BroadcastRecipient>> {
            self.inner.claim_pending_recipients(broadcast_id, limit).await
        }
        async fn release_recipients(&self, ids: &[Uuid]) -> StoreResult<()> {
            self.inner.release_recipients(ids).await
        }
        async fn finish_recipient(&self, recipient: &BroadcastRecipient) -> StoreResult<()> {
            self.inner.finish_recipient(recipient).await
        }
        async fn increment_broadcast_counters(&self, id: Uuid, sent: i32, failed: i32) -> StoreResult<()> {
            self.inner.increment_broadcast_counters(id, sent, failed).await
        }
        async fn count_recipients(&self, broadcast_id: Uuid, statuses: &[RecipientStatus]) -> StoreResult<i64> {
            self.inner.count_recipients(broadcast_id, statuses).await
        }
        async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if call == self.fail_on_call {
                return Err(StoreError::Corrupt("connection reset".to_string()));
            }
            self.inner.get_contact(id).await
        }
    }

    #[tokio::test]
    async fn store_failure_mid_batch_releases_claims_and_keeps_counts() {
        let contacts = (0..5)
            .map(|i| contact("Ana", None, Some(&format!("33100000{:02}", i))))
            .collect();
        let f = fixture("Hola {first_name}", contacts, 5).await;
        let flaky = Arc::new(FlakyContacts {
            inner: f.store.clone(),
            fail_on_call: 3,
            calls: Default::default(),
        });
        let processor = processor(
            flaky,
            f.sender.clone(),
            BroadcastSettings {
                batch_size: 5,
                message_delay: Duration::ZERO,
            },
        );

        let err = processor.process_batch(f.broadcast_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Corrupt(_))));

        let statuses: Vec<RecipientStatus> = f
            .store
            .recipients(f.broadcast_id)
            .await
            .iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(
            statuses,
            [
                RecipientStatus::Sent,
                RecipientStatus::Sent,
                RecipientStatus::Pending,
                RecipientStatus::Pending,
                RecipientStatus::Pending,
            ]
        );
        let broadcast = f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap();
        assert_eq!(broadcast.sent_count, 2);
        assert_eq!(broadcast.status, BroadcastStatus::Sending);

        // the next batch picks up the released recipients and finishes
        let summary = processor.process_batch(f.broadcast_id).await.unwrap();
        assert_eq!(summary.processed, 3);
        assert!(summary.completed);

        let broadcast = f.store.get_broadcast(f.broadcast_id).await.unwrap().unwrap();
        assert_eq!(broadcast.sent_count, 5);
        assert_eq!(broadcast.failed_count, 0);
        assert_eq!(broadcast.status, BroadcastStatus::Completed);
        assert_eq!(f.sender.sent.lock().await.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_applies_only_between_actual_sends() {
        let contacts = vec![
            contact("Ana", None, Some("3312345601")),
            contact("Luis", None, None),
            contact("Eva", None, Some("3312345602")),
            contact("Sara", None, Some("3312345603")),
        ];
        let f = fixture("Hola", contacts, 10).await;
        let processor = processor(
            f.store.clone(),
            f.sender.clone(),
            BroadcastSettings {
                batch_size: 10,
                message_delay: Duration::from_secs(2),
            },
        );

        let started = tokio::time::Instant::now();
        let summary = processor.process_batch(f.broadcast_id).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(summary.sent, 3);
        assert_eq!(summary.failed, 1);
        // three sends, two pauses; the phone-less contact adds none
        assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "elapsed {:?}", elapsed);
    }
}
