pub mod broadcast;
pub mod property;
pub mod publication;
pub mod scraping;

pub use broadcast::{Broadcast, BroadcastRecipient, BroadcastStatus, Contact, RecipientStatus};
pub use property::{Location, Operation, Property, PropertyData};
pub use publication::{
    PortalIntegration, PublicationAction, PublicationLog, PublicationRecord, PublicationStatus,
};
pub use scraping::{JobStatus, ScrapeSource, ScrapedListing, ScrapingJob};

/// Error returned when a stored enum column holds an unknown value
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
