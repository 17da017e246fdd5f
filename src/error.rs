use thiserror::Error;
use uuid::Uuid;

use crate::models::UnknownVariant;

/// Errors raised by a [`crate::store::Store`] implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Request-level failures of the publication, scraping and broadcast services
///
/// External-service failures never show up here: they are reported per portal
/// or per recipient in the operation's summary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Property {0} not found")]
    PropertyNotFound(Uuid),

    #[error("Broadcast {0} not found")]
    BroadcastNotFound(Uuid),

    #[error("Scraped listing {0} not found")]
    ListingNotFound(Uuid),

    #[error("Messaging setup error: {0}")]
    Messaging(#[from] crate::messaging::MessagingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
