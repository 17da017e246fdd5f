//! Orchestration on top of the portal clients, the store and messaging.

pub mod broadcast;
pub mod publication;

pub use broadcast::{render_template, BatchSummary, BroadcastProcessor, BroadcastSettings};
pub use publication::{PortalOutcome, PublicationService, PublicationSummary, StatusSync};
