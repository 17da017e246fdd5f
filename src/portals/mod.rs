pub mod factory;
mod http;
pub mod inmuebles24;
pub mod lamudi;
pub mod sandbox;
pub mod traits;
pub mod types;
pub mod vivanuncios;

pub use factory::create_client;
pub use traits::{ConnectionTest, ListingState, PortalClient, PortalResult, PortalStatus};
pub use types::{PortalConfigError, PortalCredentials, PortalId, PortalSettings};
