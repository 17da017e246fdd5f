use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::lamudi::LamudiClient;
use super::sandbox::SandboxClient;
use super::traits::PortalClient;
use super::types::{PortalConfigError, PortalCredentials, PortalId, PortalSettings};
use super::{inmuebles24::Inmuebles24Client, vivanuncios::VivanunciosClient};

/// Map a stored portal id to a client. No I/O happens here.
///
/// Returns `Ok(None)` for portals without a client so callers can skip them;
/// `Err` only when a recognized portal is missing required configuration.
pub fn create_client(
    portal_id: &str,
    credentials: &Value,
    settings: &Value,
    http: &Client,
) -> Result<Option<Box<dyn PortalClient>>, PortalConfigError> {
    let portal: PortalId = match portal_id.parse() {
        Ok(portal) => portal,
        Err(_) => {
            debug!(portal_id, "No client for portal");
            return Ok(None);
        }
    };

    let settings = PortalSettings::from_value(portal_id, settings)?;
    if settings.sandbox {
        return Ok(Some(Box::new(SandboxClient::new(portal, &settings))));
    }

    let credentials = PortalCredentials::from_value(credentials);
    let client: Box<dyn PortalClient> = match portal {
        PortalId::Inmuebles24 => Box::new(Inmuebles24Client::new(http.clone(), &credentials, &settings)?),
        PortalId::Vivanuncios => Box::new(VivanunciosClient::new(http.clone(), &credentials, &settings)?),
        PortalId::Lamudi => Box::new(LamudiClient::new(http.clone(), &credentials, &settings)?),
    };
    Ok(Some(client))
}
