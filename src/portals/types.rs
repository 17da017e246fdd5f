use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Listing portals the factory knows how to talk to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PortalId {
    Inmuebles24,
    Vivanuncios,
    Lamudi,
}

impl PortalId {
    /// Identifier as stored in integration and publication rows
    pub fn as_str(&self) -> &'static str {
        match self {
            PortalId::Inmuebles24 => "inmuebles24",
            PortalId::Vivanuncios => "vivanuncios",
            PortalId::Lamudi => "lamudi",
        }
    }

    /// Human-readable portal name
    pub fn display_name(&self) -> &'static str {
        match self {
            PortalId::Inmuebles24 => "Inmuebles24",
            PortalId::Vivanuncios => "Vivanuncios",
            PortalId::Lamudi => "Lamudi",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            PortalId::Inmuebles24 => "https://api.inmuebles24.com/v1",
            PortalId::Vivanuncios => "https://api.vivanuncios.com.mx/v2",
            PortalId::Lamudi => "https://partners.lamudi.com.mx/api/v1",
        }
    }

    /// Public listing URL for an external id
    pub fn listing_url(&self, external_id: &str) -> String {
        match self {
            PortalId::Inmuebles24 => {
                format!("https://www.inmuebles24.com/propiedades/{}.html", external_id)
            }
            PortalId::Vivanuncios => format!("https://www.vivanuncios.com.mx/a/{}", external_id),
            PortalId::Lamudi => format!("https://www.lamudi.com.mx/detalle/{}", external_id),
        }
    }
}

impl std::str::FromStr for PortalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inmuebles24" => Ok(PortalId::Inmuebles24),
            "vivanuncios" => Ok(PortalId::Vivanuncios),
            "lamudi" => Ok(PortalId::Lamudi),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for PortalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Misconfigured integration: a programmer/setup error, not a portal failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PortalConfigError {
    #[error("{portal} integration is missing required credential `{field}`")]
    MissingCredential { portal: PortalId, field: &'static str },

    #[error("{portal} integration has invalid settings: {message}")]
    InvalidSettings { portal: String, message: String },
}

/// Opaque per-portal credential fields as stored for the agency
#[derive(Debug, Clone, Default)]
pub struct PortalCredentials(Map<String, Value>);

impl PortalCredentials {
    pub fn from_value(value: &Value) -> Self {
        Self(value.as_object().cloned().unwrap_or_default())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, portal: PortalId, field: &'static str) -> Result<String, PortalConfigError> {
        self.get(field)
            .map(str::to_string)
            .ok_or(PortalConfigError::MissingCredential { portal, field })
    }
}

/// Per-integration settings stored next to the credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalSettings {
    /// Simulate the portal locally instead of calling its API
    pub sandbox: bool,
    /// Delay applied to every sandbox call
    pub simulated_latency_ms: u64,
    /// Sandbox only: fail every mutating call with this message
    pub simulate_error: Option<String>,
    /// Override of the portal's API base URL
    pub base_url: Option<String>,
    /// Ask the portal to feature new listings, where supported
    pub publish_as_featured: bool,
}

impl PortalSettings {
    pub fn from_value(portal: &str, value: &Value) -> Result<Self, PortalConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| PortalConfigError::InvalidSettings {
            portal: portal.to_string(),
            message: e.to_string(),
        })
    }

    pub fn sandboxed(latency_ms: u64) -> Self {
        Self {
            sandbox: true,
            simulated_latency_ms: latency_ms,
            ..Self::default()
        }
    }
}
