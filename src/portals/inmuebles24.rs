use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::http::{failure, json_count, json_id, Auth, PortalHttp};
use super::traits::{ConnectionTest, ListingState, PortalClient, PortalResult, PortalStatus};
use super::types::{PortalConfigError, PortalCredentials, PortalId, PortalSettings};
use crate::models::{Operation, PropertyData};

/// Inmuebles24 publisher API client
///
/// Authenticates with an `X-Api-Key` header; every listing ("aviso") is owned
/// by the publisher account in `publisher_id`.
pub struct Inmuebles24Client {
    http: PortalHttp,
    publisher_id: String,
    featured: bool,
}

impl Inmuebles24Client {
    pub fn new(
        client: Client,
        credentials: &PortalCredentials,
        settings: &PortalSettings,
    ) -> Result<Self, PortalConfigError> {
        let api_key = credentials.require(PortalId::Inmuebles24, "api_key")?;
        let publisher_id = credentials.require(PortalId::Inmuebles24, "publisher_id")?;
        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(PortalId::Inmuebles24.default_base_url());

        Ok(Self {
            http: PortalHttp::new(
                client,
                base_url,
                Auth::Header {
                    name: "X-Api-Key",
                    value: api_key,
                },
            ),
            publisher_id,
            featured: settings.publish_as_featured,
        })
    }

    fn error_message(body: &Value) -> Option<String> {
        body["mensaje"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .map(str::to_string)
    }

    fn listing_result(body: Value) -> PortalResult {
        let aviso = if body["aviso"].is_object() { &body["aviso"] } else { &body };
        let external_id = json_id(&aviso["id"]);
        let external_url = aviso["url"]
            .as_str()
            .map(str::to_string)
            .or_else(|| external_id.as_deref().map(|id| PortalId::Inmuebles24.listing_url(id)));

        match external_id {
            Some(id) => PortalResult::ok(Some(id), external_url, body),
            None => PortalResult::failed("Inmuebles24 response did not include a listing id", body),
        }
    }
}

/// Inmuebles24 property type codes
fn tipo_propiedad(property_type: &str) -> &'static str {
    match property_type.to_ascii_lowercase().as_str() {
        "casa" | "house" => "casa",
        "departamento" | "apartment" | "depa" => "departamento",
        "terreno" | "land" | "lote" => "terreno",
        "oficina" | "office" => "oficina",
        "local" | "local comercial" | "commercial" => "local-comercial",
        "bodega" | "warehouse" => "bodega-comercial",
        _ => "otros",
    }
}

pub(crate) fn listing_payload(publisher_id: &str, data: &PropertyData, featured: bool) -> Value {
    let imagenes: Vec<Value> = data
        .images
        .iter()
        .enumerate()
        .map(|(i, url)| json!({ "url": url, "orden": i + 1 }))
        .collect();

    json!({
        "anunciante": publisher_id,
        "titulo": data.title,
        "descripcion": data.description,
        "operacion": match data.operation {
            Operation::Sale => "venta",
            Operation::Rent => "renta",
        },
        "tipoPropiedad": tipo_propiedad(&data.property_type),
        "precio": {
            "monto": data.price,
            "moneda": data.currency,
        },
        "ubicacion": {
            "direccion": data.location.address,
            "colonia": data.location.neighborhood,
            "ciudad": data.location.city,
            "estado": data.location.state,
            "codigoPostal": data.location.postal_code,
            "latitud": data.location.latitude,
            "longitud": data.location.longitude,
        },
        "caracteristicas": {
            "recamaras": data.bedrooms,
            "banos": data.bathrooms,
            "estacionamientos": data.parking_spaces,
            "superficieConstruida": data.construction_m2,
            "superficieTerreno": data.land_m2,
            "amenidades": data.features,
        },
        "imagenes": imagenes,
        "destacado": featured,
    })
}

#[async_trait]
impl PortalClient for Inmuebles24Client {
    fn portal(&self) -> PortalId {
        PortalId::Inmuebles24
    }

    async fn publish(&self, property: &PropertyData) -> PortalResult {
        let payload = listing_payload(&self.publisher_id, property, self.featured);
        match self.http.call(Method::POST, "/avisos", Some(&payload)).await {
            Ok(body) => {
                let result = Self::listing_result(body);
                if let Some(id) = &result.external_id {
                    info!(external_id = %id, "Published listing on Inmuebles24");
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "Inmuebles24 publish failed");
                failure(e, Self::error_message)
            }
        }
    }

    async fn update(&self, external_id: &str, property: &PropertyData) -> PortalResult {
        let payload = listing_payload(&self.publisher_id, property, self.featured);
        let path = format!("/avisos/{}", external_id);
        match self.http.call(Method::PUT, &path, Some(&payload)).await {
            // the update endpoint may answer 204 with no body
            Ok(body) => PortalResult::ok(
                Some(external_id.to_string()),
                Some(PortalId::Inmuebles24.listing_url(external_id)),
                body,
            ),
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn unpublish(&self, external_id: &str) -> PortalResult {
        let path = format!("/avisos/{}", external_id);
        match self.http.call(Method::DELETE, &path, None).await {
            Ok(body) => PortalResult::ok(Some(external_id.to_string()), None, body),
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn get_status(&self, external_id: &str) -> PortalStatus {
        let path = format!("/avisos/{}/estadisticas", external_id);
        match self.http.call(Method::GET, &path, None).await {
            Ok(body) => PortalStatus {
                status: match body["estado"].as_str().unwrap_or_default() {
                    "activo" | "publicado" => ListingState::Active,
                    "pendiente" | "en_revision" => ListingState::Pending,
                    "pausado" => ListingState::Paused,
                    "finalizado" | "eliminado" => ListingState::Removed,
                    _ => ListingState::Unknown,
                },
                views: json_count(&body["visitas"]),
                contacts: json_count(&body["contactos"]),
                last_synced_at: Utc::now(),
                portal_url: body["url"]
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| Some(PortalId::Inmuebles24.listing_url(external_id))),
                error: None,
            },
            Err(e) => PortalStatus::unavailable(failure(e, Self::error_message).error.unwrap_or_default()),
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        let path = format!("/anunciantes/{}", self.publisher_id);
        let result = self.http.call(Method::GET, &path, None).await;
        ConnectionTest {
            connected: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            portal_name: PortalId::Inmuebles24.display_name().to_string(),
            tested_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_spanish_vocabulary() {
        let data = PropertyData::sample();
        let payload = listing_payload("PUB-9", &data, true);

        assert_eq!(payload["anunciante"], "PUB-9");
        assert_eq!(payload["operacion"], "venta");
        assert_eq!(payload["tipoPropiedad"], "casa");
        assert_eq!(payload["precio"]["monto"], 4_850_000);
        assert_eq!(payload["precio"]["moneda"], "MXN");
        assert_eq!(payload["ubicacion"]["colonia"], "Providencia");
        assert_eq!(payload["caracteristicas"]["recamaras"], 3);
        assert_eq!(payload["imagenes"][0]["orden"], 1);
        assert_eq!(payload["destacado"], true);
    }

    #[test]
    fn listing_result_reads_nested_or_flat_ids() {
        let nested = Inmuebles24Client::listing_result(json!({ "aviso": { "id": 5512, "url": "https://i24/5512" } }));
        assert!(nested.success);
        assert_eq!(nested.external_id.as_deref(), Some("5512"));
        assert_eq!(nested.external_url.as_deref(), Some("https://i24/5512"));

        let flat = Inmuebles24Client::listing_result(json!({ "id": "A-1" }));
        assert_eq!(
            flat.external_url.as_deref(),
            Some("https://www.inmuebles24.com/propiedades/A-1.html")
        );

        let missing = Inmuebles24Client::listing_result(json!({ "ok": true }));
        assert!(!missing.success);
    }

    #[test]
    fn missing_publisher_is_a_config_error() {
        let creds = PortalCredentials::from_value(&json!({ "api_key": "k" }));
        let err = Inmuebles24Client::new(Client::new(), &creds, &PortalSettings::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            PortalConfigError::MissingCredential {
                portal: PortalId::Inmuebles24,
                field: "publisher_id"
            }
        );
    }
}
