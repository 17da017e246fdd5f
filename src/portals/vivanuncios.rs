use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::http::{failure, json_count, json_id, Auth, PortalHttp};
use super::traits::{ConnectionTest, ListingState, PortalClient, PortalResult, PortalStatus};
use super::types::{PortalConfigError, PortalCredentials, PortalId, PortalSettings};
use crate::models::{Operation, PropertyData};

/// Vivanuncios classifieds API client (OAuth bearer token)
pub struct VivanunciosClient {
    http: PortalHttp,
}

impl VivanunciosClient {
    pub fn new(
        client: Client,
        credentials: &PortalCredentials,
        settings: &PortalSettings,
    ) -> Result<Self, PortalConfigError> {
        let token = credentials.require(PortalId::Vivanuncios, "access_token")?;
        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(PortalId::Vivanuncios.default_base_url());

        Ok(Self {
            http: PortalHttp::new(client, base_url, Auth::Bearer(token)),
        })
    }

    fn error_message(body: &Value) -> Option<String> {
        body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .map(str::to_string)
    }
}

/// Vivanuncios real-estate category ids
fn category_id(operation: Operation, property_type: &str) -> u32 {
    let is_apartment = matches!(
        property_type.to_ascii_lowercase().as_str(),
        "departamento" | "apartment" | "depa"
    );
    let is_land = matches!(
        property_type.to_ascii_lowercase().as_str(),
        "terreno" | "land" | "lote"
    );
    match (operation, is_apartment, is_land) {
        (_, _, true) => 1010,
        (Operation::Sale, true, _) => 1004,
        (Operation::Sale, false, _) => 1002,
        (Operation::Rent, true, _) => 1005,
        (Operation::Rent, false, _) => 1003,
    }
}

pub(crate) fn ad_payload(data: &PropertyData) -> Value {
    let mut attributes = Vec::new();
    if let Some(bedrooms) = data.bedrooms {
        attributes.push(json!({ "name": "bedrooms", "value": bedrooms.to_string() }));
    }
    if let Some(bathrooms) = data.bathrooms {
        attributes.push(json!({ "name": "bathrooms", "value": bathrooms.to_string() }));
    }
    if let Some(parking) = data.parking_spaces {
        attributes.push(json!({ "name": "parking", "value": parking.to_string() }));
    }
    if let Some(area) = data.construction_m2 {
        attributes.push(json!({ "name": "built_area_m2", "value": area.to_string() }));
    }
    if let Some(area) = data.land_m2 {
        attributes.push(json!({ "name": "lot_area_m2", "value": area.to_string() }));
    }

    let mut body = data.description.clone();
    if !data.features.is_empty() {
        body.push_str("\n\n");
        body.push_str(&data.features.join(" · "));
    }

    json!({
        "title": data.title,
        "body": body,
        "category_id": category_id(data.operation, &data.property_type),
        "price": {
            "amount": data.price,
            "currency": data.currency,
        },
        "location": {
            "address": data.location.address,
            "neighborhood": data.location.neighborhood,
            "city": data.location.city,
            "state": data.location.state,
            "zip": data.location.postal_code,
            "lat": data.location.latitude,
            "lng": data.location.longitude,
        },
        "attributes": attributes,
        "pictures": data.images.iter().map(|url| json!({ "url": url })).collect::<Vec<_>>(),
    })
}

#[async_trait]
impl PortalClient for VivanunciosClient {
    fn portal(&self) -> PortalId {
        PortalId::Vivanuncios
    }

    async fn publish(&self, property: &PropertyData) -> PortalResult {
        let payload = ad_payload(property);
        match self.http.call(Method::POST, "/ads", Some(&payload)).await {
            Ok(body) => {
                let external_id = json_id(&body["ad"]["id"]);
                let external_url = body["ad"]["permalink"].as_str().map(str::to_string);
                match external_id {
                    Some(id) => {
                        info!(external_id = %id, "Published ad on Vivanuncios");
                        let url = external_url.unwrap_or_else(|| PortalId::Vivanuncios.listing_url(&id));
                        PortalResult::ok(Some(id), Some(url), body)
                    }
                    None => PortalResult::failed("Vivanuncios response did not include an ad id", body),
                }
            }
            Err(e) => {
                warn!(error = %e, "Vivanuncios publish failed");
                failure(e, Self::error_message)
            }
        }
    }

    async fn update(&self, external_id: &str, property: &PropertyData) -> PortalResult {
        let payload = ad_payload(property);
        let path = format!("/ads/{}", external_id);
        match self.http.call(Method::PUT, &path, Some(&payload)).await {
            Ok(body) => {
                let url = body["ad"]["permalink"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| PortalId::Vivanuncios.listing_url(external_id));
                PortalResult::ok(Some(external_id.to_string()), Some(url), body)
            }
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn unpublish(&self, external_id: &str) -> PortalResult {
        let path = format!("/ads/{}/deactivate", external_id);
        match self.http.call(Method::POST, &path, None).await {
            Ok(body) => PortalResult::ok(Some(external_id.to_string()), None, body),
            // already gone on the portal side
            Err(e) if e
                .status()
                .map_or(false, |s| s == StatusCode::NOT_FOUND || s == StatusCode::GONE) =>
            {
                PortalResult::ok(Some(external_id.to_string()), None, e.raw())
            }
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn get_status(&self, external_id: &str) -> PortalStatus {
        let path = format!("/ads/{}", external_id);
        match self.http.call(Method::GET, &path, None).await {
            Ok(body) => PortalStatus {
                status: match body["ad"]["status"].as_str().unwrap_or_default() {
                    "ACTIVE" => ListingState::Active,
                    "PENDING" | "IN_REVIEW" => ListingState::Pending,
                    "PAUSED" => ListingState::Paused,
                    "DELETED" | "EXPIRED" | "DEACTIVATED" => ListingState::Removed,
                    _ => ListingState::Unknown,
                },
                views: json_count(&body["metrics"]["views"]),
                contacts: json_count(&body["metrics"]["replies"]),
                last_synced_at: Utc::now(),
                portal_url: body["ad"]["permalink"].as_str().map(str::to_string),
                error: None,
            },
            Err(e) => PortalStatus::unavailable(failure(e, Self::error_message).error.unwrap_or_default()),
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        let result = self.http.call(Method::GET, "/me", None).await;
        ConnectionTest {
            connected: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            portal_name: PortalId::Vivanuncios.display_name().to_string(),
            tested_at: Utc::now(),
        }
    }
}
