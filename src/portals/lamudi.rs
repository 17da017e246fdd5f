use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::http::{failure, json_count, json_id, Auth, PortalHttp};
use super::traits::{ConnectionTest, ListingState, PortalClient, PortalResult, PortalStatus};
use super::types::{PortalConfigError, PortalCredentials, PortalId, PortalSettings};
use crate::models::{Operation, PropertyData};

/// Lamudi partner feed API client (HTTP basic auth with partner id + key)
pub struct LamudiClient {
    http: PortalHttp,
}

impl LamudiClient {
    pub fn new(
        client: Client,
        credentials: &PortalCredentials,
        settings: &PortalSettings,
    ) -> Result<Self, PortalConfigError> {
        let partner_id = credentials.require(PortalId::Lamudi, "partner_id")?;
        let api_key = credentials.require(PortalId::Lamudi, "api_key")?;
        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(PortalId::Lamudi.default_base_url());

        Ok(Self {
            http: PortalHttp::new(
                client,
                base_url,
                Auth::Basic {
                    user: partner_id,
                    password: api_key,
                },
            ),
        })
    }

    fn error_message(body: &Value) -> Option<String> {
        let details: Vec<&str> = body["errors"]
            .as_array()?
            .iter()
            .filter_map(|e| e["detail"].as_str())
            .collect();
        if details.is_empty() {
            None
        } else {
            Some(details.join("; "))
        }
    }
}

pub(crate) fn listing_payload(data: &PropertyData) -> Value {
    json!({
        "listing": {
            "title": data.title,
            "description": data.description,
            "offer_type": match data.operation {
                Operation::Sale => "sell",
                Operation::Rent => "rent",
            },
            "property_type": data.property_type.to_ascii_lowercase(),
            "price": data.price,
            "currency": data.currency,
            "address": {
                "street": data.location.address,
                "area": data.location.neighborhood,
                "city": data.location.city,
                "region": data.location.state,
                "postcode": data.location.postal_code,
            },
            "geo": match (data.location.latitude, data.location.longitude) {
                (Some(lat), Some(lng)) => json!({ "lat": lat, "lng": lng }),
                _ => Value::Null,
            },
            "rooms": data.bedrooms,
            "bathrooms": data.bathrooms,
            "car_spaces": data.parking_spaces,
            "living_size": data.construction_m2,
            "land_size": data.land_m2,
            "amenities": data.features,
            "images": data.images,
        }
    })
}

#[async_trait]
impl PortalClient for LamudiClient {
    fn portal(&self) -> PortalId {
        PortalId::Lamudi
    }

    async fn publish(&self, property: &PropertyData) -> PortalResult {
        let payload = listing_payload(property);
        match self.http.call(Method::POST, "/listings", Some(&payload)).await {
            Ok(body) => match json_id(&body["data"]["listing_id"]) {
                Some(id) => {
                    info!(external_id = %id, "Published listing on Lamudi");
                    let url = body["data"]["listing_url"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| PortalId::Lamudi.listing_url(&id));
                    PortalResult::ok(Some(id), Some(url), body)
                }
                None => PortalResult::failed("Lamudi response did not include a listing id", body),
            },
            Err(e) => {
                warn!(error = %e, "Lamudi publish failed");
                failure(e, Self::error_message)
            }
        }
    }

    async fn update(&self, external_id: &str, property: &PropertyData) -> PortalResult {
        let payload = listing_payload(property);
        let path = format!("/listings/{}", external_id);
        match self.http.call(Method::PATCH, &path, Some(&payload)).await {
            Ok(body) => PortalResult::ok(
                Some(external_id.to_string()),
                Some(PortalId::Lamudi.listing_url(external_id)),
                body,
            ),
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn unpublish(&self, external_id: &str) -> PortalResult {
        let path = format!("/listings/{}", external_id);
        match self.http.call(Method::DELETE, &path, None).await {
            Ok(body) => PortalResult::ok(Some(external_id.to_string()), None, body),
            Err(e) => failure(e, Self::error_message),
        }
    }

    async fn get_status(&self, external_id: &str) -> PortalStatus {
        let path = format!("/listings/{}/stats", external_id);
        match self.http.call(Method::GET, &path, None).await {
            Ok(body) => {
                let data = &body["data"];
                PortalStatus {
                    status: match data["state"].as_str().unwrap_or_default() {
                        "online" => ListingState::Active,
                        "moderation" => ListingState::Pending,
                        "offline" => ListingState::Paused,
                        "deleted" => ListingState::Removed,
                        _ => ListingState::Unknown,
                    },
                    views: json_count(&data["page_views"]),
                    contacts: json_count(&data["leads"]),
                    last_synced_at: Utc::now(),
                    portal_url: data["listing_url"].as_str().map(str::to_string),
                    error: None,
                }
            }
            Err(e) => PortalStatus::unavailable(failure(e, Self::error_message).error.unwrap_or_default()),
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        let result = self.http.call(Method::GET, "/partners/me", None).await;
        ConnectionTest {
            connected: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            portal_name: PortalId::Lamudi.display_name().to_string(),
            tested_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_wrapped_in_listing() {
        let mut data = PropertyData::sample();
        data.operation = Operation::Rent;
        data.location.longitude = None;

        let payload = listing_payload(&data);
        let listing = &payload["listing"];
        assert_eq!(listing["offer_type"], "rent");
        assert_eq!(listing["rooms"], 3);
        assert!(listing["geo"].is_null());
        assert_eq!(listing["images"][0], "https://cdn.example.com/p/1.jpg");
    }

    #[test]
    fn error_details_are_joined() {
        let body = json!({ "errors": [{ "detail": "price required" }, { "detail": "bad city" }] });
        assert_eq!(
            LamudiClient::error_message(&body).as_deref(),
            Some("price required; bad city")
        );
        assert_eq!(LamudiClient::error_message(&json!({ "errors": [] })), None);
    }
}
