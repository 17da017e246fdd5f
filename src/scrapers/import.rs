use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::models::{Location, Operation, PropertyData, ScrapedListing};
use crate::store::Store;

fn property_data(listing: &ScrapedListing) -> PropertyData {
    PropertyData {
        title: listing.title.clone(),
        description: listing.description.clone().unwrap_or_default(),
        price: listing.price.unwrap_or(0),
        currency: listing.currency.clone(),
        operation: listing.operation.unwrap_or(Operation::Sale),
        property_type: listing
            .property_type
            .clone()
            .unwrap_or_else(|| "otro".to_string()),
        location: Location {
            address: listing.address.clone().unwrap_or_default(),
            neighborhood: listing.raw_data["neighborhood"].as_str().map(str::to_string),
            city: listing.city.clone().unwrap_or_default(),
            state: listing.state.clone().unwrap_or_default(),
            postal_code: None,
            latitude: None,
            longitude: None,
        },
        bedrooms: listing.bedrooms,
        bathrooms: listing.bathrooms,
        parking_spaces: None,
        construction_m2: listing.area_m2,
        land_m2: None,
        features: vec![],
        images: listing.images.clone(),
    }
}

/// Convert a scraped listing into an agency property.
///
/// Importing an already imported listing returns the property created the
/// first time.
pub async fn import_listing(store: &dyn Store, listing_id: Uuid, agency_id: Uuid) -> Result<Uuid> {
    let listing = store
        .get_scraped_listing(listing_id)
        .await?
        .ok_or(ServiceError::ListingNotFound(listing_id))?;

    if let (true, Some(property_id)) = (listing.imported, listing.property_id) {
        return Ok(property_id);
    }

    let property = store.create_property(agency_id, &property_data(&listing)).await?;
    store.mark_listing_imported(listing.id, property.id).await?;

    info!(
        listing_id = %listing.id,
        property_id = %property.id,
        source = %listing.source,
        "Imported scraped listing"
    );
    Ok(property.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScrapeSource;
    use crate::scrapers::pipeline::upsert_listing;
    use crate::scrapers::types::NormalizedListing;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn import_creates_property_once() {
        let store = MemoryStore::new();
        let agency_id = Uuid::new_v4();
        let listing = NormalizedListing {
            external_id: "143987001".to_string(),
            url: "https://www.inmuebles24.com/propiedades/143987001.html".to_string(),
            title: "Casa en venta en Providencia".to_string(),
            description: None,
            price: Some(4_850_000),
            currency: "MXN".to_string(),
            operation: Some(Operation::Sale),
            property_type: Some("casa".to_string()),
            address: Some("Av. Providencia 2450".to_string()),
            city: Some("Guadalajara".to_string()),
            state: None,
            bedrooms: Some(3),
            bathrooms: Some(2.0),
            area_m2: Some(180.0),
            images: vec![],
            raw_data: json!({ "neighborhood": "Providencia" }),
        };
        upsert_listing(&store, ScrapeSource::Inmuebles24, &listing).await.unwrap();
        let listing_id = store.scraped_listings().await[0].id;

        let property_id = import_listing(&store, listing_id, agency_id).await.unwrap();
        let again = import_listing(&store, listing_id, agency_id).await.unwrap();
        assert_eq!(property_id, again);

        let stored = store.scraped_listings().await[0].clone();
        assert!(stored.imported);
        assert_eq!(stored.property_id, Some(property_id));

        let property = store.get_property(property_id).await.unwrap().unwrap();
        assert_eq!(property.agency_id, agency_id);
        assert_eq!(property.data.price, 4_850_000);
        assert_eq!(property.data.location.neighborhood.as_deref(), Some("Providencia"));
        assert_eq!(property.data.construction_m2, Some(180.0));
    }

    #[tokio::test]
    async fn unknown_listing_is_an_error() {
        let store = MemoryStore::new();
        let err = import_listing(&store, Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ListingNotFound(_)));
    }
}
