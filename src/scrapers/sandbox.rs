use async_trait::async_trait;
use serde_json::json;

use super::traits::ListingSource;
use super::types::{NormalizedListing, PageCursor, ScrapeError, ScrapeFilters, ScrapedPage};
use crate::models::{Operation, ScrapeSource};

/// Generated listings with a fixed number of result pages
///
/// Listing ids depend only on page and position, so repeated runs hit the
/// same `(source, external_id)` keys; `price_offset` lets a later run look
/// like a price change.
#[derive(Debug, Clone)]
pub struct SandboxSource {
    pub total_pages: u32,
    pub per_page: usize,
    pub price_offset: i64,
}

impl Default for SandboxSource {
    fn default() -> Self {
        Self {
            total_pages: 10,
            per_page: 20,
            price_offset: 0,
        }
    }
}

impl SandboxSource {
    pub fn new(total_pages: u32, per_page: usize) -> Self {
        Self {
            total_pages,
            per_page,
            price_offset: 0,
        }
    }

    pub fn with_price_offset(mut self, offset: i64) -> Self {
        self.price_offset = offset;
        self
    }

    fn listing(&self, page: u32, index: usize, filters: &ScrapeFilters) -> NormalizedListing {
        let city = filters.city.clone().unwrap_or_else(|| "Guadalajara".to_string());
        let operation = filters.operation.unwrap_or(Operation::Sale);
        let base_price = match operation {
            Operation::Sale => 2_500_000,
            Operation::Rent => 18_000,
        };
        let external_id = format!("SBX-{}-{}", page, index);

        NormalizedListing {
            url: format!("https://sandbox.portal-sync.local/listing/{}", external_id),
            title: format!("Departamento {} en {}", index + 1, city),
            description: Some("Listado generado".to_string()),
            price: Some(base_price + (page as i64) * 10_000 + (index as i64) * 1_000 + self.price_offset),
            currency: "MXN".to_string(),
            operation: Some(operation),
            property_type: Some("departamento".to_string()),
            address: Some(format!("Calle {} #{}", page, index + 1)),
            city: Some(city),
            state: None,
            bedrooms: Some(1 + (index % 3) as i32),
            bathrooms: Some(1.0),
            area_m2: Some(55.0 + index as f64),
            images: vec![],
            raw_data: json!({ "sandbox": true, "page": page, "index": index }),
            external_id,
        }
    }
}

#[async_trait]
impl ListingSource for SandboxSource {
    async fn fetch_page(
        &self,
        cursor: &PageCursor,
        filters: &ScrapeFilters,
    ) -> Result<ScrapedPage, ScrapeError> {
        if cursor.page == 0 || cursor.page > self.total_pages {
            return Ok(ScrapedPage {
                listings: vec![],
                next_cursor: None,
            });
        }

        let listings = (0..self.per_page)
            .map(|i| self.listing(cursor.page, i, filters))
            .collect();
        let next_cursor = (cursor.page < self.total_pages)
            .then(|| cursor.next_after(Some(format!("after-{}", cursor.page))));

        Ok(ScrapedPage {
            listings,
            next_cursor,
        })
    }

    fn source(&self) -> ScrapeSource {
        ScrapeSource::Sandbox
    }
}
