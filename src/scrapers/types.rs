use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreError;
use crate::models::{Operation, ScrapeSource};

/// Search filters passed to a listing source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrapeFilters {
    /// City to search in
    pub city: Option<String>,
    /// Sale or rent listings only
    pub operation: Option<Operation>,
}

/// What a caller asks the pipeline for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Maximum number of pages to fetch
    pub pages: u32,
    pub filters: ScrapeFilters,
}

/// Position in a source's result pages
///
/// Only the source builds cursors past the first page; `token` carries any
/// opaque pagination state the next request depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub page: u32,
    pub token: Option<String>,
}

impl PageCursor {
    pub fn first() -> Self {
        Self { page: 1, token: None }
    }

    pub fn next_after(&self, token: Option<String>) -> Self {
        Self {
            page: self.page + 1,
            token,
        }
    }
}

/// A third-party listing as parsed from the source, before persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedListing {
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub currency: String,
    pub operation: Option<Operation>,
    pub property_type: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f32>,
    pub area_m2: Option<f64>,
    pub images: Vec<String>,
    pub raw_data: serde_json::Value,
}

/// One fetched result page
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub listings: Vec<NormalizedListing>,
    /// `None` when the source has no further pages
    pub next_cursor: Option<PageCursor>,
}

/// Cumulative counters across the pages yielded so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeProgress {
    pub pages_scraped: u32,
    pub listings_found: u32,
}

/// One item of the scrape stream
#[derive(Debug, Clone)]
pub struct ScrapeBatch {
    pub page: u32,
    pub listings: Vec<NormalizedListing>,
    pub progress: ScrapeProgress,
}

/// Classification of a listing against what is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    New,
    Updated,
    Duplicate,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{portal} returned HTTP {status} for page {page}")]
    Status {
        portal: ScrapeSource,
        status: u16,
        page: u32,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
