use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Operation, UnknownVariant};

/// Source of a scraped listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeSource {
    Inmuebles24,
    /// Generated listings, used for demos and tests
    Sandbox,
}

impl ScrapeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeSource::Inmuebles24 => "inmuebles24",
            ScrapeSource::Sandbox => "sandbox",
        }
    }
}

impl std::str::FromStr for ScrapeSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inmuebles24" => Ok(ScrapeSource::Inmuebles24),
            "sandbox" => Ok(ScrapeSource::Sandbox),
            other => Err(UnknownVariant::new("scrape source", other)),
        }
    }
}

impl std::fmt::Display for ScrapeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownVariant::new("job status", other)),
        }
    }
}

/// One scraper invocation for a (source, agency) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingJob {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub source: ScrapeSource,
    pub pages_requested: i32,
    pub city: Option<String>,
    pub operation: Option<Operation>,
    pub pages_scraped: i32,
    pub listings_found: i32,
    pub listings_new: i32,
    pub listings_updated: i32,
    pub listings_duplicate: i32,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Normalized third-party listing, unique on (source, external_id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedListing {
    pub id: Uuid,
    pub source: ScrapeSource,
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
    pub first_seen_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub imported: bool,
    /// Internal property created from this listing on import
    pub property_id: Option<Uuid>,
}
