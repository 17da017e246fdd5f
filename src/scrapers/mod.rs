pub mod import;
pub mod inmuebles24;
pub mod pipeline;
pub mod sandbox;
pub mod traits;
pub mod types;

pub use import::import_listing;
pub use inmuebles24::Inmuebles24Source;
pub use pipeline::{scrape_pages, upsert_listing, ScrapeRunner};
pub use sandbox::SandboxSource;
pub use traits::ListingSource;
pub use types::{
    NormalizedListing, PageCursor, ScrapeBatch, ScrapeError, ScrapeFilters, ScrapeProgress,
    ScrapeRequest, ScrapedPage, UpsertOutcome,
};

use reqwest::Client;

use crate::models::ScrapeSource;

/// Map a source id to its scraper
pub fn create_source(source: ScrapeSource, client: Client) -> Box<dyn ListingSource> {
    match source {
        ScrapeSource::Inmuebles24 => Box::new(Inmuebles24Source::new(client)),
        ScrapeSource::Sandbox => Box::new(SandboxSource::default()),
    }
}
