use async_trait::async_trait;

use super::types::{PageCursor, ScrapeError, ScrapeFilters, ScrapedPage};
use crate::models::ScrapeSource;

/// Common trait for all paginated listing sources
/// This allows new portals to be crawled without touching the pipeline
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch one result page. The cursor for page N comes from page N-1.
    async fn fetch_page(
        &self,
        cursor: &PageCursor,
        filters: &ScrapeFilters,
    ) -> Result<ScrapedPage, ScrapeError>;

    /// Source the listings are stored under
    fn source(&self) -> ScrapeSource;
}
