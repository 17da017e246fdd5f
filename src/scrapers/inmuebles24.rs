use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::{debug, info, warn};

use super::traits::ListingSource;
use super::types::{NormalizedListing, PageCursor, ScrapeError, ScrapeFilters, ScrapedPage};
use crate::models::{Operation, ScrapeSource};

const BASE_URL: &str = "https://www.inmuebles24.com";

/// Inmuebles24 public search results scraper
pub struct Inmuebles24Source {
    client: Client,
    base_url: String,
}

impl Inmuebles24Source {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search URL, e.g. `/inmuebles-en-venta-en-guadalajara-pagina-2.html`
    pub fn search_url(&self, page: u32, filters: &ScrapeFilters) -> String {
        let mut slug = String::from("inmuebles");
        if let Some(operation) = filters.operation {
            slug.push_str(match operation {
                Operation::Sale => "-en-venta",
                Operation::Rent => "-en-renta",
            });
        }
        if let Some(city) = filters.city.as_deref().map(slugify).filter(|c| !c.is_empty()) {
            slug.push_str("-en-");
            slug.push_str(&city);
        }
        if page > 1 {
            slug.push_str(&format!("-pagina-{}", page));
        }
        format!("{}/{}.html", self.base_url, slug)
    }
}

struct CardSelectors {
    card: Selector,
    price: Selector,
    title: Selector,
    description: Selector,
    address: Selector,
    location: Selector,
    features: Selector,
    image: Selector,
    next: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self, ScrapeError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ScrapeError::Parse(format!("selector `{}`: {}", css, e)))
        };
        Ok(Self {
            card: parse("div[data-qa^=\"posting\"][data-id]")?,
            price: parse("[data-qa=\"POSTING_CARD_PRICE\"]")?,
            title: parse("h2 a, [data-qa=\"POSTING_CARD_TITLE\"]")?,
            description: parse("[data-qa=\"POSTING_CARD_DESCRIPTION\"]")?,
            address: parse(".postingAddress, [data-qa=\"POSTING_CARD_ADDRESS\"]")?,
            location: parse("[data-qa=\"POSTING_CARD_LOCATION\"]")?,
            features: parse("[data-qa=\"POSTING_CARD_FEATURES\"] span")?,
            image: parse("img")?,
            next: parse("a[data-qa=\"PAGING_NEXT\"]")?,
        })
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().to_lowercase().chars() {
        let c = match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// "MN 4,850,000" -> (4850000, "MXN"); "USD 250,000" -> (250000, "USD")
fn parse_price(text: &str) -> Option<(i64, String)> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    let amount = digits.parse().ok()?;
    let currency = if text.contains("USD") || text.contains("US$") {
        "USD"
    } else {
        "MXN"
    };
    Some((amount, currency.to_string()))
}

fn leading_number(text: &str) -> Option<f64> {
    let number: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    number.parse().ok()
}

#[derive(Default)]
struct CardFeatures {
    bedrooms: Option<i32>,
    bathrooms: Option<f32>,
    area_m2: Option<f64>,
}

/// Feature chips look like "210 m² tot.", "3 rec.", "2 baños"
fn parse_features(chips: &[String]) -> CardFeatures {
    let mut features = CardFeatures::default();
    for chip in chips {
        let lower = chip.to_lowercase();
        let Some(value) = leading_number(&lower) else {
            continue;
        };
        if lower.contains("m²") || lower.contains("m2") {
            // total area wins over built area when both are present
            if features.area_m2.is_none() || lower.contains("tot") {
                features.area_m2 = Some(value);
            }
        } else if lower.contains("rec") {
            features.bedrooms = Some(value as i32);
        } else if lower.contains("baño") {
            features.bathrooms = Some(value as f32);
        }
    }
    features
}

fn guess_property_type(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    ["departamento", "casa", "terreno", "oficina", "local", "bodega"]
        .into_iter()
        .find(|t| lower.contains(t))
        .map(str::to_string)
}

/// Parse one search results page
pub(crate) fn parse_search_page(
    html: &str,
    base_url: &str,
    filters: &ScrapeFilters,
) -> Result<(Vec<NormalizedListing>, bool), ScrapeError> {
    let selectors = CardSelectors::new()?;
    let document = Html::parse_document(html);

    let mut listings = Vec::new();
    for (idx, card) in document.select(&selectors.card).enumerate() {
        let Some(external_id) = card.value().attr("data-id").map(str::to_string) else {
            continue;
        };
        let href = card.value().attr("data-to-posting").unwrap_or_default();
        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", base_url, href)
        };

        let title = first_text(card, &selectors.title)
            .or_else(|| first_text(card, &selectors.description))
            .unwrap_or_default();
        if title.is_empty() {
            debug!(idx, %external_id, "Skipping card without title");
            continue;
        }

        let price_text = first_text(card, &selectors.price);
        let (price, currency) = match price_text.as_deref().and_then(parse_price) {
            Some((amount, currency)) => (Some(amount), currency),
            None => (None, "MXN".to_string()),
        };

        let location = first_text(card, &selectors.location);
        let (neighborhood, city) = match location.as_deref().map(|l| l.rsplit_once(',')) {
            Some(Some((area, city))) => (Some(area.trim().to_string()), Some(city.trim().to_string())),
            Some(None) => (None, location.clone()),
            None => (None, filters.city.clone()),
        };

        let chips: Vec<String> = card.select(&selectors.features).map(text_of).collect();
        let features = parse_features(&chips);

        let images: Vec<String> = card
            .select(&selectors.image)
            .filter_map(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
            .filter(|src| src.starts_with("http"))
            .map(str::to_string)
            .collect();

        listings.push(NormalizedListing {
            external_id: external_id.clone(),
            url,
            property_type: guess_property_type(&title),
            title,
            description: first_text(card, &selectors.description),
            price,
            currency,
            operation: filters.operation,
            address: first_text(card, &selectors.address),
            city,
            state: None,
            bedrooms: features.bedrooms,
            bathrooms: features.bathrooms,
            area_m2: features.area_m2,
            images,
            raw_data: json!({
                "inmuebles24_id": external_id,
                "price_text": price_text,
                "location": location,
                "neighborhood": neighborhood,
                "features": chips,
            }),
        });
    }

    let has_next = document.select(&selectors.next).next().is_some();
    Ok((listings, has_next))
}

#[async_trait]
impl ListingSource for Inmuebles24Source {
    async fn fetch_page(
        &self,
        cursor: &PageCursor,
        filters: &ScrapeFilters,
    ) -> Result<ScrapedPage, ScrapeError> {
        let url = self.search_url(cursor.page, filters);
        debug!("Fetching URL: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("Inmuebles24 returned status: {}", response.status());
            return Err(ScrapeError::Status {
                portal: ScrapeSource::Inmuebles24,
                status: response.status().as_u16(),
                page: cursor.page,
            });
        }

        let html = response.text().await?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let (listings, has_next) = parse_search_page(&html, &self.base_url, filters)?;
        info!(page = cursor.page, count = listings.len(), "Parsed Inmuebles24 results page");

        Ok(ScrapedPage {
            listings,
            next_cursor: has_next.then(|| cursor.next_after(None)),
        })
    }

    fn source(&self) -> ScrapeSource {
        ScrapeSource::Inmuebles24
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-qa="posting PROPERTY" data-id="143987001" data-to-posting="/propiedades/casa-en-providencia-143987001.html">
            <img data-src="https://img.inmuebles24.com/1.jpg" src="data:image/gif;base64,R0l">
            <div data-qa="POSTING_CARD_PRICE">MN 4,850,000</div>
            <h2><a>Casa en venta en Providencia</a></h2>
            <div class="postingAddress">Av. Providencia 2450</div>
            <div data-qa="POSTING_CARD_LOCATION">Providencia, Guadalajara</div>
            <div data-qa="POSTING_CARD_FEATURES">
              <span>180 m² tot.</span><span>210 m² cub.</span><span>3 rec.</span><span>2 baños</span>
            </div>
            <div data-qa="POSTING_CARD_DESCRIPTION">Casa de dos plantas con jardín</div>
          </div>
          <div data-qa="posting DEVELOPMENT" data-id="88" data-to-posting="https://www.inmuebles24.com/desarrollo/88.html">
            <div data-qa="POSTING_CARD_PRICE">USD 250,000</div>
            <div data-qa="POSTING_CARD_DESCRIPTION">Departamentos frente al mar</div>
          </div>
          <div data-qa="posting PROPERTY" data-id="99"></div>
          <a data-qa="PAGING_NEXT" href="/inmuebles-pagina-2.html">Siguiente</a>
        </body></html>
    "#;

    #[test]
    fn parses_cards_and_next_link() {
        let filters = ScrapeFilters {
            city: Some("Guadalajara".to_string()),
            operation: Some(Operation::Sale),
        };
        let (listings, has_next) = parse_search_page(PAGE, BASE_URL, &filters).unwrap();

        assert!(has_next);
        assert_eq!(listings.len(), 2);

        let casa = &listings[0];
        assert_eq!(casa.external_id, "143987001");
        assert_eq!(
            casa.url,
            "https://www.inmuebles24.com/propiedades/casa-en-providencia-143987001.html"
        );
        assert_eq!(casa.title, "Casa en venta en Providencia");
        assert_eq!(casa.price, Some(4_850_000));
        assert_eq!(casa.currency, "MXN");
        assert_eq!(casa.city.as_deref(), Some("Guadalajara"));
        assert_eq!(casa.address.as_deref(), Some("Av. Providencia 2450"));
        assert_eq!(casa.bedrooms, Some(3));
        assert_eq!(casa.bathrooms, Some(2.0));
        assert_eq!(casa.area_m2, Some(180.0));
        assert_eq!(casa.property_type.as_deref(), Some("casa"));
        assert_eq!(casa.images, vec!["https://img.inmuebles24.com/1.jpg".to_string()]);

        let desarrollo = &listings[1];
        assert_eq!(desarrollo.title, "Departamentos frente al mar");
        assert_eq!(desarrollo.currency, "USD");
        assert_eq!(desarrollo.price, Some(250_000));
    }

    #[test]
    fn last_page_has_no_next() {
        let html = r#"<div data-qa="posting PROPERTY" data-id="1"><h2><a>Terreno</a></h2></div>"#;
        let (listings, has_next) = parse_search_page(html, BASE_URL, &ScrapeFilters::default()).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price, None);
        assert!(!has_next);
    }

    #[test]
    fn search_url_encodes_filters_and_page() {
        let source = Inmuebles24Source::new(Client::new());
        let filters = ScrapeFilters {
            city: Some("San Pedro Garza García".to_string()),
            operation: Some(Operation::Rent),
        };
        assert_eq!(
            source.search_url(3, &filters),
            "https://www.inmuebles24.com/inmuebles-en-renta-en-san-pedro-garza-garcia-pagina-3.html"
        );
        assert_eq!(
            source.search_url(1, &ScrapeFilters::default()),
            "https://www.inmuebles24.com/inmuebles.html"
        );
    }
}
