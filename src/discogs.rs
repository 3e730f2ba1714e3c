//! Discogs API client: wantlist and marketplace listings

use crate::config::{Config, DiscogsApi};
use crate::error::FetchError;
use crate::services::RateLimiter;
use crate::types::{Listing, Price, TrackedItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Read side of the marketplace used by the check cycle
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Every release on the user's wantlist, in wantlist order
    async fn fetch_tracked_items(&self) -> Result<Vec<TrackedItem>, FetchError>;

    /// Listings currently for sale for one release
    async fn fetch_listings(&self, item_id: &str) -> Result<Vec<Listing>, FetchError>;
}

const WANTS_PER_PAGE: u32 = 100;
const MAX_WANT_PAGES: u32 = 50;

/// Page of `GET /users/{username}/wants`
#[derive(Debug, Deserialize)]
struct WantsPage {
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    wants: Vec<Want>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: u32,
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct Want {
    id: u64,
    #[serde(default)]
    basic_information: Option<BasicInformation>,
}

#[derive(Debug, Deserialize)]
struct BasicInformation {
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: u32,
    #[serde(default)]
    artists: Vec<ArtistRef>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

/// Body of `GET /marketplace/listings`
#[derive(Debug, Deserialize)]
struct ListingsPage {
    #[serde(default)]
    listings: Option<Vec<RawListing>>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    id: u64,
    #[serde(default)]
    status: Option<String>,
    price: RawPrice,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    sleeve_condition: Option<String>,
    #[serde(default)]
    comments: Option<String>,
    #[serde(default)]
    ships_from: Option<String>,
    #[serde(default)]
    posted: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    seller: RawSeller,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(with = "rust_decimal::serde::float")]
    value: Decimal,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RawSeller {
    username: String,
    #[serde(default)]
    stats: Option<SellerStats>,
}

#[derive(Debug, Deserialize)]
struct SellerStats {
    /// Discogs sends this as a string ("99.8") on some endpoints and a number on others
    #[serde(default)]
    rating: Option<serde_json::Value>,
}

/// HTTP client for the Discogs REST API
pub struct DiscogsClient {
    client: Client,
    base_url: String,
    username: String,
    token: String,
    limiter: RateLimiter,
}

impl DiscogsClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(DiscogsApi::USER_AGENT)
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.discogs_api_url.clone(),
            username: config.discogs_username.clone(),
            token: config.discogs_token.clone(),
            limiter: RateLimiter::per_minute("discogs", config.discogs_requests_per_minute),
        })
    }

    /// GET a JSON document, classifying every non-success status
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.limiter.acquire().await;

        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::from_response(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn wants_url(&self, page: u32) -> String {
        format!(
            "{}/users/{}/wants?page={}&per_page={}",
            self.base_url,
            urlencoding::encode(&self.username),
            page,
            WANTS_PER_PAGE
        )
    }

    fn listings_url(&self, item_id: &str) -> String {
        format!(
            "{}/marketplace/listings?release_id={}&status={}",
            self.base_url,
            urlencoding::encode(item_id),
            urlencoding::encode("For Sale")
        )
    }
}

#[async_trait]
impl Marketplace for DiscogsClient {
    async fn fetch_tracked_items(&self) -> Result<Vec<TrackedItem>, FetchError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let body: WantsPage = self.get_json(&self.wants_url(page)).await?;

            items.extend(body.wants.into_iter().filter_map(parse_want));

            let last_page = body
                .pagination
                .map(|p| p.page >= p.pages)
                .unwrap_or(true);
            if last_page {
                break;
            }

            page += 1;

            // Safety limit to avoid infinite loops
            if page > MAX_WANT_PAGES {
                warn!("Reached safety limit of {} wantlist pages", MAX_WANT_PAGES);
                break;
            }
        }

        info!("Fetched {} wantlist items for {}", items.len(), self.username);
        Ok(items)
    }

    async fn fetch_listings(&self, item_id: &str) -> Result<Vec<Listing>, FetchError> {
        let page: ListingsPage = self.get_json(&self.listings_url(item_id)).await?;

        // No marketplace section means nothing for sale
        let listings = page
            .listings
            .map(|raw| parse_listings(item_id, raw))
            .unwrap_or_default();

        debug!("Release {}: {} listings for sale", item_id, listings.len());
        Ok(listings)
    }
}

/// Convert a wantlist entry into our TrackedItem type
fn parse_want(want: Want) -> Option<TrackedItem> {
    let info = want.basic_information?;
    let id = want.id.to_string();

    let artist = info
        .artists
        .iter()
        .map(|a| clean_artist_name(&a.name))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    Some(TrackedItem {
        detail_url: DiscogsApi::release_url(&id),
        id,
        artist: if artist.is_empty() { "Unknown Artist".to_string() } else { artist },
        title: info.title,
        year: (info.year > 0).then_some(info.year),
    })
}

/// Strip the numeric disambiguation suffix Discogs adds to duplicate names ("Nirvana (2)")
fn clean_artist_name(name: &str) -> String {
    let trimmed = name.trim();
    if let Some(open) = trimmed.rfind(" (") {
        let suffix = &trimmed[open + 2..];
        if let Some(digits) = suffix.strip_suffix(')') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return trimmed[..open].to_string();
            }
        }
    }
    trimmed.to_string()
}

fn parse_listings(item_id: &str, raw: Vec<RawListing>) -> Vec<Listing> {
    raw.into_iter()
        .filter(|l| l.status.as_deref().map(|s| s == "For Sale").unwrap_or(true))
        .map(|l| parse_listing(item_id, l))
        .collect()
}

fn parse_listing(item_id: &str, raw: RawListing) -> Listing {
    let id = raw.id.to_string();

    let seller_rating = raw
        .seller
        .stats
        .and_then(|s| s.rating)
        .and_then(|r| match r {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    let posted_at = raw
        .posted
        .as_deref()
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|d| d.with_timezone(&Utc));

    Listing {
        url: non_empty(raw.uri).unwrap_or_else(|| DiscogsApi::listing_url(&id)),
        id,
        item_id: item_id.to_string(),
        price: Price {
            value: raw.price.value,
            currency: raw.price.currency,
        },
        condition: non_empty(raw.condition).unwrap_or_else(|| "N/A".to_string()),
        sleeve_condition: non_empty(raw.sleeve_condition),
        seller_name: raw.seller.username,
        seller_rating,
        ships_from: non_empty(raw.ships_from),
        comments: non_empty(raw.comments),
        posted_at,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WANTS_JSON: &str = r#"{
        "pagination": {"page": 1, "pages": 1, "per_page": 100, "items": 2},
        "wants": [
            {
                "id": 249504,
                "rating": 0,
                "basic_information": {
                    "id": 249504,
                    "title": "Never Gonna Give You Up",
                    "year": 1987,
                    "artists": [{"name": "Rick Astley", "anv": "", "id": 72872}]
                }
            },
            {
                "id": 5,
                "basic_information": {
                    "title": "Split",
                    "year": 0,
                    "artists": [{"name": "Nirvana (2)"}, {"name": "Cold Cave"}]
                }
            }
        ]
    }"#;

    const LISTINGS_JSON: &str = r#"{
        "listings": [
            {
                "id": 172723812,
                "status": "For Sale",
                "price": {"currency": "USD", "value": 10.0},
                "condition": "Mint (M)",
                "sleeve_condition": "Near Mint (NM or M-)",
                "comments": "Still sealed!",
                "ships_from": "United States",
                "posted": "2024-07-15T12:55:01-07:00",
                "uri": "https://www.discogs.com/sell/item/172723812",
                "seller": {"username": "*bold*seller", "stats": {"rating": "99.8"}}
            },
            {
                "id": 2,
                "status": "Sold",
                "price": {"currency": "EUR", "value": 5},
                "seller": {"username": "gone"}
            },
            {
                "id": 3,
                "price": {"currency": "GBP", "value": 7.5},
                "comments": "",
                "seller": {"username": "minimal", "stats": {"rating": 100}}
            }
        ]
    }"#;

    #[test]
    fn test_parse_wants() {
        let page: WantsPage = serde_json::from_str(WANTS_JSON).unwrap();
        let items: Vec<TrackedItem> = page.wants.into_iter().filter_map(parse_want).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "249504");
        assert_eq!(items[0].artist, "Rick Astley");
        assert_eq!(items[0].year, Some(1987));
        assert_eq!(items[0].detail_url, "https://www.discogs.com/release/249504");

        assert_eq!(items[1].artist, "Nirvana, Cold Cave");
        assert_eq!(items[1].year, None);
    }

    #[test]
    fn test_clean_artist_name() {
        assert_eq!(clean_artist_name("Nirvana (2)"), "Nirvana");
        assert_eq!(clean_artist_name("Sunn O)))"), "Sunn O)))");
        assert_eq!(clean_artist_name("Love (band)"), "Love (band)");
        assert_eq!(clean_artist_name(" Björk "), "Björk");
    }

    #[test]
    fn test_parse_listings() {
        let page: ListingsPage = serde_json::from_str(LISTINGS_JSON).unwrap();
        let listings = parse_listings("100", page.listings.unwrap());

        // The sold listing is dropped
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.id, "172723812");
        assert_eq!(first.item_id, "100");
        assert_eq!(first.price.value, dec!(10));
        assert_eq!(first.price.to_string(), "$10.00");
        assert_eq!(first.seller_name, "*bold*seller");
        assert_eq!(first.seller_rating.as_deref(), Some("99.8"));
        assert_eq!(first.comments.as_deref(), Some("Still sealed!"));
        assert!(first.posted_at.is_some());

        let minimal = &listings[1];
        assert_eq!(minimal.condition, "N/A");
        assert_eq!(minimal.comments, None);
        assert_eq!(minimal.seller_rating.as_deref(), Some("100"));
        assert_eq!(minimal.url, "https://www.discogs.com/sell/item/3");
    }

    #[test]
    fn test_missing_listings_section_is_empty() {
        let page: ListingsPage = serde_json::from_str(r#"{"pagination": {}}"#).unwrap();
        assert!(page.listings.is_none());
    }
}
