//! Legal news aggregation.
//!
//! Fetches articles from the GNews search API for a location, keeps only
//! the ones that read as legal news, and pages through the survivors.
//!
//! An article is legal news when its title and description mention a court
//! institution, at least one legal action or term, and at least three
//! keywords overall.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NewsConfig;

const SEARCH_TERMS: &[&str] = &[
    "legal ruling",
    "court hearing",
    "lawsuit",
    "supreme court",
    "federal court",
    "district court",
];

const ENTITIES: &[&str] = &[
    "court",
    "judge",
    "lawyer",
    "attorney",
    "plaintiff",
    "defendant",
    "prosecution",
    "prosecutor",
    "judiciary",
];
const ACTIONS: &[&str] = &[
    "ruled",
    "filed",
    "dismissed",
    "appealed",
    "convicted",
    "sentenced",
    "pleaded",
    "testified",
    "charged",
];
const LEGAL_TERMS: &[&str] = &[
    "lawsuit",
    "case",
    "trial",
    "hearing",
    "verdict",
    "settlement",
    "appeal",
    "ruling",
    "judgment",
    "litigation",
    "indictment",
    "complaint",
    "motion",
    "briefing",
];
const INSTITUTIONS: &[&str] = &[
    "supreme court",
    "district court",
    "circuit court",
    "federal court",
    "state court",
    "appeals court",
    "courthouse",
    "department of justice",
    "doj",
];

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: String,
}

/// Article as returned by GNews. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<RawSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: usize,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: RawSource,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub location: Location,
    #[serde(rename = "legal_terms_found")]
    pub legal_terms_found: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsMeta {
    pub pagination: Pagination,
    pub location: Location,
    pub detected_from: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsPage {
    pub articles: Vec<NewsArticle>,
    pub meta: NewsMeta,
}

fn article_text(article: &RawArticle) -> String {
    format!(
        "{} {}",
        article.title.as_deref().unwrap_or(""),
        article.description.as_deref().unwrap_or("")
    )
    .to_lowercase()
}

fn count_in(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| text.contains(*t)).count()
}

pub fn is_legal_article(article: &RawArticle) -> bool {
    let text = article_text(article);
    let institutions = count_in(&text, INSTITUTIONS);
    let actions = count_in(&text, ACTIONS);
    let legal_terms = count_in(&text, LEGAL_TERMS);
    let total = institutions + actions + legal_terms + count_in(&text, ENTITIES);

    institutions > 0 && (actions > 0 || legal_terms > 0) && total >= 3
}

/// Every keyword found in the article, without duplicates.
pub fn matched_terms(article: &RawArticle) -> Vec<String> {
    let text = article_text(article);
    let mut found: Vec<String> = Vec::new();
    for term in ENTITIES
        .iter()
        .chain(ACTIONS)
        .chain(LEGAL_TERMS)
        .chain(INSTITUTIONS)
    {
        if text.contains(term) && !found.iter().any(|f| f == term) {
            found.push(term.to_string());
        }
    }
    found
}

pub fn build_query(location: &Location) -> String {
    let legal_query = SEARCH_TERMS
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut parts = Vec::new();
    if let Some(city) = location.city.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("\"{}\"", city));
    }
    if let Some(state) = location.state.as_deref().filter(|s| !s.is_empty()) {
        parts.push(state.to_string());
    }
    if parts.is_empty() {
        return legal_query;
    }
    parts.push(format!("({})", legal_query));
    parts.join(" AND ")
}

/// Clamp raw paging parameters: page below 1 becomes 1, a page size outside
/// `1..=50` becomes 10.
pub fn normalize_paging(page: i64, page_size: i64) -> (usize, usize) {
    let page = page.max(1) as usize;
    let page_size = if (1..=MAX_PAGE_SIZE as i64).contains(&page_size) {
        page_size as usize
    } else {
        DEFAULT_PAGE_SIZE
    };
    (page, page_size)
}

/// Slice `items` for `page` (1-based).
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> (Vec<T>, Pagination) {
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size);
    let end = start.saturating_add(page_size);
    let slice = if start < total {
        items[start..end.min(total)].to_vec()
    } else {
        Vec::new()
    };
    (
        slice,
        Pagination {
            current_page: page,
            page_size,
            total_pages: total.div_ceil(page_size),
            total_items: total,
            has_next: end < total,
            has_previous: page > 1,
        },
    )
}

pub struct NewsClient {
    config: NewsConfig,
    client: reqwest::Client,
}

impl NewsClient {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
        })
    }

    /// Location from request parameters, falling back to configured defaults.
    /// The second value says where it came from (`query` or `default`).
    pub fn resolve_location(
        &self,
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> (Location, &'static str) {
        let from_query = city.is_some() || state.is_some() || country.is_some();
        let location = Location {
            city: city.or_else(|| self.config.default_city.clone()),
            state: state.or_else(|| self.config.default_state.clone()),
            country: country
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| self.config.default_country.clone()),
        };
        (location, if from_query { "query" } else { "default" })
    }

    fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.config.api_key {
            return Ok(key.clone());
        }
        std::env::var("GNEWS_API_KEY").context("GNEWS_API_KEY environment variable not set")
    }

    pub async fn fetch(
        &self,
        location: Location,
        detected_from: &str,
        page: usize,
        page_size: usize,
    ) -> Result<NewsPage> {
        let query = build_query(&location);
        let buffer = page_size.saturating_mul(3).min(100);
        let api_key = self.api_key()?;

        debug!(query = %query, buffer, "fetching news");
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("q", query.as_str()),
                ("lang", "en"),
                ("country", location.country.to_lowercase().as_str()),
                ("max", buffer.to_string().as_str()),
                ("apikey", api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "news API error");
            bail!("News API error {}: {}", status, body);
        }
        let data: SearchResponse = response.json().await?;

        let legal: Vec<RawArticle> = data
            .articles
            .into_iter()
            .filter(is_legal_article)
            .collect();
        let (paged, pagination) = paginate(&legal, page, page_size);
        let start = (page - 1).saturating_mul(page_size);

        let articles = paged
            .into_iter()
            .enumerate()
            .map(|(idx, article)| NewsArticle {
                id: start.saturating_add(idx + 1),
                legal_terms_found: matched_terms(&article),
                title: article.title,
                description: article.description,
                source: article.source.unwrap_or_default(),
                url: article.url,
                published_at: article.published_at,
                location: location.clone(),
            })
            .collect();

        Ok(NewsPage {
            articles,
            meta: NewsMeta {
                pagination,
                location,
                detected_from: detected_from.to_string(),
            },
        })
    }
}
