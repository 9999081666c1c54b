//! Law document search on the India Code site.
//!
//! ```text
//! search page ─▶ .artifact-description a ─▶ fetch each document ─▶ content + metadata
//! ```
//!
//! Pages are fetched with plain HTTP and parsed with CSS selectors. Parsing
//! is kept in synchronous functions because `scraper::Html` is not `Send`.

use anyhow::{Context, Result};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::preprocess::normalize_whitespace;

pub const NO_RESULTS_TIMEOUT: &str = "No results found or page took too long to load";
pub const NO_RESULTS_FOR_QUERY: &str = "No results found for the given query";

const CONTENT_SELECTORS: &[&str] = &[
    "div.item-page",
    "div#content",
    r#"div[class*="content"]"#,
    "article",
];

const METADATA_SELECTORS: &[(&str, &str)] = &[
    (
        "date_published",
        r#"span[class*="date"], span[class*="published"]"#,
    ),
    (
        "category",
        r#"span[class*="category"], span[class*="subject"]"#,
    ),
    (
        "act_number",
        r#"span[class*="act-number"], span[class*="law-id"]"#,
    ),
    (
        "ministry",
        r#"span[class*="ministry"], span[class*="department"]"#,
    ),
];

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LawMetadata {
    pub date_published: Option<String>,
    pub category: Option<String>,
    pub act_number: Option<String>,
    pub ministry: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LawDocument {
    pub title: String,
    pub url: String,
    pub content: String,
    pub metadata: LawMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LawSearchResult {
    pub query: String,
    pub timestamp: String,
    pub total_results: usize,
    pub documents: Vec<LawDocument>,
}

#[derive(Debug)]
pub enum ScrapeError {
    /// The search page had no result list, or the list was empty.
    NoResults(&'static str),
    Failed(anyhow::Error),
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeError::NoResults(msg) => write!(f, "{}", msg),
            ScrapeError::Failed(e) => write!(f, "{:#}", e),
        }
    }
}

impl std::error::Error for ScrapeError {}

impl From<anyhow::Error> for ScrapeError {
    fn from(e: anyhow::Error) -> Self {
        ScrapeError::Failed(e)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector {:?}: {}", css, e))
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Build the search URL. The query is form-encoded (spaces become `+`).
pub fn search_url(config: &ScraperConfig, query: &str, max_results: usize) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!(
        "{}{}?query={}&rpp={}&sort_by=score&order=desc",
        config.base_url.trim_end_matches('/'),
        config.search_path,
        encoded,
        max_results
    )
}

/// Document URLs from a search result page, resolved against `base`.
pub fn parse_result_links(
    html: &str,
    base: &str,
    max_results: usize,
) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let container = selector(".artifact-description")?;
    if document.select(&container).next().is_none() {
        return Err(ScrapeError::NoResults(NO_RESULTS_TIMEOUT));
    }

    let base = Url::parse(base).context("invalid scraper base URL")?;
    let links = selector(".artifact-description a")?;
    let mut anchors = document.select(&links).peekable();
    if anchors.peek().is_none() {
        return Err(ScrapeError::NoResults(NO_RESULTS_FOR_QUERY));
    }

    Ok(anchors
        .take(max_results)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect())
}

/// Extract a law document from its page. `None` when no content selector
/// matches.
pub fn parse_document(html: &str, url: &str) -> Result<Option<LawDocument>> {
    let document = Html::parse_document(html);

    let mut content = None;
    for css in CONTENT_SELECTORS {
        if let Some(el) = document.select(&selector(css)?).next() {
            content = Some(element_text(el));
            break;
        }
    }
    let Some(content) = content else {
        return Ok(None);
    };

    let title = document
        .select(&selector("title")?)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let mut fields: HashMap<String, String> = HashMap::new();
    for (key, css) in METADATA_SELECTORS {
        if let Some(el) = document.select(&selector(css)?).next() {
            fields.insert(key.to_string(), element_text(el));
        }
    }
    for div in document.select(&selector(r#"div[class*="metadata"]"#)?) {
        let text = element_text(div);
        if let Some((key, value)) = text.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            fields.insert(key, value.trim().to_string());
        }
    }

    Ok(Some(LawDocument {
        title,
        url: url.to_string(),
        content,
        metadata: LawMetadata {
            date_published: fields.remove("date_published"),
            category: fields.remove("category"),
            act_number: fields.remove("act_number"),
            ministry: fields.remove("ministry"),
        },
    }))
}

pub struct LawScraper {
    config: ScraperConfig,
    client: reqwest::Client,
}

impl LawScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.page_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Search and scrape up to `max_results` documents. Document pages that
    /// fail to load or have no content are skipped.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<LawSearchResult, ScrapeError> {
        let url = search_url(&self.config, query, max_results);
        debug!(url = %url, "law search");

        let html = self.fetch_html(&url).await?;
        let links = parse_result_links(&html, &self.config.base_url, max_results)?;

        let mut documents = Vec::new();
        for link in links {
            let page = match self.fetch_html(&link).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %link, error = %e, "skipping law document");
                    continue;
                }
            };
            match parse_document(&page, &link) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => debug!(url = %link, "no content on law document page"),
                Err(e) => warn!(url = %link, error = %e, "skipping law document"),
            }
        }

        info!(query, found = documents.len(), "law search complete");
        Ok(LawSearchResult {
            query: query.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            total_results: documents.len(),
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Html as HtmlResponse;
    use axum::routing::get;
    use axum::Router;

    const BASE: &str = "https://www.indiacode.nic.in";

    #[test]
    fn test_search_url_encoding() {
        let url = search_url(&ScraperConfig::default(), "consumer protection act", 3);
        assert_eq!(
            url,
            "https://www.indiacode.nic.in/handle/123456789/1362/simple-search?query=consumer+protection+act&rpp=3&sort_by=score&order=desc"
        );
    }

    #[test]
    fn test_result_links_resolved_and_limited() {
        let html = r#"<html><body>
            <div class="artifact-description"><a href="/handle/1/10">A</a></div>
            <div class="artifact-description"><a href="/handle/1/11">B</a></div>
            <div class="artifact-description"><a href="/handle/1/12">C</a></div>
        </body></html>"#;
        let links = parse_result_links(html, BASE, 2).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.indiacode.nic.in/handle/1/10".to_string(),
                "https://www.indiacode.nic.in/handle/1/11".to_string()
            ]
        );
    }

    #[test]
    fn test_result_page_errors() {
        let err = parse_result_links("<html><body><p>nothing</p></body></html>", BASE, 5).unwrap_err();
        assert!(matches!(err, ScrapeError::NoResults(NO_RESULTS_TIMEOUT)));

        let err = parse_result_links(
            r#"<div class="artifact-description">no links here</div>"#,
            BASE,
            5,
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::NoResults(NO_RESULTS_FOR_QUERY)));
    }

    #[test]
    fn test_content_selector_fallback_order() {
        // Both div#content and article exist; div#content wins.
        let html = r#"<html><head><title>Act 12</title></head><body>
            <article>Article text</article>
            <div id="content">  Main
                 body   text </div>
        </body></html>"#;
        let doc = parse_document(html, "u").unwrap().unwrap();
        assert_eq!(doc.content, "Main body text");
        assert_eq!(doc.title, "Act 12");

        let html = r#"<div class="item-page">Item page</div><div id="content">Other</div>"#;
        assert_eq!(parse_document(html, "u").unwrap().unwrap().content, "Item page");
    }

    #[test]
    fn test_no_content_selector() {
        assert!(parse_document("<html><body><p>x</p></body></html>", "u")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_metadata_extraction() {
        let html = r#"<html><body>
            <div class="item-page">The Act.</div>
            <span class="pub-date">1986</span>
            <span class="subject-line">Consumer</span>
            <span class="law-id">68</span>
            <div class="metadata-row">Ministry: Consumer Affairs</div>
            <div class="metadata-row">Date Published: 24 December 1986</div>
        </body></html>"#;
        let doc = parse_document(html, "u").unwrap().unwrap();
        assert_eq!(doc.metadata.category.as_deref(), Some("Consumer"));
        assert_eq!(doc.metadata.act_number.as_deref(), Some("68"));
        assert_eq!(doc.metadata.ministry.as_deref(), Some("Consumer Affairs"));
        // metadata divs override span matches
        assert_eq!(doc.metadata.date_published.as_deref(), Some("24 December 1986"));
    }

    #[tokio::test]
    async fn test_search_against_local_site() {
        let app = Router::new()
            .route(
                "/search",
                get(|| async {
                    HtmlResponse(
                        r#"<div class="artifact-description"><a href="/doc/1">One</a></div>
                           <div class="artifact-description"><a href="/doc/missing">Two</a></div>"#,
                    )
                }),
            )
            .route(
                "/doc/1",
                get(|| async {
                    HtmlResponse(
                        r#"<html><head><title>Doc One</title></head><body><div class="item-page">Body one</div></body></html>"#,
                    )
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let config = ScraperConfig {
            base_url: format!("http://{}", addr),
            search_path: "/search".to_string(),
            ..ScraperConfig::default()
        };
        let result = LawScraper::new(&config)
            .unwrap()
            .search("rent control", 5)
            .await
            .unwrap();
        assert_eq!(result.total_results, 1);
        assert_eq!(result.documents[0].title, "Doc One");
        assert_eq!(result.documents[0].url, format!("http://{}/doc/1", addr));

        server.abort();
    }
}
