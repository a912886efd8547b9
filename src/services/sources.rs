// src/services/sources.rs

//! Source adapters.
//!
//! Each adapter fetches one batch of loosely-typed records from an upstream.
//! Records are plain JSON objects; the HTML adapter builds them from the
//! scraped cards so every source flows through the same normalizer.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{HtmlListingSource, NextDataSource, SourceConfig, SourceRecord, TmdbDiscoverSource};
use crate::services::build_id;
use crate::utils::http::{fetch_json, fetch_text};
use crate::utils::{fill_template, resolve_url, value_at_path};

/// A single upstream of source records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Fetch the current batch of records.
    async fn fetch(&self, client: &Client) -> Result<Vec<SourceRecord>>;
}

/// Build the adapter for a configured source.
///
/// `credential` is the already-resolved secret for sources that need one.
pub fn adapter_for(source: &SourceConfig, credential: Option<String>) -> Result<Box<dyn SourceAdapter>> {
    let adapter: Box<dyn SourceAdapter> = match source {
        SourceConfig::NextData(src) => Box::new(NextDataAdapter::new(src.clone())),
        SourceConfig::TmdbDiscover(src) => {
            let token = credential.ok_or_else(|| AppError::Credential(src.credential_env.clone()))?;
            Box::new(TmdbDiscoverAdapter::new(src.clone(), token))
        }
        SourceConfig::HtmlListing(src) => Box::new(HtmlListingAdapter::new(src.clone())?),
    };
    Ok(adapter)
}

/// Take the record array at `path`, failing when the path is missing.
pub fn extract_records<S: AsRef<str>>(
    data: &Value,
    path: &[S],
    source_url: &str,
) -> Result<Vec<SourceRecord>> {
    let joined = path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".");
    value_at_path(data, path)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| AppError::missing_path(joined, source_url))
}

// --- Next.js data endpoint ---

/// Kinobox-style `/_next/data/<build id>/...json` endpoint.
pub struct NextDataAdapter {
    source: NextDataSource,
}

impl NextDataAdapter {
    pub fn new(source: NextDataSource) -> Self {
        Self { source }
    }

    /// Data URL for a given build id.
    pub fn data_url(&self, build_id: &str) -> String {
        format!(
            "{}/_next/data/{}{}",
            self.source.base_url.trim_end_matches('/'),
            build_id,
            self.source.data_path
        )
    }
}

#[async_trait]
impl SourceAdapter for NextDataAdapter {
    fn describe(&self) -> String {
        format!("next_data {}{}", self.source.base_url, self.source.data_path)
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<SourceRecord>> {
        let build_id = build_id::locate(client, &self.source.build_id_pages).await?;
        let url = self.data_url(&build_id.value);
        log::info!("Fetching JSON data from {}", url);

        let data: Value = fetch_json(client.get(&url)).await?;
        let records = extract_records(&data, &self.source.items_path, &url)?;
        log::info!("Found {} records", records.len());
        Ok(records)
    }
}

// --- TMDB discover API ---

/// Paged TMDB discover endpoint authenticated with a bearer token.
pub struct TmdbDiscoverAdapter {
    source: TmdbDiscoverSource,
    token: String,
}

impl TmdbDiscoverAdapter {
    pub fn new(source: TmdbDiscoverSource, token: String) -> Self {
        Self { source, token }
    }
}

#[async_trait]
impl SourceAdapter for TmdbDiscoverAdapter {
    fn describe(&self) -> String {
        format!("tmdb_discover ({} pages)", self.source.pages)
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<SourceRecord>> {
        let mut records = Vec::new();
        let mut last_error = None;

        for page in 1..=self.source.pages {
            let url = fill_template(&self.source.endpoint, "page", &page.to_string());
            let request = client
                .get(&url)
                .header("accept", "application/json")
                .bearer_auth(&self.token);

            let result = fetch_json::<Value>(request)
                .await
                .and_then(|data| extract_records(&data, &self.source.items_path, &url));

            match result {
                Ok(batch) => {
                    log::info!("Page {}: {} records", page, batch.len());
                    records.extend(batch);
                }
                Err(e) => {
                    log::warn!("Failed to fetch page {}: {}", page, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if records.is_empty() => Err(e),
            _ => Ok(records),
        }
    }
}

// --- Scraped HTML listing ---

/// Listing page scraped with CSS selectors.
pub struct HtmlListingAdapter {
    source: HtmlListingSource,
    id_pattern: Regex,
}

impl HtmlListingAdapter {
    pub fn new(source: HtmlListingSource) -> Result<Self> {
        let id_pattern = Regex::new(&source.id_pattern)
            .map_err(|e| AppError::config(format!("invalid id_pattern: {e}")))?;
        Ok(Self { source, id_pattern })
    }

    /// Turn a listing page into source records.
    pub fn parse_listing(&self, html: &str) -> Result<Vec<SourceRecord>> {
        let selectors = &self.source.selectors;
        let card_sel = parse_selector(&selectors.card)?;
        let title_sel = parse_selector(&selectors.title)?;
        let link_sel = parse_selector(&selectors.link)?;
        let score_sel = parse_selector(&selectors.score)?;
        let poster_sel = parse_selector(&selectors.poster)?;
        let date_sel = parse_selector(&selectors.date)?;

        let base_url = Url::parse(&self.source.url)?;
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for card in document.select(&card_sel) {
            let mut record = Map::new();

            if let Some(title) = card.select(&title_sel).next().map(element_text) {
                if !title.is_empty() {
                    record.insert("title".into(), Value::String(title));
                }
            }

            let href = card
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"));
            if let Some(id) = href.and_then(|h| self.extract_id(h)) {
                record.insert("id".into(), Value::String(id));
            }

            let score = card
                .select(&score_sel)
                .next()
                .and_then(|e| e.value().attr(&selectors.score_attr));
            if let Some(score) = score {
                record.insert("score".into(), Value::String(score.trim().to_string()));
            }

            let poster = card.select(&poster_sel).next().and_then(|img| {
                img.value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"))
            });
            if let Some(poster) = poster.and_then(|p| clean_poster_url(&base_url, p)) {
                record.insert("poster".into(), Value::String(poster));
            }

            if let Some(date) = card.select(&date_sel).next().map(element_text) {
                if !date.is_empty() {
                    record.insert("date".into(), Value::String(date));
                }
            }

            records.push(Value::Object(record));
        }

        Ok(records)
    }

    /// Pull the numeric id out of a detail link such as `/movie/42-example`.
    fn extract_id(&self, href: &str) -> Option<String> {
        if let Some(id) = self
            .id_pattern
            .captures(href)
            .and_then(|caps| caps.get(1))
        {
            return Some(id.as_str().to_string());
        }

        let last = href.trim_end_matches('/').rsplit('/').next()?;
        let candidate = last.split('-').next()?;
        (!candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()))
            .then(|| candidate.to_string())
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
    fn describe(&self) -> String {
        format!("html_listing {}", self.source.url)
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<SourceRecord>> {
        log::info!("Fetching listing page {}", self.source.url);
        let html = fetch_text(client, &self.source.url).await?;
        let records = self.parse_listing(&html)?;

        if records.is_empty() {
            log::warn!("No cards matched '{}' on {}", self.source.selectors.card, self.source.url);
        } else {
            log::info!("Extracted {} cards", records.len());
        }
        Ok(records)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absolute poster URL in a larger size, or `None` for placeholder images.
fn clean_poster_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains("glyphicons-basic-") || raw.contains("loading.svg") {
        return None;
    }

    let absolute = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        resolve_url(base, raw)
    };

    Some(
        absolute
            .replace("/w94_and_h141_bestv2/", "/w342/")
            .replace("/w150_and_h225_bestv2/", "/w342/")
            .replace("/w185/", "/w342/"),
    )
}
