// src/services/enrich.rs

//! Cross-reference enrichment.
//!
//! Looks each item up in a secondary API by its external id and attaches a
//! link to the matched entry. A failed lookup only affects its own item.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;

use crate::error::Result;
use crate::models::{EnrichmentConfig, FeedItem};
use crate::utils::http::fetch_json;

/// Secondary lookup keyed by an item's external id.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Cross-reference link for the item, `None` when the upstream has no match.
    async fn cross_ref(&self, client: &Client, item: &FeedItem) -> Result<Option<String>>;
}

/// Trakt.tv search by TMDB id.
pub struct TraktEnricher {
    api_base: String,
    link_base: String,
    client_id: String,
}

impl TraktEnricher {
    pub fn new(config: &EnrichmentConfig, client_id: impl Into<String>) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            link_base: config.link_base.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        }
    }

    fn search_url(&self, tmdb_id: &str) -> String {
        format!("{}/search/tmdb/{}?type=movie", self.api_base, tmdb_id)
    }

    /// Slug of the first search hit.
    pub fn slug_from_response(data: &Value) -> Option<String> {
        data.get(0)?
            .get("movie")?
            .get("ids")?
            .get("slug")?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl Enricher for TraktEnricher {
    async fn cross_ref(&self, client: &Client, item: &FeedItem) -> Result<Option<String>> {
        let request = client
            .get(self.search_url(&item.external_id))
            .header("Content-Type", "application/json")
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id);

        let data: Value = fetch_json(request).await?;
        Ok(Self::slug_from_response(&data).map(|slug| format!("{}/{}", self.link_base, slug)))
    }
}

/// Counters for one enrichment pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub linked: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Enrich all items with bounded concurrency, keeping their order.
pub async fn enrich_all(
    client: &Client,
    enricher: &dyn Enricher,
    items: Vec<FeedItem>,
    concurrency: usize,
) -> (Vec<FeedItem>, EnrichStats) {
    let mut stats = EnrichStats::default();

    let results: Vec<(FeedItem, Result<Option<String>>)> = stream::iter(items)
        .map(|item| async move {
            let result = enricher.cross_ref(client, &item).await;
            (item, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let items = results
        .into_iter()
        .map(|(mut item, result)| {
            match result {
                Ok(Some(link)) => {
                    stats.linked += 1;
                    item.cross_ref = Some(link);
                }
                Ok(None) => stats.unmatched += 1,
                Err(e) => {
                    stats.failed += 1;
                    log::warn!(
                        "Enrichment failed for '{}' ({}): {}",
                        item.title,
                        item.external_id,
                        e
                    );
                }
            }
            item
        })
        .collect();

    (items, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    struct StubEnricher;

    #[async_trait]
    impl Enricher for StubEnricher {
        async fn cross_ref(&self, _client: &Client, item: &FeedItem) -> Result<Option<String>> {
            match item.external_id.as_str() {
                "fail" => Err(AppError::fetch("stub", "boom")),
                "none" => Ok(None),
                id => Ok(Some(format!("https://trakt.tv/movies/{id}"))),
            }
        }
    }

    fn item(id: &str) -> FeedItem {
        FeedItem::new(id, format!("Film {id}"), format!("https://example.com/{id}"))
    }

    #[test]
    fn test_slug_from_response() {
        let data = json!([{ "type": "movie", "movie": { "ids": { "slug": "dune-part-two-2024", "tmdb": 693134 } } }]);
        assert_eq!(
            TraktEnricher::slug_from_response(&data),
            Some("dune-part-two-2024".to_string())
        );
        assert_eq!(TraktEnricher::slug_from_response(&json!([])), None);
        assert_eq!(TraktEnricher::slug_from_response(&json!({ "error": "x" })), None);
    }

    #[test]
    fn test_search_url() {
        let enricher = TraktEnricher::new(&EnrichmentConfig::default(), "client");
        assert_eq!(
            enricher.search_url("693134"),
            "https://api.trakt.tv/search/tmdb/693134?type=movie"
        );
    }

    #[tokio::test]
    async fn test_enrich_all_preserves_order_and_isolates_failures() {
        let client = Client::new();
        let items = vec![item("a"), item("fail"), item("none"), item("b")];

        let (enriched, stats) = enrich_all(&client, &StubEnricher, items, 3).await;

        let ids: Vec<_> = enriched.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "fail", "none", "b"]);
        assert_eq!(enriched[0].cross_ref.as_deref(), Some("https://trakt.tv/movies/a"));
        assert_eq!(enriched[1].cross_ref, None);
        assert_eq!(enriched[2].cross_ref, None);
        assert_eq!(
            stats,
            EnrichStats {
                linked: 2,
                unmatched: 1,
                failed: 1
            }
        );
    }
}
