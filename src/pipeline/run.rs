// src/pipeline/run.rs

//! Feed generation pipeline.
//!
//! fetch -> normalize -> (reverse) -> (enrich) -> assemble -> serialize -> write

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{Config, FeedConfig, FeedItem, HttpConfig};
use crate::pipeline::{assemble, normalize_all, serialize};
use crate::services::{EnrichStats, TraktEnricher, adapter_for, enrich_all};
use crate::storage::{FeedStorage, WriteOutcome};

/// Secrets resolved for one feed before any network activity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub source: Option<String>,
    pub enrichment: Option<String>,
}

/// Resolve the feed's credentials through `lookup` (normally the process environment).
///
/// A missing source credential, or a missing enrichment credential marked
/// `required`, is an error. A missing optional enrichment credential only
/// disables enrichment.
pub fn resolve_credentials<F>(feed: &FeedConfig, lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let source = match feed.source.required_credential() {
        Some(name) => Some(present(name).ok_or_else(|| AppError::Credential(name.to_string()))?),
        None => None,
    };

    let enrichment = match &feed.enrichment {
        Some(cfg) => match present(&cfg.credential_env) {
            Some(value) => Some(value),
            None if cfg.required => return Err(AppError::Credential(cfg.credential_env.clone())),
            None => {
                log::warn!(
                    "[{}] {} not set, enrichment disabled",
                    feed.name,
                    cfg.credential_env
                );
                None
            }
        },
        None => None,
    };

    Ok(Credentials { source, enrichment })
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Render normalized items into the final feed text.
pub fn render(feed: &FeedConfig, items: Vec<FeedItem>, now: DateTime<Utc>) -> Result<String> {
    let doc = assemble(&feed.channel, items, &feed.fields, &feed.labels, now);
    serialize(&doc)
}

/// Summary of one feed run.
#[derive(Debug, Clone)]
pub struct FeedReport {
    pub name: String,
    pub record_count: usize,
    pub item_count: usize,
    pub enrichment: Option<EnrichStats>,
    pub outcome: WriteOutcome,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Build one feed end to end with already-resolved credentials.
pub async fn run_feed(
    feed: &FeedConfig,
    credentials: Credentials,
    http: &HttpConfig,
    client: &Client,
    storage: &dyn FeedStorage,
    now: DateTime<Utc>,
) -> Result<FeedReport> {
    let start_time = Utc::now();

    let adapter = adapter_for(&feed.source, credentials.source)?;
    log::info!("[{}] Fetching {}", feed.name, adapter.describe());
    let records = adapter.fetch(client).await?;
    log::info!("[{}] {} records fetched", feed.name, records.len());

    let mut items = normalize_all(&records, &feed.schema);
    if items.len() < records.len() {
        log::warn!(
            "[{}] {} of {} records skipped",
            feed.name,
            records.len() - items.len(),
            records.len()
        );
    }
    if feed.reverse {
        items.reverse();
    }

    let mut enrichment = None;
    if let (Some(cfg), Some(client_id)) = (&feed.enrichment, credentials.enrichment) {
        let enricher = TraktEnricher::new(cfg, client_id);
        let (enriched, stats) = enrich_all(client, &enricher, items, http.max_concurrent).await;
        log::info!(
            "[{}] Enrichment: {} linked, {} unmatched, {} failed",
            feed.name,
            stats.linked,
            stats.unmatched,
            stats.failed
        );
        items = enriched;
        enrichment = Some(stats);
    }

    let item_count = items.len();
    let content = render(feed, items, now)?;
    let outcome = storage
        .write_if_changed(&feed.output, &content, &feed.change)
        .await?;

    Ok(FeedReport {
        name: feed.name.clone(),
        record_count: records.len(),
        item_count,
        enrichment,
        outcome,
        start_time,
        end_time: Utc::now(),
    })
}

/// Pick the feeds to run; an empty selection means all of them.
pub fn select_feeds<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a FeedConfig>> {
    if names.is_empty() {
        return Ok(config.feeds.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            config
                .feed(name)
                .ok_or_else(|| AppError::config(format!("Unknown feed '{}'", name)))
        })
        .collect()
}

/// Run the selected feeds in order.
///
/// Credentials for every selected feed are checked first, so a missing
/// required secret fails the run before any request is sent. After that a
/// failing feed is logged and the remaining feeds still run.
pub async fn run_all(
    config: &Config,
    names: &[String],
    client: &Client,
    storage: &dyn FeedStorage,
) -> Result<Vec<FeedReport>> {
    let feeds = select_feeds(config, names)?;
    let credentials = feeds
        .iter()
        .map(|feed| resolve_credentials(feed, env_lookup))
        .collect::<Result<Vec<_>>>()?;

    let now = Utc::now();
    let total = feeds.len();
    let mut reports = Vec::with_capacity(total);
    let mut failed = 0;

    for (feed, creds) in feeds.into_iter().zip(credentials) {
        log::info!("[{}] Building feed", feed.name);
        match run_feed(feed, creds, &config.http, client, storage, now).await {
            Ok(report) => {
                let status = if report.outcome.is_written() {
                    "written"
                } else {
                    "unchanged"
                };
                log::info!(
                    "[{}] {} items, {} -> {} ({:.1}s)",
                    report.name,
                    report.item_count,
                    status,
                    report.outcome.path().display(),
                    (report.end_time - report.start_time).num_milliseconds() as f64 / 1000.0
                );
                reports.push(report);
            }
            Err(e) => {
                failed += 1;
                log::error!("[{}] Feed failed: {}", feed.name, e);
            }
        }
    }

    if failed > 0 {
        return Err(AppError::FeedsFailed { failed, total });
    }
    Ok(reports)
}
