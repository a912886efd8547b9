// src/pipeline/normalize.rs

//! Record normalizer: raw upstream JSON to [`FeedItem`].
//!
//! Only a missing identifier rejects a record. Every other field is optional
//! and silently dropped when absent or malformed (a malformed date also logs
//! a warning).

use std::fmt;

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{FeedItem, RecordSchema};
use crate::utils::fill_template;

/// Result of normalizing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Item(FeedItem),
    Skip(SkipReason),
}

/// Why a record was left out of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Record is not a JSON object
    NotAnObject,
    /// Identifier field is absent, null or empty
    MissingId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "record is not an object"),
            SkipReason::MissingId => write!(f, "missing identifier"),
        }
    }
}

/// Normalize a single source record according to its schema.
pub fn normalize(record: &Value, schema: &RecordSchema) -> Normalized {
    if !record.is_object() {
        return Normalized::Skip(SkipReason::NotAnObject);
    }

    let Some(id) = scalar_text(record.get(&schema.id)) else {
        return Normalized::Skip(SkipReason::MissingId);
    };

    let title = scalar_text(record.get(&schema.title))
        .unwrap_or_else(|| schema.title_placeholder.clone());
    let link = fill_template(&schema.link_template, "id", &id);

    let mut item = FeedItem::new(id, title, link);

    item.poster = field(record, &schema.poster)
        .and_then(|v| scalar_text(Some(v)))
        .map(|path| poster_url(&path, schema.poster_prefix.as_deref()));
    item.score = field(record, &schema.score)
        .and_then(number)
        .map(|score| scale_score(score, schema.score_scale));
    item.genres = field(record, &schema.genres).map(names).unwrap_or_default();
    item.providers = field(record, &schema.providers)
        .map(names)
        .unwrap_or_default();
    item.release_date = release_date(record, schema, &item);
    item.year = field(record, &schema.year)
        .and_then(number)
        .map(|y| y as i32);
    item.duration_minutes = field(record, &schema.duration)
        .and_then(number)
        .filter(|d| *d > 0.0)
        .map(|d| d as u32);
    item.minimal_age = field(record, &schema.minimal_age)
        .and_then(number)
        .filter(|a| *a > 0.0)
        .map(|a| a as u32);
    item.overview = field(record, &schema.overview).and_then(|v| scalar_text(Some(v)));

    Normalized::Item(item)
}

/// Normalize a batch, dropping skipped records with a log line each.
pub fn normalize_all(records: &[Value], schema: &RecordSchema) -> Vec<FeedItem> {
    let mut items = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match normalize(record, schema) {
            Normalized::Item(item) => items.push(item),
            Normalized::Skip(reason) => {
                log::warn!(
                    "Skipping record #{} {}: {}",
                    index,
                    record_label(record, schema),
                    reason
                );
            }
        }
    }
    items
}

/// Title of a raw record for log lines, falling back to `name`/`title`.
fn record_label(record: &Value, schema: &RecordSchema) -> String {
    [schema.title.as_str(), "name", "title"]
        .into_iter()
        .find_map(|key| scalar_text(record.get(key)))
        .map(|title| format!("'{title}'"))
        .unwrap_or_else(|| "(untitled)".to_string())
}

fn field<'a>(record: &'a Value, name: &Option<String>) -> Option<&'a Value> {
    record.get(name.as_deref()?)
}

/// Non-empty string, or a number rendered as text.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A JSON number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scale to a percentage. A scaled score is rounded to one decimal place;
/// with a scale of 1 the value passes through untouched.
fn scale_score(score: f64, scale: f64) -> f64 {
    if scale == 1.0 {
        return score;
    }
    (score * scale * 10.0).round() / 10.0
}

/// `name` of every array element that has one.
fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| scalar_text(entry.get("name")))
                .collect()
        })
        .unwrap_or_default()
}

fn poster_url(path: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !path.starts_with("http://") && !path.starts_with("https://") => {
            format!("{}{}", prefix.trim_end_matches('/'), ensure_leading_slash(path))
        }
        _ => path.to_string(),
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// First present release date field, parsed with the schema's format.
fn release_date(record: &Value, schema: &RecordSchema, item: &FeedItem) -> Option<NaiveDate> {
    let raw = schema
        .release_date
        .iter()
        .find_map(|name| scalar_text(record.get(name)))?;

    match NaiveDate::parse_from_str(&raw, &schema.date_format) {
        Ok(date) => Some(date),
        Err(e) => {
            log::warn!(
                "Unparseable release date '{}' for '{}' ({}): {}",
                raw,
                item.title,
                item.external_id,
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinobox() -> RecordSchema {
        RecordSchema::default()
    }

    fn tmdb() -> RecordSchema {
        RecordSchema {
            title: "title".to_string(),
            link_template: "https://www.themoviedb.org/movie/{id}".to_string(),
            poster: Some("poster_path".to_string()),
            poster_prefix: Some("https://image.tmdb.org/t/p/w500".to_string()),
            score: Some("vote_average".to_string()),
            score_scale: 10.0,
            genres: None,
            providers: None,
            release_date: vec!["release_date".to_string()],
            year: None,
            duration: None,
            minimal_age: None,
            overview: Some("overview".to_string()),
            ..RecordSchema::default()
        }
    }

    fn expect_item(normalized: Normalized) -> FeedItem {
        match normalized {
            Normalized::Item(item) => item,
            Normalized::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_kinobox_record() {
        let record = json!({
            "id": "42",
            "name": "Example",
            "genres": [{ "name": "Drama" }, { "name": "Comedy" }],
            "score": 87,
            "releaseCz": "2024-03-15"
        });

        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.external_id, "42");
        assert_eq!(item.title, "Example");
        assert_eq!(item.link, "https://www.kinobox.cz/film/42");
        assert_eq!(item.genres, vec!["Drama", "Comedy"]);
        assert_eq!(item.score, Some(87.0));
        assert_eq!(item.release_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert!(item.poster.is_none());
        assert!(item.providers.is_empty());
    }

    #[test]
    fn test_numeric_id_and_placeholder_title() {
        let record = json!({ "id": 1234 });
        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.external_id, "1234");
        assert_eq!(item.title, "Neznámý název");
        assert_eq!(item.link, "https://www.kinobox.cz/film/1234");
    }

    #[test]
    fn test_missing_id_is_skipped() {
        let schema = kinobox();
        for record in [
            json!({ "name": "No id" }),
            json!({ "id": null, "name": "Null id" }),
            json!({ "id": "  ", "name": "Blank id" }),
        ] {
            assert_eq!(
                normalize(&record, &schema),
                Normalized::Skip(SkipReason::MissingId)
            );
        }
        assert_eq!(
            normalize(&json!("text"), &schema),
            Normalized::Skip(SkipReason::NotAnObject)
        );
    }

    #[test]
    fn test_release_date_fallback_field() {
        let record = json!({ "id": 1, "releasedToCinema": "2023-11-02" });
        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.release_date, NaiveDate::from_ymd_opt(2023, 11, 2));
        assert_eq!(item.display_year(), Some(2023));
    }

    #[test]
    fn test_bad_date_is_dropped() {
        let record = json!({ "id": 1, "name": "Broken", "releaseCz": "15. 3. 2024" });
        let item = expect_item(normalize(&record, &kinobox()));
        assert!(item.release_date.is_none());
    }

    #[test]
    fn test_kinobox_extras() {
        let record = json!({
            "id": 7,
            "name": "Long Film",
            "year": 2022,
            "duration": 148,
            "minimalAge": "12",
            "providers": [{ "name": "Netflix" }, { "id": 3 }, { "name": "HBO Max" }],
            "poster": "https://img.kinobox.cz/7.jpg"
        });

        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.year, Some(2022));
        assert_eq!(item.duration_minutes, Some(148));
        assert_eq!(item.minimal_age, Some(12));
        assert_eq!(item.providers, vec!["Netflix", "HBO Max"]);
        assert_eq!(item.poster.as_deref(), Some("https://img.kinobox.cz/7.jpg"));
    }

    #[test]
    fn test_tmdb_record() {
        let record = json!({
            "id": 693134,
            "title": "Dune: Part Two",
            "poster_path": "/czembW0Rk1Ke7lCJGahbOhdCuhV.jpg",
            "vote_average": 8.2,
            "release_date": "2024-02-27",
            "overview": "Paul Atreides unites with Chani."
        });

        let item = expect_item(normalize(&record, &tmdb()));
        assert_eq!(item.link, "https://www.themoviedb.org/movie/693134");
        assert_eq!(
            item.poster.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/czembW0Rk1Ke7lCJGahbOhdCuhV.jpg")
        );
        assert_eq!(item.score, Some(82.0));
        assert_eq!(item.overview.as_deref(), Some("Paul Atreides unites with Chani."));
        assert_eq!(item.display_year(), Some(2024));
    }

    #[test]
    fn test_string_score() {
        let record = json!({ "id": "5", "score": "73" });
        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.score, Some(73.0));
    }

    #[test]
    fn test_unscaled_score_passes_through() {
        let record = json!({ "id": "5", "score": 87.25 });
        let item = expect_item(normalize(&record, &kinobox()));
        assert_eq!(item.score, Some(87.25));

        assert_eq!(scale_score(7.25, 10.0), 72.5);
        assert_eq!(scale_score(8.2, 10.0), 82.0);
    }

    #[test]
    fn test_record_label() {
        let schema = kinobox();
        assert_eq!(record_label(&json!({ "name": "Anonymous" }), &schema), "'Anonymous'");
        assert_eq!(record_label(&json!({ "title": "Other Key" }), &schema), "'Other Key'");
        assert_eq!(record_label(&json!({ "id": null }), &schema), "(untitled)");
        assert_eq!(record_label(&json!("text"), &schema), "(untitled)");
    }

    #[test]
    fn test_normalize_all_drops_skips() {
        let records = vec![
            json!({ "id": "1", "name": "First" }),
            json!({ "name": "Anonymous" }),
            json!({ "id": "3", "name": "Third" }),
        ];
        let items = normalize_all(&records, &kinobox());
        let ids: Vec<_> = items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
