// src/models/item.rs

//! Canonical feed item produced by the record normalizer.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A film normalized from any upstream source.
///
/// `title` and `link` are always populated; records that cannot provide an
/// identifier never become a `FeedItem`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FeedItem {
    /// Source-specific identifier (guid, enrichment key)
    pub external_id: String,

    /// Display title
    pub title: String,

    /// Permanent link built from the identifier
    pub link: String,

    /// Poster image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,

    /// Score as a percentage (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Genre names in source order
    #[serde(default)]
    pub genres: Vec<String>,

    /// Streaming/cinema provider names in source order
    #[serde(default)]
    pub providers: Vec<String>,

    /// Release date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,

    /// Production year when the source states it explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Running time in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,

    /// Minimal recommended viewer age
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal_age: Option<u32>,

    /// Plot summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    /// Cross-reference link attached by enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_ref: Option<String>,
}

impl FeedItem {
    /// Create an item with only the required fields set.
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    /// Year to display: the explicit year, else the release date's year.
    pub fn display_year(&self) -> Option<i32> {
        self.year.or_else(|| self.release_date.map(|d| d.year()))
    }
}
