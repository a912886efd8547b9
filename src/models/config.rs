//! Application configuration structures.
//!
//! One `FeedConfig` describes one output file end to end: where the records
//! come from, how a raw record maps onto a [`FeedItem`](crate::models::FeedItem),
//! which parts end up in the item description and which elements are ignored
//! when deciding whether the file changed.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Feed definitions, processed in order
    #[serde(default = "defaults::feeds")]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `path` if it exists, else the built-in feeds.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "{} not found, using built-in feed definitions",
                path.display()
            );
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Look up a feed by name.
    pub fn feed(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.feeds.is_empty() {
            return Err(AppError::validation("No feeds defined"));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if !names.insert(feed.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate feed name '{}'",
                    feed.name
                )));
            }
            feed.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            feeds: defaults::feeds(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent enrichment lookups
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// A single feed: source, record mapping, output rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Unique feed name (used on the command line)
    pub name: String,

    /// Output path relative to the output root
    pub output: String,

    /// Channel metadata
    pub channel: ChannelConfig,

    /// Where records come from
    pub source: SourceConfig,

    /// How a raw record maps onto a feed item
    #[serde(default)]
    pub schema: RecordSchema,

    /// Which parts to include per item
    #[serde(default)]
    pub fields: FieldSet,

    /// Description labels
    #[serde(default)]
    pub labels: Labels,

    /// Reverse source order so the first record renders on top in readers
    #[serde(default)]
    pub reverse: bool,

    /// Optional cross-reference lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentConfig>,

    /// Change detection rules
    #[serde(default)]
    pub change: ChangePolicy,
}

impl FeedConfig {
    /// Validate a single feed definition.
    pub fn validate(&self) -> Result<()> {
        let ctx = |msg: &str| AppError::validation(format!("feed '{}': {}", self.name, msg));

        if self.name.trim().is_empty() {
            return Err(AppError::validation("feed name is empty"));
        }
        if self.output.trim().is_empty() {
            return Err(ctx("output path is empty"));
        }
        if !self.schema.link_template.contains("{id}") {
            return Err(ctx("schema.link_template must contain {id}"));
        }
        if self.schema.date_format.trim().is_empty() {
            return Err(ctx("schema.date_format is empty"));
        }
        if self.schema.score_scale <= 0.0 {
            return Err(ctx("schema.score_scale must be > 0"));
        }
        if Tz::from_str(&self.channel.timezone).is_err() {
            return Err(ctx(&format!(
                "unknown timezone '{}'",
                self.channel.timezone
            )));
        }

        match &self.source {
            SourceConfig::NextData(src) => {
                if src.build_id_pages.is_empty() {
                    return Err(ctx("source.build_id_pages is empty"));
                }
                if src.items_path.is_empty() {
                    return Err(ctx("source.items_path is empty"));
                }
            }
            SourceConfig::TmdbDiscover(src) => {
                if src.pages == 0 {
                    return Err(ctx("source.pages must be > 0"));
                }
                if !src.endpoint.contains("{page}") {
                    return Err(ctx("source.endpoint must contain {page}"));
                }
            }
            SourceConfig::HtmlListing(src) => {
                for selector in src.selectors.all() {
                    Selector::parse(selector)
                        .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
                }
                regex::Regex::new(&src.id_pattern)
                    .map_err(|e| ctx(&format!("invalid id_pattern: {e}")))?;
            }
        }

        if let Some(enrichment) = &self.enrichment {
            if enrichment.credential_env.trim().is_empty() {
                return Err(ctx("enrichment.credential_env is empty"));
            }
        }
        Ok(())
    }
}

/// Channel metadata written to `<channel>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,

    #[serde(default = "defaults::language")]
    pub language: String,

    /// Public URL where this feed is hosted
    pub self_link: String,

    /// IANA timezone used for `lastBuildDate`
    #[serde(default = "defaults::timezone")]
    pub timezone: String,
}

/// Upstream source, selected by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Next.js data endpoint behind a rotating build identifier
    NextData(NextDataSource),
    /// TMDB discover API (bearer token)
    TmdbDiscover(TmdbDiscoverSource),
    /// Scraped HTML listing page
    HtmlListing(HtmlListingSource),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::NextData(_) => "next_data",
            SourceConfig::TmdbDiscover(_) => "tmdb_discover",
            SourceConfig::HtmlListing(_) => "html_listing",
        }
    }

    /// Environment variable holding a credential this source cannot run without.
    pub fn required_credential(&self) -> Option<&str> {
        match self {
            SourceConfig::TmdbDiscover(src) => Some(&src.credential_env),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextDataSource {
    /// Site root, e.g. `https://www.kinobox.cz`
    pub base_url: String,

    /// Data path appended after the build id, e.g. `/cs/filmy/trendy.json`
    pub data_path: String,

    /// Pages scanned for the build id, in order
    pub build_id_pages: Vec<String>,

    /// Key path to the record array
    #[serde(default = "defaults::next_data_items_path")]
    pub items_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbDiscoverSource {
    /// Endpoint URL with a `{page}` placeholder
    pub endpoint: String,

    /// Number of pages to fetch, starting at 1
    #[serde(default = "defaults::tmdb_pages")]
    pub pages: u32,

    /// Environment variable holding the bearer token
    #[serde(default = "defaults::tmdb_credential_env")]
    pub credential_env: String,

    /// Key path to the record array
    #[serde(default = "defaults::tmdb_items_path")]
    pub items_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlListingSource {
    /// Listing page URL
    pub url: String,

    /// Regex with one capture group extracting the id from a card link
    #[serde(default = "defaults::tmdb_id_pattern")]
    pub id_pattern: String,

    #[serde(default)]
    pub selectors: ListingSelectors,
}

/// CSS selectors for scraping a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// One element per film
    pub card: String,
    /// Title element within a card
    pub title: String,
    /// Anchor carrying the detail link
    pub link: String,
    /// Element carrying the score attribute
    pub score: String,
    /// Attribute holding the score percentage
    pub score_attr: String,
    /// Poster `<img>`
    pub poster: String,
    /// Release date text
    pub date: String,
}

impl ListingSelectors {
    /// All selector strings (for validation).
    pub fn all(&self) -> [&str; 6] {
        [
            &self.card,
            &self.title,
            &self.link,
            &self.score,
            &self.poster,
            &self.date,
        ]
    }
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: "div.card.style_1".to_string(),
            title: "h2".to_string(),
            link: "h2 a".to_string(),
            score: "div.user_score_chart".to_string(),
            score_attr: "data-percent".to_string(),
            poster: "img".to_string(),
            date: "p".to_string(),
        }
    }
}

/// Field mapping from a raw source record to a feed item.
///
/// Optional field names set to `None` are never read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSchema {
    /// Identifier field (string or number)
    pub id: String,
    /// Title field
    pub title: String,
    /// Title used when the record has none
    pub title_placeholder: String,
    /// Item link, `{id}` is replaced with the identifier
    pub link_template: String,
    pub poster: Option<String>,
    /// Prepended to relative poster paths
    pub poster_prefix: Option<String>,
    pub score: Option<String>,
    /// Multiplier turning the source score into a percentage
    pub score_scale: f64,
    /// Array of `{name}` objects
    pub genres: Option<String>,
    /// Array of `{name}` objects
    pub providers: Option<String>,
    /// Candidate release date fields, first present wins
    pub release_date: Vec<String>,
    /// chrono format of the release date
    pub date_format: String,
    pub year: Option<String>,
    pub duration: Option<String>,
    pub minimal_age: Option<String>,
    pub overview: Option<String>,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            title: "name".to_string(),
            title_placeholder: "Neznámý název".to_string(),
            link_template: "https://www.kinobox.cz/film/{id}".to_string(),
            poster: Some("poster".to_string()),
            poster_prefix: None,
            score: Some("score".to_string()),
            score_scale: 1.0,
            genres: Some("genres".to_string()),
            providers: Some("providers".to_string()),
            release_date: vec!["releaseCz".to_string(), "releasedToCinema".to_string()],
            date_format: "%Y-%m-%d".to_string(),
            year: Some("year".to_string()),
            duration: Some("duration".to_string()),
            minimal_age: Some("minimalAge".to_string()),
            overview: None,
        }
    }
}

/// Per-item inclusion switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSet {
    pub poster: bool,
    pub score: bool,
    pub genres: bool,
    pub providers: bool,
    pub year: bool,
    pub duration: bool,
    pub minimal_age: bool,
    pub overview: bool,
    pub cross_ref: bool,
    pub pub_date: bool,
    pub guid: bool,
}

impl Default for FieldSet {
    fn default() -> Self {
        Self {
            poster: true,
            score: true,
            genres: true,
            providers: true,
            year: true,
            duration: true,
            minimal_age: true,
            overview: true,
            cross_ref: true,
            pub_date: true,
            guid: true,
        }
    }
}

/// Labels used in generated item descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub score: String,
    pub genres: String,
    pub providers: String,
    pub year: String,
    pub duration: String,
    pub minimal_age: String,
    pub cross_ref: String,
    /// Appended to the title in the poster's alt text
    pub poster_alt: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            score: "Hodnocení".to_string(),
            genres: "Žánry".to_string(),
            providers: "Dostupné na".to_string(),
            year: "Rok".to_string(),
            duration: "Délka".to_string(),
            minimal_age: "Minimální věk".to_string(),
            cross_ref: "Více na Trakt.tv".to_string(),
            poster_alt: "plakát".to_string(),
        }
    }
}

/// Secondary lookup attaching a cross-reference link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// API root, e.g. `https://api.trakt.tv`
    #[serde(default = "defaults::trakt_api_base")]
    pub api_base: String,

    /// Base for the resulting link; the slug is appended
    #[serde(default = "defaults::trakt_link_base")]
    pub link_base: String,

    /// Environment variable holding the client id
    #[serde(default = "defaults::trakt_credential_env")]
    pub credential_env: String,

    /// Abort the run when the credential is missing instead of skipping enrichment
    #[serde(default)]
    pub required: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::trakt_api_base(),
            link_base: defaults::trakt_link_base(),
            credential_env: defaults::trakt_credential_env(),
            required: false,
        }
    }
}

/// Which parts of the rendered document are ignored by change detection.
///
/// With an empty list the raw bytes are compared, so a feed with a build
/// timestamp is rewritten on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePolicy {
    /// Element names whose single-line occurrences are dropped before hashing
    pub ignore_elements: Vec<String>,
}

impl Default for ChangePolicy {
    fn default() -> Self {
        Self {
            ignore_elements: vec!["lastBuildDate".to_string()],
        }
    }
}

impl ChangePolicy {
    /// Compare raw bytes only.
    pub fn strict() -> Self {
        Self {
            ignore_elements: Vec::new(),
        }
    }
}

mod defaults {
    use super::*;

    const KINOBOX: &str = "https://www.kinobox.cz";
    const SELF_BASE: &str = "https://raw.githubusercontent.com/scarzxx/kinobox-rss/refs/heads/main/feed";

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Channel defaults
    pub fn language() -> String {
        "cs-cz".into()
    }
    pub fn timezone() -> String {
        "Europe/Prague".into()
    }

    // Source defaults
    pub fn next_data_items_path() -> Vec<String> {
        vec!["pageProps".into(), "filmsOut".into(), "items".into()]
    }
    pub fn tmdb_items_path() -> Vec<String> {
        vec!["results".into()]
    }
    pub fn tmdb_pages() -> u32 {
        2
    }
    pub fn tmdb_credential_env() -> String {
        "TMDB_API_KEY".into()
    }
    pub fn tmdb_id_pattern() -> String {
        r"/movie/(\d+)".into()
    }

    // Enrichment defaults
    pub fn trakt_api_base() -> String {
        "https://api.trakt.tv".into()
    }
    pub fn trakt_link_base() -> String {
        "https://trakt.tv/movies".into()
    }
    pub fn trakt_credential_env() -> String {
        "TRAKT_CLIENT_ID".into()
    }

    fn kinobox_feed(
        name: &str,
        listing: &str,
        title: &str,
        description: &str,
        reverse: bool,
    ) -> FeedConfig {
        let file = format!("{name}_rss.xml");
        FeedConfig {
            name: name.into(),
            output: format!("feed/{file}"),
            channel: ChannelConfig {
                title: title.into(),
                link: format!("{KINOBOX}/filmy/{listing}"),
                description: description.into(),
                language: language(),
                self_link: format!("{SELF_BASE}/{file}"),
                timezone: timezone(),
            },
            source: SourceConfig::NextData(NextDataSource {
                base_url: KINOBOX.into(),
                data_path: format!("/cs/filmy/{listing}.json"),
                build_id_pages: vec![
                    format!("{KINOBOX}/filmy/{listing}"),
                    format!("{KINOBOX}/filmy"),
                ],
                items_path: next_data_items_path(),
            }),
            schema: RecordSchema::default(),
            fields: FieldSet::default(),
            labels: Labels::default(),
            reverse,
            enrichment: None,
            change: ChangePolicy::default(),
        }
    }

    fn tmdb_schema() -> RecordSchema {
        RecordSchema {
            title: "title".into(),
            link_template: "https://www.themoviedb.org/movie/{id}".into(),
            poster: Some("poster_path".into()),
            poster_prefix: Some("https://image.tmdb.org/t/p/w500".into()),
            score: Some("vote_average".into()),
            score_scale: 10.0,
            genres: None,
            providers: None,
            release_date: vec!["release_date".into()],
            year: None,
            duration: None,
            minimal_age: None,
            overview: Some("overview".into()),
            ..RecordSchema::default()
        }
    }

    pub fn feeds() -> Vec<FeedConfig> {
        vec![
            kinobox_feed(
                "kinobox_trendy",
                "trendy",
                "Trendy filmy – Kinobox.cz",
                "Aktuálně nejvíce trendy filmy na Kinobox.cz",
                true,
            ),
            kinobox_feed(
                "kinobox_novinky",
                "novinky",
                "Novinky – Kinobox.cz",
                "Nejnovější filmy přidané na Kinobox.cz",
                false,
            ),
            FeedConfig {
                name: "tmdb_popular".into(),
                output: "feed/tmdb_popular_rss.xml".into(),
                channel: ChannelConfig {
                    title: "Oblíbené filmy - TheMovieDB".into(),
                    link: "https://www.themoviedb.org/".into(),
                    description: "Seznam nejoblíbenější filmů z TheMovieDB.".into(),
                    language: "cs-CZ".into(),
                    self_link: format!("{SELF_BASE}/tmdb_popular_rss.xml"),
                    timezone: "UTC".into(),
                },
                source: SourceConfig::TmdbDiscover(TmdbDiscoverSource {
                    endpoint: "https://api.themoviedb.org/3/discover/movie?include_adult=false&include_video=false&language=cs-CZ&page={page}&sort_by=popularity.desc".into(),
                    pages: tmdb_pages(),
                    credential_env: tmdb_credential_env(),
                    items_path: tmdb_items_path(),
                }),
                schema: tmdb_schema(),
                fields: FieldSet::default(),
                labels: Labels::default(),
                reverse: false,
                enrichment: Some(EnrichmentConfig {
                    required: true,
                    ..EnrichmentConfig::default()
                }),
                change: ChangePolicy::default(),
            },
            FeedConfig {
                name: "tmdb_trakt_popular".into(),
                output: "feed/tmdb_trakt_popular_rss.xml".into(),
                channel: ChannelConfig {
                    title: "TMDB Populární filmy".into(),
                    link: "https://www.themoviedb.org/movie".into(),
                    description: "Aktuálně nejoblíbenější filmy na TheMovieDB.org".into(),
                    language: "en-us".into(),
                    self_link: format!("{SELF_BASE}/tmdb_trakt_popular_rss.xml"),
                    timezone: "UTC".into(),
                },
                source: SourceConfig::HtmlListing(HtmlListingSource {
                    url: "https://www.themoviedb.org/movie".into(),
                    id_pattern: tmdb_id_pattern(),
                    selectors: ListingSelectors::default(),
                }),
                schema: RecordSchema {
                    title: "title".into(),
                    link_template: "https://www.themoviedb.org/movie/{id}".into(),
                    poster: Some("poster".into()),
                    score: Some("score".into()),
                    genres: None,
                    providers: None,
                    release_date: vec!["date".into()],
                    date_format: "%m/%d/%Y".into(),
                    year: None,
                    duration: None,
                    minimal_age: None,
                    ..RecordSchema::default()
                },
                fields: FieldSet::default(),
                labels: Labels::default(),
                reverse: false,
                enrichment: Some(EnrichmentConfig::default()),
                change: ChangePolicy::default(),
            },
        ]
    }
}
