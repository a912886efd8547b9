// src/services/build_id.rs

//! Build identifier discovery.
//!
//! Next.js sites serve their page data from `/_next/data/<build id>/...`, and
//! the build id rotates with every deploy. The current id is recovered from a
//! rendered HTML page by a ranked chain of independent extraction strategies;
//! the first strategy that yields a match wins.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::utils::http::fetch_text;

/// How much a strategy's match can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Reads the id from the framework's own metadata block
    Strict,
    /// Infers the id from static asset paths
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Strict => write!(f, "strict"),
            Tier::Fallback => write!(f, "fallback"),
        }
    }
}

/// A single extraction strategy.
#[derive(Debug)]
pub struct Strategy {
    pub name: &'static str,
    pub tier: Tier,
    pattern: Regex,
    min_len: usize,
}

impl Strategy {
    fn new(name: &'static str, tier: Tier, pattern: &str, min_len: usize) -> Self {
        Self {
            name,
            tier,
            pattern: Regex::new(pattern).expect("build id pattern is valid"),
            min_len,
        }
    }

    /// Try this strategy against a page body.
    pub fn extract(&self, html: &str) -> Option<String> {
        let caps = self.pattern.captures(html)?;
        let id = caps.get(1)?.as_str();
        (id.len() >= self.min_len).then(|| id.to_string())
    }
}

/// A discovered build identifier and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId {
    pub value: String,
    pub strategy: &'static str,
    pub tier: Tier,
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

static STRATEGIES: LazyLock<Vec<Strategy>> = LazyLock::new(|| {
    vec![
        Strategy::new(
            "next_data",
            Tier::Strict,
            // Stays inside the block: never crosses a closing tag.
            r#"<script id="__NEXT_DATA__"[^>]*>(?:[^<]|<[^/])*?"buildId":"([A-Za-z0-9_-]+)""#,
            11,
        ),
        Strategy::new(
            "manifest",
            Tier::Fallback,
            r"/_next/static/([A-Za-z0-9_-]{15,})/_(?:buildManifest|ssgManifest)\.js",
            15,
        ),
        Strategy::new(
            "static_path",
            Tier::Fallback,
            r"/_next/static/([A-Za-z0-9_-]{15,})/",
            15,
        ),
    ]
});

/// The ranked strategy chain.
pub fn strategies() -> &'static [Strategy] {
    &STRATEGIES
}

/// Find the build id in an HTML page. Returns `None` when no strategy matches.
pub fn discover(html: &str) -> Option<BuildId> {
    strategies().iter().find_map(|strategy| {
        strategy.extract(html).map(|value| BuildId {
            value,
            strategy: strategy.name,
            tier: strategy.tier,
        })
    })
}

/// Fetch each page in order until one yields a build id.
///
/// A page that fails to download is logged and skipped; running out of pages
/// is a discovery error.
pub async fn locate(client: &Client, pages: &[String]) -> Result<BuildId> {
    for page in pages {
        log::info!("Looking up build id in {}", page);
        let html = match fetch_text(client, page).await {
            Ok(html) => html,
            Err(e) => {
                log::warn!("Failed to fetch {} for build id: {}", page, e);
                continue;
            }
        };

        match discover(&html) {
            Some(build_id) => {
                log::info!(
                    "Build id {} found by {} strategy '{}'",
                    build_id.value,
                    build_id.tier,
                    build_id.strategy
                );
                return Ok(build_id);
            }
            None => log::warn!("No build id pattern matched in {}", page),
        }
    }

    Err(AppError::discovery(format!(
        "build id not found in any of {} page(s)",
        pages.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_data_block() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{},"page":"/filmy","buildId":"abc123xyz789","isFallback":false}
            </script></body></html>"#;

        let found = discover(html).unwrap();
        assert_eq!(found.value, "abc123xyz789");
        assert_eq!(found.strategy, "next_data");
        assert_eq!(found.tier, Tier::Strict);
    }

    #[test]
    fn test_manifest_fallback() {
        let html = r#"<script src="/_next/static/f5npQT84kcgxw3mp0b84H/_buildManifest.js" defer></script>"#;

        let found = discover(html).unwrap();
        assert_eq!(found.value, "f5npQT84kcgxw3mp0b84H");
        assert_eq!(found.strategy, "manifest");
        assert_eq!(found.tier, Tier::Fallback);
    }

    #[test]
    fn test_generic_static_path_fallback() {
        let html = r#"<link rel="preload" href="/_next/static/1qG7m8WJ-AtZ5GALF4npj/pages/filmy.js">"#;

        let found = discover(html).unwrap();
        assert_eq!(found.value, "1qG7m8WJ-AtZ5GALF4npj");
        assert_eq!(found.strategy, "static_path");
    }

    #[test]
    fn test_short_strict_id_falls_through() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"buildId":"short"}</script>
            <script src="/_next/static/f5npQT84kcgxw3mp0b84H/_ssgManifest.js"></script>"#;

        let found = discover(html).unwrap();
        assert_eq!(found.value, "f5npQT84kcgxw3mp0b84H");
        assert_eq!(found.strategy, "manifest");
    }

    #[test]
    fn test_not_found() {
        let html = r#"<html><script src="/_next/static/chunks/main.js"></script>
            <p>"buildId":"abc123xyz789" outside of the metadata block</p></html>"#;
        assert!(discover(html).is_none());
    }

    #[test]
    fn test_build_id_after_next_data_block_is_ignored() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{}}</script>
            <script>{"buildId":"notTheRealOne123"}</script>"#;
        assert!(discover(html).is_none());
    }

    #[test]
    fn test_strategy_order() {
        let tiers: Vec<_> = strategies().iter().map(|s| s.tier).collect();
        assert_eq!(tiers, vec![Tier::Strict, Tier::Fallback, Tier::Fallback]);
    }
}
