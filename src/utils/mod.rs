//! Utility functions and helpers.

pub mod http;

use serde_json::Value;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Walk a key path into a JSON value.
pub fn value_at_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key.as_ref()))
}

/// Substitute `{key}` in a template.
pub fn fill_template(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/movie/42-example"),
            "https://example.com/movie/42-example"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_value_at_path() {
        let data = json!({ "pageProps": { "filmsOut": { "items": [1, 2] } } });
        let items = value_at_path(&data, &["pageProps", "filmsOut", "items"]).unwrap();
        assert_eq!(items.as_array().map(Vec::len), Some(2));
        assert!(value_at_path(&data, &["pageProps", "missing"]).is_none());
    }

    #[test]
    fn test_fill_template() {
        assert_eq!(
            fill_template("https://www.kinobox.cz/film/{id}", "id", "42"),
            "https://www.kinobox.cz/film/42"
        );
    }
}
