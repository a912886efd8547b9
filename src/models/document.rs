// src/models/document.rs

//! RSS document value handed from the assembler to the serializer.

/// Text content of an element.
///
/// `Plain` is escaped on output; `Markup` is written verbatim inside CDATA
/// so feed readers render it as HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Plain(String),
    Markup(String),
}

impl Content {
    /// Borrow the raw text regardless of kind.
    pub fn as_str(&self) -> &str {
        match self {
            Content::Plain(s) | Content::Markup(s) => s,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Content::Markup(_))
    }
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    /// Self-referencing feed URL (`atom:link rel="self"`)
    pub self_link: String,
    /// RFC 822 build timestamp
    pub last_build_date: String,
}

/// Globally unique identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guid {
    pub value: String,
    pub is_permalink: bool,
}

/// One `<item>` of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssItem {
    pub title: Content,
    pub link: String,
    pub guid: Option<Guid>,
    pub description: Option<Content>,
    /// RFC 822 publication date
    pub pub_date: Option<String>,
}

/// A complete RSS 2.0 document: one channel with its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub channel: Channel,
    pub items: Vec<RssItem>,
}

impl FeedDocument {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
