// src/models/mod.rs

//! Domain models for the feed generator.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod document;
mod item;

// Re-export all public types
pub use config::{
    ChangePolicy, ChannelConfig, Config, EnrichmentConfig, FeedConfig, FieldSet, HtmlListingSource,
    HttpConfig, Labels, ListingSelectors, NextDataSource, RecordSchema, SourceConfig,
    TmdbDiscoverSource,
};
pub use document::{Channel, Content, FeedDocument, Guid, RssItem};
pub use item::FeedItem;

/// A raw record as returned by an upstream, before normalization.
pub type SourceRecord = serde_json::Value;
