//! Service layer for the feed generator.
//!
//! This module contains the upstream-facing logic for:
//! - Build identifier discovery (`build_id`)
//! - Source record fetching (`SourceAdapter`)
//! - Cross-reference enrichment (`Enricher`)

pub mod build_id;
mod enrich;
mod sources;

pub use enrich::{EnrichStats, Enricher, TraktEnricher, enrich_all};
pub use sources::{
    HtmlListingAdapter, NextDataAdapter, SourceAdapter, TmdbDiscoverAdapter, adapter_for,
    extract_records,
};
