//! Pipeline stages for feed generation.
//!
//! - `normalize`: raw source records to feed items
//! - `assemble`: feed items to an RSS document
//! - `serialize`: RSS document to XML text
//! - `run`: end-to-end feed runs

pub mod assemble;
pub mod normalize;
pub mod run;
pub mod serialize;

pub use assemble::assemble;
pub use normalize::{Normalized, SkipReason, normalize, normalize_all};
pub use run::{Credentials, FeedReport, render, resolve_credentials, run_all, run_feed, select_feeds};
pub use serialize::serialize;
