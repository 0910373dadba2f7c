//! # Topic News
//!
//! Collects news about a single topic from a fixed registry of heterogeneous
//! sources, ranks it by keyword relevance and publishes a small JSON snapshot
//! for a separate presentation layer.
//!
//! ## Architecture
//!
//! One run is a straight pipeline:
//! 1. **Registry**: load and validate the sources ([`registry`])
//! 2. **Fetching**: read every source concurrently, each under its own timeout
//!    ([`fetch`]); feeds go through [`fetch::syndication`], plain pages through
//!    [`fetch::scrape`]
//! 3. **Normalization**: clean text, parse timestamps, fingerprint ([`normalize`])
//! 4. **Scoring**: keyword and source-trust relevance ([`score`])
//! 5. **Ranking**: sort, deduplicate by title, truncate ([`rank`])
//! 6. **Output**: replace the snapshot file atomically ([`outputs::snapshot`])
//!
//! [`pipeline::run`] wires steps 2 to 5 together.

pub mod cli;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod rank;
pub mod registry;
pub mod score;
pub mod utils;
