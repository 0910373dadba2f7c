//! Output generation.
//!
//! # Submodules
//!
//! - [`snapshot`]: publishes the ranked [`Snapshot`](crate::models::Snapshot)
//!   as a JSON file, replaced atomically on every run
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── items.json   # { "generated_at": ..., "items": [...], "sources": [...] }
//! ```

pub mod snapshot;
