// crates/db/src/queries/mod.rs
// Query primitives for the sessionlens store, split by concern.

pub(crate) mod row_types;

mod fts;
mod resolve;
mod sessions;
mod stats;

pub(crate) use resolve::encoded_folder;

pub use fts::{sanitize_match_query, SearchHit, MATCH_ALL};
pub use resolve::ResolveOutcome;
pub use sessions::ListOptions;
pub use stats::{IndexSummary, ToolStat};
