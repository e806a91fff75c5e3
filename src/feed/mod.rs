//! Feed reading: turns the generated RSS/Atom document into the one entry
//! this run will announce.
//!
//! Parsing is delegated to the `feed-rs` crate, so RSS 2.0, Atom, and JSON
//! Feed documents are all accepted. Only the first entry is ever looked at;
//! the feed writer is trusted to order entries newest-first.

mod parser;

pub use parser::{parse_latest, read_latest, FeedEntry, FeedError};
