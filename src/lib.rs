//! feedcast - announce the newest feed entry on Bluesky, exactly once.
//!
//! There is no local dedup ledger. Each run reads the feed, takes its newest
//! entry, and checks the account's own recent posts for that entry's link
//! before publishing.
//!
//! - [`feed`] - reading the feed document and picking the latest entry
//! - [`bsky`] - XRPC client, sessions, link facets, duplicate scanning
//! - [`publisher`] - the pipeline and its failure policy
//! - [`config`] - TOML configuration and environment credentials

pub mod bsky;
pub mod config;
pub mod feed;
pub mod publisher;
pub mod util;

pub use config::{Config, ConfigError, Credentials};
pub use publisher::{PipelineError, PublishOutcome, Publisher, Stage};
