//! Bluesky / AT Protocol plumbing for a publish run.
//!
//! - `client` - XRPC transport and response validation
//! - `session` - authentication from account credentials
//! - `facet` - byte-range link annotations for post text
//! - `history` - bounded duplicate search over the account's posts
//!
//! Only the three endpoints the publisher needs are implemented:
//! `com.atproto.server.createSession`, `app.bsky.feed.getAuthorFeed`, and
//! `com.atproto.repo.createRecord`.

mod client;
mod facet;
mod history;
mod session;
mod types;

pub use client::{XrpcClient, XrpcError};
pub use facet::{build_link_facet, LinkFacet};
pub use history::{
    DedupDecision, DedupReason, DuplicateScanner, ScanError, ScanLimits, ScanOutcome,
};
pub use session::{establish, Session, SessionError};
pub use types::{HistoryPage, HistoryPost, PostRecord, RecordRef, POST_COLLECTION};
