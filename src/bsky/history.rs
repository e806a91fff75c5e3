//! Duplicate detection against the account's own post history.
//!
//! There is no local record of what has been announced. Instead, each run
//! pages through the account's recent posts looking for the link it is
//! about to publish.
//!
//! # Known limitation
//!
//! The search is bounded: it stops after [`ScanLimits::ceiling`] posts
//! (100 by default). A link announced further back than that is not seen,
//! and will be announced again.
//!
//! # Failure policy
//!
//! The scan fails open. Any error fetching or decoding a page ends the
//! scan with [`ScanOutcome::ScanFailed`], whose [`DedupDecision`] is "not a
//! duplicate": a transient search failure risks a repeated post rather than
//! blocking a new one.

use super::client::{XrpcClient, XrpcError};
use super::session::Session;
use thiserror::Error;

/// Page size and ceiling for a history scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    page_size: u32,
    ceiling: usize,
}

impl ScanLimits {
    /// Largest `limit` getAuthorFeed accepts.
    pub const MAX_PAGE_SIZE: u32 = 100;
    pub const DEFAULT_CEILING: u32 = 100;

    /// Page size is clamped to `1..=100`, ceiling to at least 1.
    pub fn new(page_size: u32, ceiling: u32) -> Self {
        Self {
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
            ceiling: ceiling.max(1) as usize,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self::new(Self::MAX_PAGE_SIZE, Self::DEFAULT_CEILING)
    }
}

/// A page fetch failed partway through a scan.
#[derive(Debug, Error)]
#[error("History scan failed on page {page} after {inspected} posts: {source}")]
pub struct ScanError {
    /// 1-based page number that failed
    pub page: usize,
    /// Posts inspected before the failure
    pub inspected: usize,
    #[source]
    pub source: XrpcError,
}

/// What a history scan found.
#[derive(Debug)]
pub enum ScanOutcome {
    /// A post references the URL.
    Found { post_uri: String, inspected: usize },
    /// History exhausted or ceiling reached without a match.
    NotFound { inspected: usize },
    /// A page could not be fetched or decoded.
    ScanFailed(ScanError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupReason {
    Found,
    NotFound,
    ScanFailed,
}

/// Whether to skip publication, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    pub reason: DedupReason,
}

impl ScanOutcome {
    /// Collapses the outcome into a publish decision. `ScanFailed` is
    /// treated as "not a duplicate".
    pub fn decision(&self) -> DedupDecision {
        match self {
            ScanOutcome::Found { .. } => DedupDecision {
                is_duplicate: true,
                reason: DedupReason::Found,
            },
            ScanOutcome::NotFound { .. } => DedupDecision {
                is_duplicate: false,
                reason: DedupReason::NotFound,
            },
            ScanOutcome::ScanFailed(_) => DedupDecision {
                is_duplicate: false,
                reason: DedupReason::ScanFailed,
            },
        }
    }
}

/// Bounded, paginated search of an account's posts for a URL.
pub struct DuplicateScanner<'a> {
    client: &'a XrpcClient,
    limits: ScanLimits,
}

impl<'a> DuplicateScanner<'a> {
    pub fn new(client: &'a XrpcClient, limits: ScanLimits) -> Self {
        Self { client, limits }
    }

    /// Searches the session account's history, newest first, for a post
    /// whose text contains `target_url` or whose facets link to it exactly.
    ///
    /// Pages are fetched one at a time. The scan stops at the first match,
    /// when the server returns no cursor, when a page comes back empty, or
    /// once `ceiling` posts have been inspected.
    pub async fn scan(&self, session: &Session, target_url: &str) -> ScanOutcome {
        if target_url.is_empty() {
            // Every text contains the empty string
            tracing::debug!("Empty target URL, skipping history scan");
            return ScanOutcome::NotFound { inspected: 0 };
        }

        let ceiling = self.limits.ceiling();
        let mut cursor: Option<String> = None;
        let mut inspected = 0usize;
        let mut page_number = 0usize;

        loop {
            page_number += 1;

            let page = match self
                .client
                .get_author_feed(session, self.limits.page_size(), cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(source) => {
                    let error = ScanError {
                        page: page_number,
                        inspected,
                        source,
                    };
                    tracing::warn!(
                        error = %error,
                        url = %target_url,
                        "Duplicate scan failed, assuming not yet published"
                    );
                    return ScanOutcome::ScanFailed(error);
                }
            };

            tracing::debug!(
                page = page_number,
                posts = page.posts.len(),
                has_cursor = page.cursor.is_some(),
                "Fetched history page"
            );

            if page.posts.is_empty() {
                return ScanOutcome::NotFound { inspected };
            }

            for post in page.posts {
                if inspected >= ceiling {
                    break;
                }
                inspected += 1;

                if post.references(target_url) {
                    tracing::debug!(post = %post.uri, inspected, "Found earlier post with link");
                    return ScanOutcome::Found {
                        post_uri: post.uri,
                        inspected,
                    };
                }
            }

            if inspected >= ceiling {
                tracing::debug!(ceiling, "History scan ceiling reached");
                return ScanOutcome::NotFound { inspected };
            }

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return ScanOutcome::NotFound { inspected },
            }
        }
    }

    /// `true` if `target_url` was found within the scanned history.
    ///
    /// Never fails: scan errors count as "not published".
    pub async fn has_been_published(&self, session: &Session, target_url: &str) -> bool {
        self.scan(session, target_url).await.decision().is_duplicate
    }
}
