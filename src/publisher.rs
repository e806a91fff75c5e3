//! The publish-decision pipeline.
//!
//! One run moves through these stages:
//!
//! ```text
//! Init → FeedRead → Authenticated → DedupChecked ─┬─→ Done (already posted)
//!                                                 └─→ FacetBuilt → Submitted → Done
//! ```
//!
//! Any fatal error aborts from whichever stage it occurs in. The only
//! recoverable failure is a history scan error, which is absorbed by the
//! scanner's fail-open policy.
//!
//! Runs are not serialised against each other: two overlapping runs can
//! both pass the duplicate check and both post. Only one run should be
//! scheduled at a time.

use crate::bsky::{
    build_link_facet, establish, DedupReason, DuplicateScanner, PostRecord, RecordRef,
    ScanLimits, ScanOutcome, SessionError, XrpcClient, XrpcError,
};
use crate::config::{ConfigError, Credentials};
use crate::feed::{self, FeedEntry, FeedError};
use chrono::Utc;
use std::path::Path;
use thiserror::Error;

/// Text used when the latest entry has no title.
pub const DEFAULT_FALLBACK_TEXT: &str = "New post";

/// Pipeline stage, for logging and for locating an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    FeedRead,
    Authenticated,
    DedupChecked,
    FacetBuilt,
    Submitted,
    Done,
}

/// Fatal pipeline errors. None of them is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Credentials missing; no network call was made
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Feed file unreadable, malformed, or empty
    #[error("Failed to read feed: {0}")]
    Feed(#[from] FeedError),
    /// The newest entry carries no link to announce
    #[error("Latest feed entry has no link (title: {title:?})")]
    MissingLink { title: String },
    /// Session could not be established
    #[error("Authentication failed: {0}")]
    Auth(#[source] SessionError),
    /// createRecord failed; attempted exactly once
    #[error("Failed to publish post: {0}")]
    Publish(#[source] XrpcError),
}

impl From<SessionError> for PipelineError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Config(e) => PipelineError::Config(e),
            other => PipelineError::Auth(other),
        }
    }
}

impl PipelineError {
    /// The stage the run was in when it aborted.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Feed(_) => Stage::Init,
            PipelineError::MissingLink { .. }
            | PipelineError::Config(_)
            | PipelineError::Auth(_) => Stage::FeedRead,
            PipelineError::Publish(_) => Stage::FacetBuilt,
        }
    }
}

/// How a successful run ended.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The link was found in recent history; nothing was submitted.
    AlreadyPosted { link: String, post_uri: String },
    /// A new post was created.
    Published(RecordRef),
    /// Dry run: the post that would have been submitted.
    DryRun(PostRecord),
}

/// Announces the newest feed entry unless the account already has.
pub struct Publisher {
    client: XrpcClient,
    credentials: Credentials,
    limits: ScanLimits,
    fallback_text: String,
    dry_run: bool,
}

impl Publisher {
    pub fn new(client: XrpcClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            limits: ScanLimits::default(),
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            dry_run: false,
        }
    }

    pub fn with_scan_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }

    /// In dry-run mode the run authenticates and checks history but
    /// returns the composed post instead of submitting it.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs the pipeline once against the feed at `feed_path`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Feed`] - feed unreadable, malformed, or empty
    /// - [`PipelineError::MissingLink`] - newest entry has an empty link
    /// - [`PipelineError::Config`] - a credential is unset (no network calls made)
    /// - [`PipelineError::Auth`] - session creation failed
    /// - [`PipelineError::Publish`] - the single submission attempt failed
    pub async fn publish_if_new(&self, feed_path: &Path) -> Result<PublishOutcome, PipelineError> {
        enter(Stage::Init);

        let entry = feed::read_latest(feed_path)?;
        enter(Stage::FeedRead);

        if entry.link.is_empty() {
            return Err(PipelineError::MissingLink { title: entry.title });
        }

        let session = establish(&self.client, &self.credentials).await?;
        enter(Stage::Authenticated);

        let scanner = DuplicateScanner::new(&self.client, self.limits);
        let outcome = scanner.scan(&session, &entry.link).await;
        let decision = outcome.decision();
        enter(Stage::DedupChecked);

        if decision.is_duplicate {
            let post_uri = match outcome {
                ScanOutcome::Found { post_uri, .. } => post_uri,
                _ => String::new(),
            };
            tracing::info!(link = %entry.link, post = %post_uri, "Already posted, nothing to do");
            enter(Stage::Done);
            return Ok(PublishOutcome::AlreadyPosted {
                link: entry.link,
                post_uri,
            });
        }

        if decision.reason == DedupReason::ScanFailed {
            tracing::warn!(link = %entry.link, "Publishing without a completed duplicate check");
        }

        let record = self.compose(&entry);
        enter(Stage::FacetBuilt);

        if self.dry_run {
            tracing::info!(text = %record.text, "Dry run, not submitting");
            enter(Stage::Done);
            return Ok(PublishOutcome::DryRun(record));
        }

        let created = self
            .client
            .create_record(&session, &record)
            .await
            .map_err(PipelineError::Publish)?;
        enter(Stage::Submitted);

        tracing::info!(uri = %created.uri, link = %entry.link, "Published post");
        enter(Stage::Done);
        Ok(PublishOutcome::Published(created))
    }

    /// Builds the post for `entry`: its title (or the fallback text) with a
    /// link facet over the entry's URL, stamped now.
    pub fn compose(&self, entry: &FeedEntry) -> PostRecord {
        let base = if entry.title.is_empty() {
            self.fallback_text.as_str()
        } else {
            entry.title.as_str()
        };

        let (text, facet) = build_link_facet(base, &entry.link);

        PostRecord {
            text,
            created_at: Utc::now(),
            facets: vec![facet],
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = ?stage, "Pipeline stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsky::LinkFacet;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn offline_publisher() -> Publisher {
        let service = Url::parse("https://bsky.invalid/").unwrap();
        Publisher::new(
            XrpcClient::new(reqwest::Client::new(), service),
            Credentials::default(),
        )
    }

    #[test]
    fn test_compose_uses_title() {
        let entry = FeedEntry {
            title: "Shipping 2.0".to_string(),
            link: "https://blog.test/2-0".to_string(),
        };
        let record = offline_publisher().compose(&entry);

        assert_eq!(record.text, "Shipping 2.0 https://blog.test/2-0");
        assert_eq!(
            record.facets,
            vec![LinkFacet {
                byte_start: 13,
                byte_end: 34,
                uri: "https://blog.test/2-0".to_string(),
            }]
        );
    }

    #[test]
    fn test_compose_empty_title_uses_fallback() {
        let entry = FeedEntry {
            title: String::new(),
            link: "https://blog.test/a".to_string(),
        };
        let record = offline_publisher().compose(&entry);
        assert_eq!(record.text, "New post https://blog.test/a");
    }

    #[test]
    fn test_compose_custom_fallback() {
        let entry = FeedEntry {
            title: String::new(),
            link: "https://blog.test/a".to_string(),
        };
        let record = offline_publisher()
            .with_fallback_text("Fresh:")
            .compose(&entry);
        assert_eq!(record.text, "Fresh: https://blog.test/a");
    }

    #[test]
    fn test_compose_title_containing_link_unchanged() {
        let entry = FeedEntry {
            title: "Read https://blog.test/a today".to_string(),
            link: "https://blog.test/a".to_string(),
        };
        let record = offline_publisher().compose(&entry);
        assert_eq!(record.text, "Read https://blog.test/a today");
        assert_eq!(record.facets[0].byte_start, 5);
    }

    #[test]
    fn test_session_config_error_maps_to_config() {
        let err: PipelineError =
            SessionError::Config(ConfigError::MissingCredential("BLUESKY_IDENTIFIER")).into();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.stage(), Stage::FeedRead);
    }

    #[test]
    fn test_session_rejection_maps_to_auth() {
        let err: PipelineError = SessionError::Transport(XrpcError::MissingField("did")).into();
        assert!(matches!(err, PipelineError::Auth(_)));
    }

    #[test]
    fn test_abort_stages() {
        assert_eq!(PipelineError::Feed(FeedError::NoEntries).stage(), Stage::Init);
        assert_eq!(
            PipelineError::MissingLink {
                title: "x".to_string()
            }
            .stage(),
            Stage::FeedRead
        );
        assert_eq!(
            PipelineError::Publish(XrpcError::MissingField("uri")).stage(),
            Stage::FacetBuilt
        );
    }
}
