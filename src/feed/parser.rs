use crate::util::clean_title;
use feed_rs::parser;
use std::path::Path;
use thiserror::Error;

/// Feeds larger than this are rejected before being read into memory.
const MAX_FEED_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Errors raised while reading or parsing the feed document.
///
/// Every variant is fatal for a run: without a latest entry there is
/// nothing to announce.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed file could not be read
    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
    /// The feed file exceeds the 10MB size limit
    #[error("Feed file too large: {0} bytes (max {max} bytes)", max = MAX_FEED_SIZE)]
    TooLarge(u64),
    /// The document is not valid RSS, Atom, or JSON Feed
    #[error("Malformed feed: {0}")]
    Malformed(#[from] feed_rs::parser::ParseFeedError),
    /// The document parsed but carries no entries
    #[error("Feed contains no entries")]
    NoEntries,
}

/// The newest item of a feed: what gets announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Cleaned, single-line title. Empty if the entry has none.
    pub title: String,
    /// Permalink of the entry. Empty if the entry has none.
    pub link: String,
}

/// Parses a feed document and returns its first entry.
///
/// Feed writers emit newest-first, so the first entry is the latest.
/// Only that entry is returned; later entries are ignored.
///
/// An entry without a link parses successfully with `link` empty. Deciding
/// whether that is acceptable is the caller's business.
///
/// # Errors
///
/// - [`FeedError::Malformed`] if the bytes are not a recognised feed format
/// - [`FeedError::NoEntries`] if the feed has zero entries
pub fn parse_latest(document: &[u8]) -> Result<FeedEntry, FeedError> {
    let feed = parser::parse(document)?;

    let entry = feed.entries.into_iter().next().ok_or(FeedError::NoEntries)?;

    // Prefer the entry's alternate (HTML) link; Atom feeds may list
    // self/edit/enclosure links ahead of it.
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();

    let title = entry
        .title
        .map(|t| clean_title(&t.content).into_owned())
        .unwrap_or_default();

    Ok(FeedEntry { title, link })
}

/// Reads a feed file from disk and returns its latest entry.
///
/// The read is synchronous: it happens once, before any network traffic.
pub fn read_latest(path: &Path) -> Result<FeedEntry, FeedError> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_FEED_SIZE {
        return Err(FeedError::TooLarge(size));
    }

    let bytes = std::fs::read(path)?;
    let entry = parse_latest(&bytes)?;

    tracing::debug!(
        path = %path.display(),
        title = %entry.title,
        link = %entry.link,
        "Read latest feed entry"
    );

    Ok(entry)
}
