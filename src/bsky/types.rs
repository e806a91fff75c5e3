//! Wire types for the XRPC endpoints and the validated types built from them.
//!
//! Response structs mirror the lexicon loosely: every field is optional so
//! that decoding never fails on a missing key. Each response type has a
//! `validate` method that is the single place where required fields are
//! enforced and where the rest of the crate's types are produced.

use super::client::XrpcError;
use super::facet::LinkFacet;
use super::session::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};

/// Collection NSID for Bluesky posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";
const LINK_FEATURE_TYPE: &str = "app.bsky.richtext.facet#link";

// ============================================================================
// Validated types
// ============================================================================

/// One previously published post, as far as duplicate detection cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPost {
    /// `at://` URI of the post (empty if the server omitted it)
    pub uri: String,
    /// Rendered post text
    pub text: String,
    /// URIs referenced by the post's facets
    pub link_uris: Vec<String>,
}

impl HistoryPost {
    /// True if `url` appears verbatim in the text or equals a facet URI.
    pub fn references(&self, url: &str) -> bool {
        self.text.contains(url) || self.link_uris.iter().any(|u| u == url)
    }
}

/// One page of the account's post history.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Posts in server order (newest first)
    pub posts: Vec<HistoryPost>,
    /// Continuation cursor; `None` when this is the last page
    pub cursor: Option<String>,
}

/// An outgoing post.
///
/// Serializes as an `app.bsky.feed.post` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub facets: Vec<LinkFacet>,
}

/// Reference to a record the server created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub uri: String,
    pub cid: Option<String>,
}

// ============================================================================
// com.atproto.server.createSession
// ============================================================================

#[derive(Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionResponse {
    #[serde(default)]
    access_jwt: Option<String>,
    #[serde(default)]
    did: Option<String>,
    #[serde(default)]
    handle: Option<String>,
}

impl CreateSessionResponse {
    pub(crate) fn validate(self) -> Result<Session, XrpcError> {
        let access_jwt = non_empty(self.access_jwt).ok_or(XrpcError::MissingField("accessJwt"))?;
        let did = non_empty(self.did).ok_or(XrpcError::MissingField("did"))?;
        let handle = self.handle.unwrap_or_default();

        Ok(Session::new(did, handle, SecretString::from(access_jwt)))
    }
}

// ============================================================================
// app.bsky.feed.getAuthorFeed
// ============================================================================

#[derive(Deserialize)]
pub(crate) struct AuthorFeedResponse {
    #[serde(default)]
    feed: Option<Vec<FeedViewPost>>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct FeedViewPost {
    #[serde(default)]
    post: Option<PostView>,
}

#[derive(Deserialize)]
struct PostView {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    record: Option<PostRecordView>,
}

#[derive(Deserialize)]
struct PostRecordView {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    facets: Option<Vec<FacetView>>,
}

#[derive(Deserialize)]
struct FacetView {
    #[serde(default)]
    features: Option<Vec<FacetFeatureView>>,
}

#[derive(Deserialize)]
struct FacetFeatureView {
    #[serde(default)]
    uri: Option<String>,
}

impl AuthorFeedResponse {
    pub(crate) fn validate(self) -> Result<HistoryPage, XrpcError> {
        let feed = self.feed.ok_or(XrpcError::MissingField("feed"))?;

        let posts = feed
            .into_iter()
            .map(|item| {
                let post = item.post.ok_or(XrpcError::MissingField("feed[].post"))?;
                let record = post.record.unwrap_or(PostRecordView {
                    text: None,
                    facets: None,
                });

                let link_uris = record
                    .facets
                    .unwrap_or_default()
                    .into_iter()
                    .flat_map(|f| f.features.unwrap_or_default())
                    .filter_map(|feature| feature.uri)
                    .collect();

                Ok(HistoryPost {
                    uri: post.uri.unwrap_or_default(),
                    text: record.text.unwrap_or_default(),
                    link_uris,
                })
            })
            .collect::<Result<Vec<_>, XrpcError>>()?;

        Ok(HistoryPage {
            posts,
            cursor: non_empty(self.cursor),
        })
    }
}

// ============================================================================
// com.atproto.repo.createRecord
// ============================================================================

#[derive(Serialize)]
pub(crate) struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'static str,
    pub record: &'a PostRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostRecordWire<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    text: &'a str,
    created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    facets: Vec<FacetWire<'a>>,
}

#[derive(Serialize)]
struct FacetWire<'a> {
    index: ByteSliceWire,
    features: [LinkFeatureWire<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ByteSliceWire {
    byte_start: usize,
    byte_end: usize,
}

#[derive(Serialize)]
struct LinkFeatureWire<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    uri: &'a str,
}

impl Serialize for PostRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PostRecordWire {
            kind: POST_COLLECTION,
            text: &self.text,
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            facets: self
                .facets
                .iter()
                .map(|f| FacetWire {
                    index: ByteSliceWire {
                        byte_start: f.byte_start,
                        byte_end: f.byte_end,
                    },
                    features: [LinkFeatureWire {
                        kind: LINK_FEATURE_TYPE,
                        uri: &f.uri,
                    }],
                })
                .collect(),
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize)]
pub(crate) struct CreateRecordResponse {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    cid: Option<String>,
}

impl CreateRecordResponse {
    pub(crate) fn validate(self) -> Result<RecordRef, XrpcError> {
        Ok(RecordRef {
            uri: non_empty(self.uri).ok_or(XrpcError::MissingField("uri"))?,
            cid: non_empty(self.cid),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Deserialize, Default)]
pub(crate) struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_history_post_references_text() {
        let post = HistoryPost {
            uri: String::new(),
            text: "New: https://blog.test/a".to_string(),
            link_uris: vec![],
        };
        assert!(post.references("https://blog.test/a"));
        assert!(!post.references("https://blog.test/b"));
    }

    #[test]
    fn test_history_post_references_facet_exactly() {
        let post = HistoryPost {
            uri: String::new(),
            text: "New post blog.test/a...".to_string(),
            link_uris: vec!["https://blog.test/a".to_string()],
        };
        assert!(post.references("https://blog.test/a"));
        // Facet URIs compare exactly, not by prefix
        assert!(!post.references("https://blog.test/"));
    }

    #[test]
    fn test_author_feed_tolerates_sparse_posts() {
        let response: AuthorFeedResponse = serde_json::from_value(json!({
            "feed": [
                {"post": {"uri": "at://a/1"}},
                {"post": {"record": {"text": "hi", "facets": [{"features": [{"did": "did:plc:bob"}]}]}}},
                {"post": {"record": {"text": "x", "facets": [{}]}}}
            ],
            "cursor": ""
        }))
        .unwrap();

        let page = response.validate().unwrap();
        assert_eq!(page.posts.len(), 3);
        assert_eq!(page.posts[0].text, "");
        assert_eq!(page.posts[1].text, "hi");
        assert!(page.posts[1].link_uris.is_empty());
        assert!(page.cursor.is_none(), "empty cursor means no more pages");
    }

    #[test]
    fn test_author_feed_item_without_post_is_malformed() {
        let response: AuthorFeedResponse =
            serde_json::from_value(json!({"feed": [{"reason": {}}]})).unwrap();
        assert!(matches!(
            response.validate(),
            Err(XrpcError::MissingField("feed[].post"))
        ));
    }

    #[test]
    fn test_post_record_without_facets_omits_key() {
        let record = PostRecord {
            text: "plain".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            facets: vec![],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "$type": "app.bsky.feed.post",
                "text": "plain",
                "createdAt": "2024-01-02T03:04:05.000Z"
            })
        );
    }

    #[test]
    fn test_create_record_response_requires_uri() {
        let response: CreateRecordResponse = serde_json::from_value(json!({"cid": "x"})).unwrap();
        assert!(matches!(
            response.validate(),
            Err(XrpcError::MissingField("uri"))
        ));
    }
}
