use super::session::Session;
use super::types::{
    AuthorFeedResponse, CreateRecordRequest, CreateRecordResponse, CreateSessionRequest,
    CreateSessionResponse, HistoryPage, PostRecord, RecordRef, XrpcErrorBody, POST_COLLECTION,
};
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// XRPC responses larger than this are rejected.
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const GET_AUTHOR_FEED: &str = "app.bsky.feed.getAuthorFeed";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Errors from a single XRPC round-trip.
///
/// The client never retries; classification into fatal or recoverable is
/// left to the caller (session, scanner, or publisher).
#[derive(Debug, Error)]
pub enum XrpcError {
    /// The endpoint URL could not be built from the service base
    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response, with the XRPC error body when one was sent
    #[error(
        "XRPC error: status {status} ({}): {}",
        .error.as_deref().unwrap_or("unknown"),
        .message.as_deref().unwrap_or("no message")
    )]
    Status {
        status: u16,
        error: Option<String>,
        message: Option<String>,
    },
    /// Response body exceeded the 5MB size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response body is not the expected JSON shape
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Response decoded but a required field is absent or empty
    #[error("Malformed response: missing {0}")]
    MissingField(&'static str),
}

/// Minimal client for the three XRPC endpoints a publish run needs.
///
/// Every response is decoded into optional-typed wire structs and validated
/// in one step before anything else sees it; callers only handle validated
/// types ([`Session`], [`HistoryPage`], [`RecordRef`]).
#[derive(Debug, Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    service: Url,
}

impl XrpcClient {
    /// `service` should come from [`crate::util::validate_service_url`] so
    /// that it is HTTPS and ends with a slash.
    pub fn new(http: reqwest::Client, service: Url) -> Self {
        Self { http, service }
    }

    pub fn service(&self) -> &Url {
        &self.service
    }

    fn endpoint(&self, nsid: &str) -> Result<Url, XrpcError> {
        Ok(self.service.join(&format!("xrpc/{nsid}"))?)
    }

    /// `com.atproto.server.createSession`
    pub async fn create_session(
        &self,
        identifier: &str,
        password: &SecretString,
    ) -> Result<Session, XrpcError> {
        let url = self.endpoint(CREATE_SESSION)?;
        let body = CreateSessionRequest {
            identifier,
            password: password.expose_secret(),
        };

        let response: CreateSessionResponse = self.send(self.http.post(url).json(&body)).await?;
        response.validate()
    }

    /// `app.bsky.feed.getAuthorFeed` for the session's own account,
    /// newest-first.
    pub async fn get_author_feed(
        &self,
        session: &Session,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, XrpcError> {
        let mut url = self.endpoint(GET_AUTHOR_FEED)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("actor", session.did());
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
                query.append_pair("cursor", cursor);
            }
        }

        let response: AuthorFeedResponse = self
            .send(self.http.get(url).bearer_auth(session.access_jwt().expose_secret()))
            .await?;
        response.validate()
    }

    /// `com.atproto.repo.createRecord` in the `app.bsky.feed.post` collection.
    pub async fn create_record(
        &self,
        session: &Session,
        record: &PostRecord,
    ) -> Result<RecordRef, XrpcError> {
        let url = self.endpoint(CREATE_RECORD)?;
        let body = CreateRecordRequest {
            repo: session.did(),
            collection: POST_COLLECTION,
            record,
        };

        let response: CreateRecordResponse = self
            .send(
                self.http
                    .post(url)
                    .bearer_auth(session.access_jwt().expose_secret())
                    .json(&body),
            )
            .await?;
        response.validate()
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, XrpcError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;

        if !status.is_success() {
            // XRPC errors carry {"error": ..., "message": ...}; tolerate bodies that don't
            let body: XrpcErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            return Err(XrpcError::Status {
                status: status.as_u16(),
                error: body.error,
                message: body.message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, XrpcError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(XrpcError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(XrpcError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
