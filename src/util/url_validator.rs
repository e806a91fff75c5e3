use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the PDS service URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host would send the app password in clear text.
    #[error("Insecure service URL: HTTPS required (except loopback for testing)")]
    InsecureScheme,
    /// URLs with query strings or fragments cannot serve as an XRPC base.
    #[error("Service URL must not carry a query or fragment")]
    UnexpectedQuery,
}

/// Validates the base URL of the Bluesky/PDS service that credentials are sent to.
///
/// Rejects:
/// - Non-HTTP(S) schemes (e.g., `file://`, `ftp://`)
/// - Plain `http://` unless the host is loopback (`localhost`, `127.0.0.1`, `::1`)
/// - Query strings and fragments
///
/// The returned [`Url`] always has a trailing slash on its path so that
/// `Url::join("xrpc/...")` appends rather than replaces the last segment.
///
/// # Examples
///
/// ```
/// use feedcast::util::validate_service_url;
///
/// let url = validate_service_url("https://bsky.social").unwrap();
/// assert_eq!(url.as_str(), "https://bsky.social/");
///
/// assert!(validate_service_url("http://bsky.social").is_err());
/// assert!(validate_service_url("http://127.0.0.1:2583").is_ok());
/// ```
pub fn validate_service_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                return Err(UrlValidationError::InsecureScheme);
            }
            tracing::warn!(service = %url, "Using non-HTTPS service URL (loopback only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::UnexpectedQuery);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };

    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
