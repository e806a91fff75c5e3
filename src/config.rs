//! Configuration for a publish run.
//!
//! Two sources feed a run:
//!
//! - An optional TOML file (`~/.config/feedcast/config.toml` by default).
//!   A missing or empty file yields `Config::default()`.
//! - Two environment variables holding the account credentials. They are
//!   read once by the binary via [`Credentials::from_env`] and passed down
//!   explicitly; nothing below `main` touches the environment.
use crate::bsky::ScanLimits;
use crate::publisher::DEFAULT_FALLBACK_TEXT;
use crate::util::{validate_service_url, UrlValidationError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Environment variable holding the account handle, DID, or email.
pub const IDENTIFIER_ENV: &str = "BLUESKY_IDENTIFIER";
/// Environment variable holding the account app password.
pub const PASSWORD_ENV: &str = "BLUESKY_APP_PASSWORD";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A required credential is unset or blank. Carries the variable name.
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid service URL: {0}")]
    InvalidServiceUrl(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level run configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the PDS / entryway that hosts the account.
    pub service: String,

    /// Feed file to announce from. `--feed` on the command line wins.
    pub feed_path: Option<PathBuf>,

    /// History items requested per page (clamped to 1..=100).
    pub scan_page_size: u32,

    /// Maximum number of historical posts inspected before giving up.
    pub scan_ceiling: u32,

    /// Post text used when the latest entry has no title.
    pub fallback_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            feed_path: None,
            scan_page_size: ScanLimits::MAX_PAGE_SIZE,
            scan_ceiling: ScanLimits::DEFAULT_CEILING,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "service",
        "feed_path",
        "scan_page_size",
        "scan_ceiling",
        "fallback_text",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), service = %config.service, "Loaded configuration");
        Ok(config)
    }

    /// The validated service base URL.
    pub fn service_url(&self) -> Result<Url, ConfigError> {
        Ok(validate_service_url(&self.service)?)
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits::new(self.scan_page_size, self.scan_ceiling)
    }

    /// Post text used for untitled entries, never empty.
    pub fn fallback_text(&self) -> &str {
        let trimmed = self.fallback_text.trim();
        if trimmed.is_empty() {
            DEFAULT_FALLBACK_TEXT
        } else {
            trimmed
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Account credentials, both mandatory.
///
/// Absence is not detected here but at session establishment, before any
/// network call, so that a run always reports the missing variable by name.
///
/// Custom Debug impl masks the password.
#[derive(Default)]
pub struct Credentials {
    identifier: Option<String>,
    password: Option<SecretString>,
}

impl Credentials {
    pub fn new(identifier: Option<String>, password: Option<SecretString>) -> Self {
        Self {
            identifier,
            password,
        }
    }

    /// Reads [`IDENTIFIER_ENV`] and [`PASSWORD_ENV`] from the process environment.
    pub fn from_env() -> Self {
        Self {
            identifier: std::env::var(IDENTIFIER_ENV).ok(),
            password: std::env::var(PASSWORD_ENV).ok().map(SecretString::from),
        }
    }

    /// Returns both values, or the name of the first one missing.
    ///
    /// Blank (whitespace-only) values count as missing.
    pub fn require(&self) -> Result<(&str, &SecretString), ConfigError> {
        let identifier = self
            .identifier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingCredential(IDENTIFIER_ENV))?;

        let password = self
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().trim().is_empty())
            .ok_or(ConfigError::MissingCredential(PASSWORD_ENV))?;

        Ok((identifier, password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedcast_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service, "https://bsky.social");
        assert!(config.feed_path.is_none());
        assert_eq!(config.scan_page_size, 100);
        assert_eq!(config.scan_ceiling, 100);
        assert_eq!(config.fallback_text(), "New post");
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedcast_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.service, "https://bsky.social");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = temp_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.scan_ceiling, 100);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
service = "https://pds.example.com"
feed_path = "public/rss.xml"
scan_page_size = 50
scan_ceiling = 250
fallback_text = "Fresh on the blog"
"#;
        let (dir, path) = temp_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.service, "https://pds.example.com");
        assert_eq!(config.feed_path, Some(PathBuf::from("public/rss.xml")));
        assert_eq!(config.scan_page_size, 50);
        assert_eq!(config.scan_ceiling, 250);
        assert_eq!(config.fallback_text(), "Fresh on the blog");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = temp_config("partial", "scan_ceiling = 20\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.scan_ceiling, 20);
        assert_eq!(config.scan_page_size, 100);
        assert_eq!(config.service, "https://bsky.social");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = temp_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = temp_config("unknown", "service = \"https://bsky.social\"\nbogus = 1\n");
        assert!(Config::load(&path).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = temp_config("wrongtype", "scan_ceiling = \"lots\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = temp_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_blank_fallback_text_uses_default() {
        let config = Config {
            fallback_text: "   ".to_string(),
            ..Config::default()
        };
        assert_eq!(config.fallback_text(), "New post");
    }

    #[test]
    fn test_insecure_service_url_rejected() {
        let config = Config {
            service: "http://bsky.social".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.service_url(),
            Err(ConfigError::InvalidServiceUrl(_))
        ));
    }

    #[test]
    fn test_require_both_credentials() {
        let creds = Credentials::new(
            Some("alice.test".to_string()),
            Some(SecretString::from("app-pass".to_string())),
        );
        let (identifier, password) = creds.require().unwrap();
        assert_eq!(identifier, "alice.test");
        assert_eq!(password.expose_secret(), "app-pass");
    }

    #[test]
    fn test_require_missing_identifier() {
        let creds = Credentials::new(None, Some(SecretString::from("app-pass".to_string())));
        assert!(matches!(
            creds.require(),
            Err(ConfigError::MissingCredential(IDENTIFIER_ENV))
        ));
    }

    #[test]
    fn test_require_missing_password() {
        let creds = Credentials::new(Some("alice.test".to_string()), None);
        assert!(matches!(
            creds.require(),
            Err(ConfigError::MissingCredential(PASSWORD_ENV))
        ));
    }

    #[test]
    fn test_require_blank_counts_as_missing() {
        let creds = Credentials::new(
            Some("  ".to_string()),
            Some(SecretString::from("x".to_string())),
        );
        assert!(creds.require().is_err());

        let creds = Credentials::new(
            Some("alice.test".to_string()),
            Some(SecretString::from(String::new())),
        );
        assert!(matches!(
            creds.require(),
            Err(ConfigError::MissingCredential(PASSWORD_ENV))
        ));
    }

    #[test]
    fn test_debug_masks_password() {
        let creds = Credentials::new(
            Some("alice.test".to_string()),
            Some(SecretString::from("super-secret-pass".to_string())),
        );
        let debug_output = format!("{:?}", creds);
        assert!(!debug_output.contains("super-secret-pass"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("alice.test"));
    }
}
