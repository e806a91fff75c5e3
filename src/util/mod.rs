//! Utility functions for common operations.
//!
//! - **URL validation**: the service URL credentials are sent to must be HTTPS
//! - **Text processing**: normalising feed titles into single-line post text

mod text;
mod url_validator;

pub use text::clean_title;
pub use url_validator::{validate_service_url, UrlValidationError};
