//! Utility functions shared by the config layer and the HTTP adapters.
//!
//! - **URL validation**: scheme and host checks for feed and webhook endpoints

mod url_validator;

pub use url_validator::{validate_endpoint, UrlValidationError};
