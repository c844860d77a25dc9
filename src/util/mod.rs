//! Utility functions for common operations.
//!
//! - **Filesystem**: atomic replace-on-write for state and feed files
//! - **Text**: XML-safe text cleaning and filename slugs
//! - **URL validation**: scheme and host checks for configured URLs

mod fs;
mod text;
mod url_validator;

pub use fs::write_atomic;
pub use text::{slugify, xml_safe};
pub use url_validator::{validate_url, UrlValidationError};
