use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a configured channel or image URL.
///
/// Only `http` and `https` URLs with a host are accepted. Private and
/// loopback addresses are allowed: channels commonly point at LAN mirrors
/// in self-hosted setups.
///
/// # Examples
///
/// ```
/// use channelcast::util::validate_url;
///
/// let url = validate_url("https://tv.nrk.no/serie/dagsrevyen").unwrap();
/// assert_eq!(url.host_str(), Some("tv.nrk.no"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://www.youtube.com/@channel/videos").is_ok());
        assert!(validate_url("http://192.168.1.10:8080/playlist").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
