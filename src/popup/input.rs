use crate::model::ScanMode;
use thiserror::Error;

const ACCEPTED_SCHEMES: [&str; 2] = ["http://", "https://"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a URL to scan")]
    Empty,

    #[error("URL must start with http:// or https://")]
    UnsupportedScheme,
}

/// Trims the input and checks it names an http(s) URL.
pub fn validate_url(input: &str) -> Result<&str, ValidationError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !ACCEPTED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ValidationError::UnsupportedScheme);
    }
    Ok(url)
}

/// Enter runs a quick scan, Ctrl+Enter a deep one.
pub fn mode_for_enter(ctrl: bool) -> ScanMode {
    if ctrl {
        ScanMode::Enhanced
    } else {
        ScanMode::Quick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert_eq!(validate_url("https://example.com"), Ok("https://example.com"));
        assert_eq!(validate_url("  http://a.test/x  "), Ok("http://a.test/x"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(validate_url(""), Err(ValidationError::Empty));
        assert_eq!(validate_url("   \t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_missing_scheme() {
        assert_eq!(
            validate_url("example.com"),
            Err(ValidationError::UnsupportedScheme)
        );
        assert_eq!(
            validate_url("ftp://example.com"),
            Err(ValidationError::UnsupportedScheme)
        );
        assert_eq!(
            validate_url("HTTPS://example.com"),
            Err(ValidationError::UnsupportedScheme)
        );
    }

    #[test]
    fn test_enter_key_modes() {
        assert_eq!(mode_for_enter(false), ScanMode::Quick);
        assert_eq!(mode_for_enter(true), ScanMode::Enhanced);
    }
}
