use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Article links must not point the summarizer at internal addresses.
    #[error("Internal address not allowed: {0}")]
    InternalAddress(String),
}

/// Validates an article link before it is forwarded to the summarize/tldr
/// endpoints.
///
/// Rejects non-HTTP(S) schemes, host-less URLs, `localhost`, and loopback,
/// private, link-local or unspecified IP literals.
///
/// ```
/// use tldr_sync::util::validate_article_url;
///
/// assert!(validate_article_url("https://example.com/post").is_ok());
/// assert!(validate_article_url("http://10.0.0.1/post").is_err());
/// assert!(validate_article_url("mailto:someone@example.com").is_err());
/// ```
pub fn validate_article_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::InternalAddress(host.to_owned()));
    }

    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(UrlValidationError::InternalAddress(ip.to_string()));
        }
    }

    Ok(url)
}

/// Parses the backend base URL. Unlike article links, localhost is fine here
/// (the reader usually talks to a local server), but the scheme must be HTTP(S).
pub fn parse_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    // Url::join drops the last path segment unless the base ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // fc00::/7 unique local, fe80::/10 link local
            (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_article_urls_accepted() {
        assert!(validate_article_url("https://example.com/2024/08/post").is_ok());
        assert!(validate_article_url("  http://news.example.org/a?b=c  ").is_ok());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert!(matches!(
            validate_article_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_article_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_internal_addresses_rejected() {
        for url in [
            "http://localhost/a",
            "http://127.0.0.1/a",
            "http://192.168.1.1:8080/a",
            "http://[::1]/a",
            "http://[fe80::1]/a",
            "http://0.0.0.0/a",
        ] {
            assert!(
                matches!(
                    validate_article_url(url),
                    Err(UrlValidationError::InternalAddress(_))
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_article_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("http://127.0.0.1:5001/prefix").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5001/prefix/");
        assert_eq!(
            url.join("api/scrape").unwrap().as_str(),
            "http://127.0.0.1:5001/prefix/api/scrape"
        );
    }

    #[test]
    fn test_base_url_requires_http() {
        assert!(parse_base_url("ws://example.com").is_err());
    }
}
