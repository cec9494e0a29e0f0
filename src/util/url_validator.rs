use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors raised when a remote endpoint URL fails validation.
///
/// Both feed URLs (fetched during population) and hub URLs (pinged on
/// publish) pass through this check before any request goes out.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which remote endpoints this deployment is willing to contact.
///
/// The default refuses loopback and private ranges so a remote document
/// cannot steer fetches or hub pings at internal services (SSRF).
/// `allow_private_networks` exists for intranet deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlPolicy {
    pub allow_private_networks: bool,
}

impl UrlPolicy {
    /// Parses and validates `url_str` under this policy.
    ///
    /// # Errors
    ///
    /// - [`UrlValidationError::InvalidUrl`] if the string does not parse
    /// - [`UrlValidationError::UnsupportedScheme`] for anything but http(s)
    /// - [`UrlValidationError::Localhost`] / [`UrlValidationError::PrivateIp`]
    ///   unless private networks are allowed
    pub fn check(&self, url_str: &str) -> Result<Url, UrlValidationError> {
        let url = Url::parse(url_str)?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        }

        if self.allow_private_networks {
            return Ok(url);
        }

        if let Some(host) = url.host_str() {
            if host.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::Localhost);
            }

            let bare = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);

            if let Ok(ip) = bare.parse::<IpAddr>() {
                if ip.is_loopback() {
                    return Err(UrlValidationError::Localhost);
                }
                if is_private_ip(&ip) {
                    return Err(UrlValidationError::PrivateIp(ip.to_string()));
                }
            }
        }

        Ok(url)
    }
}

/// Validates a URL with the default (public-only) policy.
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    UrlPolicy::default().check(url_str)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // fc00::/7
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // fe80::/10
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
