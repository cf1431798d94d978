//! Hostname parsing and validation.
//!
//! Domains are full hostnames: `www.example.com` and `example.com` are
//! distinct keys. [`base_domain`] exists only to group rows when listing.

use url::{Host, Url};

use crate::error::ValidationError;

/// Characters stripped from user input before parsing.
const STRIPPED: [char; 4] = ['<', '>', '"', '\''];

/// Turn a URL or bare domain typed by the user into a validated hostname.
pub fn parse_domain_input(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let sanitized: String = trimmed
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect::<String>()
        .to_lowercase();

    let with_scheme = if sanitized.starts_with("http://") || sanitized.starts_with("https://") {
        sanitized
    } else {
        format!("https://{sanitized}")
    };

    let url = Url::parse(&with_scheme).map_err(|_| {
        if trimmed.contains(' ') {
            ValidationError::ContainsSpaces
        } else {
            ValidationError::InvalidUrl
        }
    })?;

    match url.host() {
        Some(Host::Domain(host)) => {
            validate_domain(host)?;
            Ok(host.to_string())
        }
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Err(ValidationError::IpAddress),
        None => Err(ValidationError::InvalidUrl),
    }
}

/// Reject IPs, local names and malformed labels.
pub fn validate_domain(host: &str) -> Result<(), ValidationError> {
    if is_dotted_ipv4(host) {
        return Err(ValidationError::IpAddress);
    }
    if host == "localhost" || host.ends_with(".local") || host.ends_with(".localhost") {
        return Err(ValidationError::LocalDomain);
    }
    if host.split('.').all(is_valid_label) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat)
    }
}

/// Trim and lowercase a hostname coming from a focus event.
pub fn normalize_domain(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Last two labels of a hostname (`news.example.com` -> `example.com`).
pub fn base_domain(host: &str) -> &str {
    match host.rmatch_indices('.').nth(1) {
        Some((idx, _)) => &host[idx + 1..],
        None => host,
    }
}

fn is_dotted_ipv4(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    (1..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first() != Some(&b'-')
        && bytes.last() != Some(&b'-')
}
