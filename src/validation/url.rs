//! URL validation — SSRF defense (§4.A).
//!
//! Only allowlisted schemes and ports are accepted, and every resolved
//! address for the hostname is checked against the private/reserved ranges
//! below. DNS-resolution failure fails closed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use url::Url;

use crate::error::InputError;

const DEFAULT_ALLOWED_SCHEMES: &[&str] = &["https"];
const DEFAULT_ALLOWED_PORTS: &[u16] = &[443, 8443];

#[derive(Debug, Clone)]
pub struct UrlValidationOptions {
    pub allowed_schemes: Vec<String>,
    pub allowed_ports: Vec<u16>,
    pub allowed_domains: Option<Vec<String>>,
    pub allow_private_ips: bool,
}

impl Default for UrlValidationOptions {
    fn default() -> Self {
        Self {
            allowed_schemes: DEFAULT_ALLOWED_SCHEMES.iter().map(|s| s.to_string()).collect(),
            allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
            allowed_domains: None,
            allow_private_ips: false,
        }
    }
}

fn effective_port(url: &Url) -> Option<u16> {
    url.port().or_else(|| match url.scheme() {
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    })
}

/// RFC 1918 / RFC 5735-style private and reserved IPv4 ranges.
fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    const RANGES: &[(Ipv4Addr, Ipv4Addr)] = &[
        (Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 255, 255, 255)),
        (Ipv4Addr::new(172, 16, 0, 0), Ipv4Addr::new(172, 31, 255, 255)),
        (Ipv4Addr::new(192, 168, 0, 0), Ipv4Addr::new(192, 168, 255, 255)),
        (Ipv4Addr::new(127, 0, 0, 0), Ipv4Addr::new(127, 255, 255, 255)),
        (Ipv4Addr::new(169, 254, 0, 0), Ipv4Addr::new(169, 254, 255, 255)),
        (Ipv4Addr::new(0, 0, 0, 0), Ipv4Addr::new(0, 255, 255, 255)),
        (Ipv4Addr::new(100, 64, 0, 0), Ipv4Addr::new(100, 127, 255, 255)),
        (Ipv4Addr::new(192, 0, 0, 0), Ipv4Addr::new(192, 0, 0, 255)),
        (Ipv4Addr::new(192, 0, 2, 0), Ipv4Addr::new(192, 0, 2, 255)),
        (Ipv4Addr::new(198, 51, 100, 0), Ipv4Addr::new(198, 51, 100, 255)),
        (Ipv4Addr::new(203, 0, 113, 0), Ipv4Addr::new(203, 0, 113, 255)),
        (Ipv4Addr::new(224, 0, 0, 0), Ipv4Addr::new(239, 255, 255, 255)),
        (Ipv4Addr::new(240, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 255)),
    ];
    let addr = u32::from(ip);
    RANGES
        .iter()
        .any(|(start, end)| u32::from(*start) <= addr && addr <= u32::from(*end))
}

/// IPv6 private/reserved prefixes: loopback, link-local, unique-local, multicast.
fn is_private_ipv6(ip: std::net::Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    let segments = ip.segments();
    let first = segments[0];
    (first & 0xffc0) == 0xfe80 // fe80::/10 link-local
        || (first & 0xfe00) == 0xfc00 // fc00::/7 unique local (covers fc00:/fd00:)
        || (first & 0xff00) == 0xff00 // ff00::/8 multicast
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

/// Resolve `host:port` and evaluate every returned address against the
/// private-IP table. DNS failure fails closed (§4.A).
fn resolve_and_check(host: &str, port: u16) -> Result<(), InputError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_private_ip(ip) {
            Err(InputError::PrivateAddress(host.to_string()))
        } else {
            Ok(())
        };
    }

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| InputError::PrivateAddress(host.to_string()))?
        .collect();

    if addrs.is_empty() {
        return Err(InputError::PrivateAddress(host.to_string()));
    }

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return Err(InputError::PrivateAddress(host.to_string()));
        }
    }
    Ok(())
}

/// Validate a URL for SSRF safety (§4.A `validate_url`).
pub fn validate_url(raw: &str, options: &UrlValidationOptions) -> Result<Url, InputError> {
    if raw.trim().is_empty() {
        return Err(InputError::InvalidInput("url".to_string()));
    }

    let url = Url::parse(raw).map_err(|_| InputError::InvalidInput(raw.to_string()))?;

    if !options
        .allowed_schemes
        .iter()
        .any(|s| s.eq_ignore_ascii_case(url.scheme()))
    {
        return Err(InputError::DisallowedScheme(url.scheme().to_string()));
    }

    let port = effective_port(&url).ok_or_else(|| InputError::DisallowedPort(0))?;
    if !options.allowed_ports.contains(&port) {
        return Err(InputError::DisallowedPort(port));
    }

    let host = url
        .host_str()
        .ok_or_else(|| InputError::InvalidInput(raw.to_string()))?;

    if let Some(domains) = &options.allowed_domains {
        if !domains.iter().any(|d| d.eq_ignore_ascii_case(host)) {
            return Err(InputError::DomainNotAllowed(host.to_string()));
        }
    }

    if !options.allow_private_ips {
        resolve_and_check(host, port)?;
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_http_scheme_by_default() {
        let err = validate_url("http://example.com", &UrlValidationOptions::default()).unwrap_err();
        assert!(matches!(err, InputError::DisallowedScheme(_)));
    }

    #[test]
    fn rejects_disallowed_port() {
        let err =
            validate_url("https://example.com:9999", &UrlValidationOptions::default()).unwrap_err();
        assert!(matches!(err, InputError::DisallowedPort(9999)));
    }

    #[test]
    fn rejects_loopback_ip_literal() {
        let err = validate_url("https://127.0.0.1:443/x", &UrlValidationOptions::default()).unwrap_err();
        assert!(matches!(err, InputError::PrivateAddress(_)));
    }

    #[test]
    fn rejects_private_ipv4_ranges() {
        assert!(is_private_ipv4(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 20, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(169, 254, 1, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn rejects_domain_not_in_allowlist() {
        let options = UrlValidationOptions {
            allowed_domains: Some(vec!["trusted.example".to_string()]),
            ..Default::default()
        };
        let err = validate_url("https://untrusted.example", &options).unwrap_err();
        assert!(matches!(err, InputError::DomainNotAllowed(_)));
    }

    #[test]
    fn allows_private_ip_when_opted_in() {
        let options = UrlValidationOptions {
            allow_private_ips: true,
            ..Default::default()
        };
        assert!(validate_url("https://127.0.0.1:443/x", &options).is_ok());
    }
}
