//! SSRF (Server-Side Request Forgery) protection.
//!
//! Icon URLs come from page markup, so they are untrusted. Before a download
//! the host is resolved and every answer must be a public address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("URL has no host")]
    MissingHost,

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

/// IPv4 ranges not covered by the `Ipv4Addr` predicates.
const RESERVED_V4: [Ipv4Net; 6] = [
    Ipv4Net::new_assert(Ipv4Addr::new(100, 64, 0, 0), 10), // carrier-grade NAT
    Ipv4Net::new_assert(Ipv4Addr::new(192, 0, 0, 0), 24),  // IETF protocol assignments
    Ipv4Net::new_assert(Ipv4Addr::new(192, 0, 2, 0), 24),  // TEST-NET-1
    Ipv4Net::new_assert(Ipv4Addr::new(198, 18, 0, 0), 15), // benchmarking
    Ipv4Net::new_assert(Ipv4Addr::new(198, 51, 100, 0), 24),
    Ipv4Net::new_assert(Ipv4Addr::new(240, 0, 0, 0), 4),
];

const RESERVED_V6: [Ipv6Net; 3] = [
    Ipv6Net::new_assert(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7), // unique local
    Ipv6Net::new_assert(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10), // link-local
    Ipv6Net::new_assert(Ipv6Addr::new(0x2001, 0x0db8, 0, 0, 0, 0, 0, 0), 32), // documentation
];

fn is_reserved_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_multicast()
        || v4.is_broadcast()
        || v4.is_unspecified()
        || v4.octets()[0] == 0
        || RESERVED_V4.iter().any(|net| net.contains(&v4))
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are judged by their IPv4
/// part.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_reserved_v4(v4);
            }
            v6.is_loopback() || v6.is_multicast() || v6.is_unspecified() || RESERVED_V6.iter().any(|net| net.contains(&v6))
        }
    }
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Host literals that are checked without DNS.
///
/// Returns `None` when the host is a domain name that needs resolving.
pub fn check_literal_host(url: &Url) -> Option<Result<(), SsrfError>> {
    match url.host() {
        None => Some(Err(SsrfError::MissingHost)),
        Some(Host::Ipv4(v4)) => Some(validate_ip(IpAddr::V4(v4))),
        Some(Host::Ipv6(v6)) => Some(validate_ip(IpAddr::V6(v6))),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.');
            if domain == "localhost" || domain.ends_with(".localhost") {
                Some(Err(SsrfError::BlockedHost(domain.to_string())))
            } else {
                None
            }
        }
    }
}

/// Resolve the URL's host and reject it if any answer is non-public.
pub async fn check_url(url: &Url) -> Result<(), SsrfError> {
    if let Some(result) = check_literal_host(url) {
        return result;
    }

    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;

    let mut resolved = 0usize;
    for addr in addrs {
        validate_ip(addr.ip())?;
        resolved += 1;
    }

    if resolved == 0 {
        return Err(SsrfError::DnsError(format!("{host}: no addresses")));
    }
    Ok(())
}
