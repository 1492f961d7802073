//! Address checks for outbound page fetches.
//!
//! Links come from untrusted chat messages, so every host a preview fetch
//! touches must resolve to a public address.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use thiserror::Error;

/// Hostnames that always name the local machine.
const LOCAL_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme {0}")]
    Scheme(String),
    #[error("URL has no host")]
    NoHost,
    #[error("Host {0} is not publicly routable")]
    Blocked(String),
    #[error("Host {host} resolved to non-public address {ip}")]
    Private { host: String, ip: IpAddr },
    #[error("DNS lookup failed for {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("DNS lookup returned no addresses for {0}")]
    Unresolved(String),
}

/// Static check on a host string, without DNS.
pub fn is_blocked_host(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    if LOCAL_HOSTNAMES.contains(&lower.trim_end_matches('.')) {
        return true;
    }

    let bare = lower.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok_and(|ip| is_private_ip(&ip))
}

/// Loopback, private, link-local, shared, documentation and other
/// non-public ranges.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (a == 100 && (b & 0xC0) == 64) // 100.64.0.0/10
                || (a == 198 && (b & 0xFE) == 18) // 198.18.0.0/15
                || (a == 192 && b == 0 && (c == 0 || c == 2))
                || (a == 198 && b == 51 && c == 100)
                || (a == 203 && b == 0 && c == 113)
                || a >= 224
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // fc00::/7
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // fe80::/10
                || mapped_v4_is_private(v6)
        }
    }
}

fn mapped_v4_is_private(v6: &Ipv6Addr) -> bool {
    v6.to_ipv4_mapped()
        .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
}

/// A host whose every resolved address passed [`is_private_ip`].
#[derive(Debug, Clone)]
pub struct PublicTarget {
    pub host: String,
    /// Address the request must connect to, so a second lookup cannot
    /// rebind the host to an internal address.
    pub addr: SocketAddr,
}

/// Resolve the host of `url` and require every address to be public.
pub async fn resolve_public(url: &url::Url) -> Result<PublicTarget, AddressError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AddressError::Scheme(url.scheme().to_string()));
    }
    let host = url.host_str().ok_or(AddressError::NoHost)?.to_string();
    if is_blocked_host(&host) {
        return Err(AddressError::Blocked(host));
    }
    let port = url.port_or_known_default().unwrap_or(80);

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(PublicTarget {
            host,
            addr: SocketAddr::new(ip, port),
        });
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|source| AddressError::Lookup {
            host: host.clone(),
            source,
        })?
        .collect();

    if let Some(private) = addrs.iter().find(|a| is_private_ip(&a.ip())) {
        return Err(AddressError::Private {
            host,
            ip: private.ip(),
        });
    }
    let addr = *addrs
        .first()
        .ok_or_else(|| AddressError::Unresolved(host.clone()))?;

    Ok(PublicTarget { host, addr })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn local_names_are_blocked() {
        assert!(is_blocked_host("localhost"));
        assert!(is_blocked_host("LocalHost."));
        assert!(is_blocked_host("ip6-loopback"));
    }

    #[test]
    fn internal_literals_are_blocked() {
        for host in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "[::1]",
            "::ffff:127.0.0.1",
            "fd00::1",
            "fe80::1",
        ] {
            assert!(is_blocked_host(host), "{host} should be blocked");
        }
    }

    #[test]
    fn public_hosts_pass() {
        assert!(!is_blocked_host("8.8.8.8"));
        assert!(!is_blocked_host("2606:4700:4700::1111"));
        assert!(!is_blocked_host("example.com"));
    }

    #[tokio::test]
    async fn literal_targets_skip_dns() {
        let target = resolve_public(&parse("https://1.1.1.1/page")).await.unwrap();
        assert_eq!(target.addr, "1.1.1.1:443".parse().unwrap());

        assert!(matches!(
            resolve_public(&parse("http://169.254.169.254/latest/meta-data")).await,
            Err(AddressError::Blocked(_))
        ));
        assert!(matches!(
            resolve_public(&parse("http://[::1]:8080/")).await,
            Err(AddressError::Blocked(_))
        ));
    }

    #[tokio::test]
    async fn non_http_schemes_are_refused() {
        assert!(matches!(
            resolve_public(&parse("file:///etc/passwd")).await,
            Err(AddressError::Scheme(s)) if s == "file"
        ));
    }
}
