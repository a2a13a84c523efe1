//! Target checks for `/api/fetch-url`.
//!
//! The relay only talks to public addresses: the host is checked before the
//! request, every redirect hop is checked again, and name resolution inside
//! the HTTP client drops non-public addresses so a rebinding DNS answer
//! cannot slip through between the check and the connect.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use url::{Host, Url};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Whether `ip` is reachable on the public internet.
#[must_use]
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        || (a == 100 && (64..128).contains(&b)))
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local())
}

/// Literal IP of `url`, if its host is one.
fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        Host::Domain(_) => None,
    }
}

/// Resolve the host of `url` and require every address to be public.
///
/// # Errors
/// Returns a message naming the rejected host.
pub async fn check_target(url: &Url) -> Result<(), String> {
    if let Some(ip) = literal_ip(url) {
        return if is_public_ip(ip) {
            Ok(())
        } else {
            Err(format!("{ip} is not a public address"))
        };
    }

    let host = url.host_str().ok_or_else(|| "URL has no host".to_string())?;
    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|err| format!("cannot resolve {host}: {err}"))?
        .collect();
    if addrs.is_empty() {
        return Err(format!("cannot resolve {host}"));
    }
    match addrs.iter().find(|addr| !is_public_ip(addr.ip())) {
        Some(addr) => Err(format!("{host} resolves to {} which is not public", addr.ip())),
        None => Ok(()),
    }
}

/// Redirect policy that re-checks every hop with literal IP hosts.
///
/// Domain hops are filtered by [`PublicOnlyResolver`] at connect time.
#[must_use]
pub fn public_redirects() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let scheme = attempt.url().scheme().to_string();
        if !matches!(scheme.as_str(), "http" | "https") {
            return attempt.error(format!("redirect to unsupported scheme {scheme}"));
        }
        match literal_ip(attempt.url()) {
            Some(ip) if !is_public_ip(ip) => {
                attempt.error(format!("redirect to non-public address {ip}"))
            }
            _ => attempt.follow(),
        }
    })
}

/// DNS resolver that only yields public addresses.
#[derive(Debug, Default)]
pub struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let public: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|addr| is_public_ip(addr.ip()))
                .collect();
            if public.is_empty() {
                let err = io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{host} has no public address"),
                );
                return Err(err.into());
            }
            let addrs: Addrs = Box::new(public.into_iter());
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_and_private_addresses() {
        for ip in ["8.8.8.8", "1.1.1.1", "2606:4700:4700::1111"] {
            assert!(is_public_ip(ip.parse().unwrap()), "{ip}");
        }
        for ip in [
            "127.0.0.1",
            "10.0.0.8",
            "172.16.4.2",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "100.64.0.1",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
        ] {
            assert!(!is_public_ip(ip.parse().unwrap()), "{ip}");
        }
    }

    #[tokio::test]
    async fn test_literal_targets() {
        let local = Url::parse("http://127.0.0.1:8080/admin").unwrap();
        assert!(check_target(&local).await.is_err());
        let metadata = Url::parse("http://169.254.169.254/latest/meta-data").unwrap();
        assert!(check_target(&metadata).await.is_err());
        let v6 = Url::parse("http://[::1]/").unwrap();
        assert!(check_target(&v6).await.is_err());
        let public = Url::parse("https://93.184.215.14/").unwrap();
        assert!(check_target(&public).await.is_ok());
    }

    #[tokio::test]
    async fn test_localhost_name_is_rejected() {
        let url = Url::parse("http://localhost:3000/").unwrap();
        assert!(check_target(&url).await.is_err());
    }
}
