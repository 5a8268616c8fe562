use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use ipnet::IpNet;

use crate::error::AppError;
use crate::state::SharedState;

/// The address rate limits are charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<SharedState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));

        Ok(ClientIp(resolve(&parts.headers, peer, &state.config.trusted_proxies)))
    }
}

/// Resolve the caller's IP for rate limiting.
///
/// `X-Forwarded-For` is only honored when the socket peer is a trusted proxy,
/// and then only the rightmost entry that is not itself a trusted proxy.
pub fn resolve(headers: &HeaderMap, peer: IpAddr, trusted_proxies: &[IpNet]) -> IpAddr {
    let is_trusted = |ip: &IpAddr| trusted_proxies.iter().any(|net| net.contains(ip));

    if !is_trusted(&peer) {
        return peer;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| {
            // Entries left of our own proxies are client-supplied; the
            // rightmost untrusted hop is the one a proxy actually saw.
            xff.rsplit(',')
                .map(|s| s.trim().parse::<IpAddr>())
                .find(|ip| !matches!(ip, Ok(ip) if is_trusted(ip)))
                .and_then(Result::ok)
        })
        .unwrap_or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn xff(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    fn proxies() -> Vec<IpNet> {
        vec!["10.0.0.0/8".parse().unwrap()]
    }

    #[test]
    fn untrusted_peer_ignores_header() {
        let peer: IpAddr = "198.51.100.7".parse().unwrap();
        assert_eq!(resolve(&xff("1.2.3.4"), peer, &proxies()), peer);
    }

    #[test]
    fn no_proxies_configured_uses_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(resolve(&xff("1.2.3.4"), peer, &[]), peer);
    }

    #[test]
    fn trusted_peer_uses_rightmost_untrusted_forwarded_ip() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let got = resolve(&xff("203.0.113.5, 198.51.100.1, 10.0.0.9"), peer, &proxies());
        assert_eq!(got, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn spoofed_prefix_does_not_change_resolved_ip() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let real: IpAddr = "198.51.100.9".parse().unwrap();
        for spoof in ["1.1.1.1", "2.2.2.2", "3.3.3.3, 4.4.4.4"] {
            let header = format!("{spoof}, 198.51.100.9");
            assert_eq!(resolve(&xff(&header), peer, &proxies()), real);
        }
    }

    #[test]
    fn garbage_in_the_untrusted_slot_falls_back_to_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        // Must not skip past the bad entry to a client-supplied address
        assert_eq!(resolve(&xff("1.1.1.1, not-an-ip"), peer, &proxies()), peer);
    }

    #[test]
    fn trusted_peer_without_usable_header_falls_back() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(resolve(&HeaderMap::new(), peer, &proxies()), peer);
        assert_eq!(resolve(&xff("garbage"), peer, &proxies()), peer);
    }
}
