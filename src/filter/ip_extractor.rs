//! Client IP extraction
//!
//! By default the socket peer address is used, with the port dropped. When
//! the filter runs behind a proxy, the proxy's forwarding headers can be
//! trusted instead:
//! - `Cloudflare`: `CF-Connecting-IP`
//! - `Standard`: `X-Forwarded-For`, or RFC 7239 `Forwarded` without it

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Extract the client IP address according to the trust configuration
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &ClientIpConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// One forwarding header decides: `X-Forwarded-For` when present, otherwise
/// `Forwarded`. Either is read right to left past `num_trusted_proxies` hops.
fn extract_standard_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    let hops = match headers.get("x-forwarded-for") {
        Some(xff) => x_forwarded_for_hops(xff.to_str().ok()?),
        None => forwarded_hops(headers.get("forwarded")?.to_str().ok()?),
    };
    select_hop(&hops, config.num_trusted_proxies)
}

/// `for=` addresses of an RFC 7239 `Forwarded` header, in order
fn forwarded_hops(forwarded: &str) -> Vec<IpAddr> {
    forwarded
        .split(',')
        .filter_map(|element| {
            element
                .split(';')
                .find_map(|param| param.trim().strip_prefix("for="))
        })
        .filter_map(|value| strip_port(value.trim_matches('"')).parse::<IpAddr>().ok())
        .collect()
}

fn x_forwarded_for_hops(xff: &str) -> Vec<IpAddr> {
    xff.split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect()
}

/// Skip `num_trusted` hops from the right; `None` takes the rightmost entry
fn select_hop(hops: &[IpAddr], num_trusted: Option<usize>) -> Option<IpAddr> {
    match num_trusted {
        Some(num_trusted) if hops.len() > num_trusted => Some(hops[hops.len() - num_trusted - 1]),
        // Chain shorter than the trusted hop count: take the least trusted entry
        Some(_) => hops.first().copied(),
        None => hops.last().copied(),
    }
}

/// `[v6]:port` → `v6`, `v4:port` → `v4`, bare addresses unchanged
fn strip_port(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match value.split_once(':') {
        Some((host, port)) if !port.contains(':') => host,
        _ => value,
    }
}
