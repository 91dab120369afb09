//! Client identification for per-caller throttling.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Identifier used when no address information is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Get the client identifier (IP address) for rate limiting.
///
/// Forwarding headers are only honoured when `trust_forwarded` is set, since
/// any client can send them.
pub fn client_id(addr: Option<SocketAddr>, headers: &HeaderMap, trust_forwarded: bool) -> String {
    if trust_forwarded {
        // First hop of X-Forwarded-For is the original client.
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return ip.to_string();
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return ip.to_string();
        }
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
