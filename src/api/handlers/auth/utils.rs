//! Small helpers for auth handlers.

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub(crate) const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit key for a login caller.
///
/// Without `trust_proxy_headers` only the TCP peer counts, since any caller can
/// set `X-Forwarded-For`. With it, the headers are taken at face value and the
/// gateway must sit behind a proxy that overwrites them. Callers with no usable
/// address share one bucket.
pub(crate) fn client_identifier(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        if let Some(forwarded) = proxy_client(headers) {
            return forwarded;
        }
    }
    peer.map_or_else(|| UNKNOWN_CLIENT.to_string(), |addr| addr.ip().to_string())
}

fn proxy_client(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return Some(forwarded.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Bearer token from an `Authorization` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
