//! Origin address of a request, as used for per-origin rate limiting.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use super::AppState;

const UNKNOWN_ORIGIN: &str = "unknown";

/// The submitter's network origin.
///
/// The peer address of the connection, or the first `X-Forwarded-For` entry
/// when the server runs behind a trusted proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin(pub String);

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for
            && let Some(addr) = forwarded_for(&parts.headers)
        {
            return Ok(Self(addr));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| UNKNOWN_ORIGIN.to_string(), |ci| ci.0.ip().to_string());
        Ok(Self(peer))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn empty_forwarded_header_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(forwarded_for(&headers), None);
        assert_eq!(forwarded_for(&HeaderMap::new()), None);
    }
}
