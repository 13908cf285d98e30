//! Client address resolution
//!
//! The TCP peer address identifies the caller. Forwarding headers are only
//! believed when the server sits behind a proxy that sets them.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Resolved caller address, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl ClientAddr {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `X-Forwarded-For` / `X-Real-IP` are trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyPolicy {
    pub trust_forwarded: bool,
}

impl ProxyPolicy {
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientAddr {
        let forwarded = if self.trust_forwarded {
            forwarded_for(headers)
        } else {
            None
        };

        let addr = forwarded
            .or_else(|| peer.map(|p| p.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        ClientAddr(addr)
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Outermost layer: attaches a [`ClientAddr`] for the layers and handlers below.
/// The peer address comes from `into_make_service_with_connect_info`.
pub async fn resolve_client(
    State(policy): State<ProxyPolicy>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = policy.resolve(request.headers(), peer);
    request.extensions_mut().insert(client);
    next.run(request).await
}

/// Address recorded by [`resolve_client`], if that layer ran
pub(crate) fn client_of(request: &Request) -> ClientAddr {
    request
        .extensions()
        .get::<ClientAddr>()
        .cloned()
        .unwrap_or_else(|| ClientAddr("unknown".to_string()))
}
