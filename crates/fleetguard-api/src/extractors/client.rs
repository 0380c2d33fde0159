//! Client address and user agent of a request.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, HeaderName};

use fleetguard_core::config::ServerConfig;

use crate::state::AppState;

/// Address used when the socket peer is not known.
pub const UNKNOWN_ADDRESS: &str = "unknown";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Resolves the client address.
///
/// The socket peer is the client unless it is a trusted proxy. Then the
/// `X-Forwarded-For` chain is walked from the right, skipping trusted
/// proxies, and the first other address wins. Entries that do not parse as
/// an IP end the walk. The result is always an IP or [`UNKNOWN_ADDRESS`].
pub fn client_address(headers: &HeaderMap, extensions: &Extensions, server: &ServerConfig) -> String {
    let Some(peer) = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return UNKNOWN_ADDRESS.to_string();
    };

    if !server.is_trusted_proxy(&peer) {
        return peer.to_string();
    }

    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect();

    let mut client = peer;
    for hop in hops.into_iter().rev() {
        let Some(addr) = parse_hop(hop) else {
            break;
        };
        client = addr;
        if !server.is_trusted_proxy(&addr) {
            break;
        }
    }
    client.to_string()
}

fn parse_hop(hop: &str) -> Option<IpAddr> {
    hop.parse::<IpAddr>()
        .ok()
        .or_else(|| hop.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Client metadata recorded on sessions.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    /// Resolved client address.
    pub address: String,
    /// User-Agent header.
    pub user_agent: Option<String>,
}

impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(ClientMeta {
            address: client_address(&parts.headers, &parts.extensions, &state.config.server),
            user_agent,
        })
    }
}
