use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The visitor's network address as text, if it can be told.
///
/// Prefers the client entry of `X-Forwarded-For` set by the reverse proxy over the peer address of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorAddress(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for VisitorAddress
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let address = forwarded_for(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.ip().to_string())
        });

        Ok(VisitorAddress(address))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;

    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|client| !client.is_empty())
        .map(str::to_owned)
}
