//! Generic tunnel forwarding.
//!
//! # Responsibilities
//! - Claim requests through a routing predicate
//! - Forward plain requests to the tunnel upstream
//! - Complete protocol upgrades on both sides and splice the streams
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded bytes ────→ Proxy ←──── upgraded bytes ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - The dispatcher only sees the predicates and the final status
//! - Payloads are never inspected
//! - Upstream connection failures are 502

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{uri::PathAndQuery, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};

use crate::http::request::is_upgrade_request;

#[async_trait]
pub trait TunnelAdapter: Send + Sync {
    /// True when this adapter handles `request`.
    fn owns_request(&self, request: &Request) -> bool;

    /// True when this adapter handles the upgrade `request` asks for.
    fn owns_upgrade(&self, request: &Request) -> bool;

    /// Fully handle a plain request.
    async fn handle(&self, request: Request) -> Response;

    /// Fully handle an upgrade request. The connection's socket and any
    /// buffered bytes arrive through the request's pending upgrade.
    async fn handle_upgrade(&self, request: Request) -> Response;
}

/// Adapter that owns nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTunnel;

#[async_trait]
impl TunnelAdapter for DisabledTunnel {
    fn owns_request(&self, _request: &Request) -> bool {
        false
    }

    fn owns_upgrade(&self, _request: &Request) -> bool {
        false
    }

    async fn handle(&self, _request: Request) -> Response {
        StatusCode::NOT_FOUND.into_response()
    }

    async fn handle_upgrade(&self, _request: Request) -> Response {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Forwards everything under a path prefix to one upstream address.
#[derive(Clone)]
pub struct HttpTunnel {
    prefix: String,
    upstream: SocketAddr,
    client: Client<HttpConnector, Body>,
}

impl HttpTunnel {
    pub fn new(prefix: impl Into<String>, upstream: SocketAddr) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            prefix: prefix.into(),
            upstream,
            client,
        }
    }

    /// Upstream URI with the tunnel prefix removed.
    fn upstream_uri(&self, uri: &Uri) -> Option<Uri> {
        let path = uri.path().strip_prefix(&self.prefix)?;
        let path_and_query = match uri.query() {
            Some(query) => format!("/{}?{}", path, query),
            None => format!("/{}", path),
        };
        let path_and_query: PathAndQuery = path_and_query.parse().ok()?;

        Uri::builder()
            .scheme("http")
            .authority(self.upstream.to_string())
            .path_and_query(path_and_query)
            .build()
            .ok()
    }

    fn rewrite(&self, request: Request) -> Result<Request, Response> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self
            .upstream_uri(&parts.uri)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, "Invalid tunnel path").into_response())?;
        Ok(Request::from_parts(parts, body))
    }
}

#[async_trait]
impl TunnelAdapter for HttpTunnel {
    fn owns_request(&self, request: &Request) -> bool {
        request.uri().path().starts_with(&self.prefix)
    }

    fn owns_upgrade(&self, request: &Request) -> bool {
        self.owns_request(request) && is_upgrade_request(request.headers())
    }

    async fn handle(&self, request: Request) -> Response {
        let request = match self.rewrite(request) {
            Ok(request) => request,
            Err(response) => return response,
        };

        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %self.upstream, error = %e, "Tunnel upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }

    async fn handle_upgrade(&self, mut request: Request) -> Response {
        let client_upgrade = hyper::upgrade::on(&mut request);
        let request = match self.rewrite(request) {
            Ok(request) => request,
            Err(response) => return response,
        };

        let mut upstream_response = match self.client.request(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(upstream = %self.upstream, error = %e, "Tunnel upgrade failed");
                return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
            }
        };

        if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
            let (parts, body) = upstream_response.into_parts();
            return Response::from_parts(parts, Body::new(body));
        }

        let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);
        let upstream = self.upstream;
        tokio::spawn(async move {
            let (client, server) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(upstream = %upstream, error = %e, "Tunnel upgrade did not complete");
                    return;
                }
            };
            let mut client = TokioIo::new(client);
            let mut server = TokioIo::new(server);
            match tokio::io::copy_bidirectional(&mut client, &mut server).await {
                Ok((to_upstream, to_client)) => {
                    tracing::debug!(upstream = %upstream, to_upstream, to_client, "Tunnel closed");
                }
                Err(e) => tracing::debug!(upstream = %upstream, error = %e, "Tunnel aborted"),
            }
        });

        let (parts, _) = upstream_response.into_parts();
        Response::from_parts(parts, Body::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel() -> HttpTunnel {
        HttpTunnel::new("/tunnel/", "127.0.0.1:9000".parse().unwrap())
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn owns_prefixed_paths_only() {
        let t = tunnel();
        assert!(t.owns_request(&request("/tunnel/abc")));
        assert!(!t.owns_request(&request("/tunnelx")));
        assert!(!t.owns_request(&request("/render?url=x")));
    }

    #[test]
    fn upgrades_need_upgrade_headers() {
        let t = tunnel();
        assert!(!t.owns_upgrade(&request("/tunnel/ws")));

        let upgrade = Request::builder()
            .uri("/tunnel/ws")
            .header("connection", "Upgrade")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        assert!(t.owns_upgrade(&upgrade));
    }

    #[test]
    fn strips_prefix_and_keeps_query() {
        let t = tunnel();
        let uri: Uri = "/tunnel/a/b?c=d".parse().unwrap();
        assert_eq!(
            t.upstream_uri(&uri).unwrap().to_string(),
            "http://127.0.0.1:9000/a/b?c=d"
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        // Port 1 is reserved and refuses connections.
        let t = HttpTunnel::new("/tunnel/", "127.0.0.1:1".parse().unwrap());
        let response = t.handle(request("/tunnel/x")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
