//! Request classification.
//!
//! # Design Decisions
//! - Rules are an explicit list evaluated top to bottom; first match wins
//! - Anything no rule claims is `Static`
//! - Classification reads the request, never its body

use std::sync::Arc;

use axum::extract::Request;

use crate::config::RouteConfig;
use crate::http::request::query_param;
use crate::tunnel::TunnelAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Render,
    DecodeProxy,
    Tunnel,
    Static,
    Metrics,
}

impl Classification {
    /// Metric label of the handler.
    pub fn handler(&self) -> &'static str {
        match self {
            Classification::Render => "render",
            Classification::DecodeProxy => "proxy",
            Classification::Tunnel => "tunnel",
            Classification::Static => "static",
            Classification::Metrics => "metrics",
        }
    }
}

/// Result of classifying one request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRequest {
    pub raw_url: String,
    pub classification: Classification,
    /// `Render`: the `url` parameter, when present and non-empty.
    /// `DecodeProxy`: the forced-HTTPS target, when a host is present.
    pub target_url: Option<String>,
}

/// One entry of the classification list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Render,
    DecodeProxy,
    Tunnel,
    Metrics,
}

impl Rule {
    /// Evaluation order.
    pub const ORDER: [Rule; 4] = [Rule::Render, Rule::DecodeProxy, Rule::Tunnel, Rule::Metrics];
}

/// Applies [`Rule::ORDER`] to requests.
#[derive(Clone)]
pub struct Classifier {
    routes: RouteConfig,
    tunnel: Arc<dyn TunnelAdapter>,
}

impl Classifier {
    pub fn new(routes: RouteConfig, tunnel: Arc<dyn TunnelAdapter>) -> Self {
        Self { routes, tunnel }
    }

    pub fn classify(&self, request: &Request) -> ClassifiedRequest {
        let raw_url = request.uri().to_string();
        for rule in Rule::ORDER {
            if let Some((classification, target_url)) = self.apply(rule, request) {
                return ClassifiedRequest {
                    raw_url,
                    classification,
                    target_url,
                };
            }
        }

        ClassifiedRequest {
            raw_url,
            classification: Classification::Static,
            target_url: None,
        }
    }

    fn apply(&self, rule: Rule, request: &Request) -> Option<(Classification, Option<String>)> {
        let uri = request.uri();
        let path = uri.path();
        match rule {
            Rule::Render => under_prefix(path, &self.routes.render_prefix).then(|| {
                let target = query_param(uri, "url").filter(|url| !url.is_empty());
                (Classification::Render, target)
            }),
            Rule::DecodeProxy => {
                let rest = path.strip_prefix(&self.routes.proxy_prefix)?;
                let target = (!rest.is_empty()).then(|| match uri.query() {
                    Some(query) => format!("https://{}?{}", rest, query),
                    None => format!("https://{}", rest),
                });
                Some((Classification::DecodeProxy, target))
            }
            Rule::Tunnel => (self.tunnel.owns_upgrade(request) || self.tunnel.owns_request(request))
                .then_some((Classification::Tunnel, None)),
            Rule::Metrics => (path == self.routes.metrics_path).then_some((Classification::Metrics, None)),
        }
    }
}

/// `path` is `prefix` itself or a segment below it. `/renderer.js` is not under `/render`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}
