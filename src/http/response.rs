//! Response finalization.
//!
//! # Responsibilities
//! - Negotiate gzip from the client's `Accept-Encoding`
//! - Set `Content-Type`, `Cache-Control` and `Vary`
//! - Return a completed response; the transport write happens after
//!
//! # Design Decisions
//! - Only the presence of "gzip" is checked, q-values are ignored
//! - A compression failure falls back to the identity body

use std::io::Write;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use flate2::{write::GzEncoder, Compression};

pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// True when the client advertises gzip support.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("gzip"))
}

/// `public, max-age=N`.
pub fn cache_control(max_age_secs: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", max_age_secs))
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
}

/// Builds a 200 response, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct ResponseEncoder {
    level: Compression,
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl ResponseEncoder {
    pub fn encode(
        &self,
        body: impl Into<Bytes>,
        content_type: &'static str,
        max_age_secs: Option<u64>,
        gzip: bool,
    ) -> Response {
        let body = body.into();
        // Vary on every variant, compressed or identity.
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::VARY, "accept-encoding");

        if let Some(max_age) = max_age_secs {
            builder = builder.header(header::CACHE_CONTROL, cache_control(max_age));
        }

        let body = if gzip {
            match self.gzip(&body) {
                Ok(compressed) => {
                    builder = builder.header(header::CONTENT_ENCODING, "gzip");
                    Bytes::from(compressed)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Gzip compression failed, sending identity body");
                    body
                }
            }
        } else {
            body
        };

        builder.body(Body::from(body)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to assemble response");
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }

    fn gzip(&self, body: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), self.level);
        encoder.write_all(body)?;
        encoder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[test]
    fn detects_gzip_in_accept_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("br, deflate"));
        assert!(!accepts_gzip(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("deflate, GZIP;q=0.5"));
        assert!(accepts_gzip(&headers));
    }

    #[tokio::test]
    async fn gzip_body_decompresses_to_identity_body() {
        let encoder = ResponseEncoder::default();
        let page = "<html><body>".to_string() + &"rendered ".repeat(200) + "</body></html>";

        let plain = encoder.encode(page.clone(), TEXT_HTML, Some(30), false);
        assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
        let plain_body = body_bytes(plain).await;

        let compressed = encoder.encode(page.clone(), TEXT_HTML, Some(30), true);
        assert_eq!(compressed.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(compressed.headers()[header::CACHE_CONTROL], "public, max-age=30");
        assert_eq!(compressed.headers()[header::CONTENT_TYPE], TEXT_HTML);
        let gz = body_bytes(compressed).await;
        assert!(gz.len() < plain_body.len());

        let mut decoded = Vec::new();
        GzDecoder::new(&gz[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, plain_body.to_vec());
    }

    #[test]
    fn both_variants_vary_on_accept_encoding() {
        let encoder = ResponseEncoder::default();
        for gzip in [false, true] {
            let response = encoder.encode("<p>page</p>", TEXT_HTML, Some(60), gzip);
            assert_eq!(response.headers()[header::VARY], "accept-encoding", "gzip={}", gzip);
        }
    }

    #[test]
    fn max_age_is_optional() {
        let response = ResponseEncoder::default().encode("x", TEXT_PLAIN, None, false);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
    }
}
