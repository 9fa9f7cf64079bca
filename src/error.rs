//! Error taxonomy shared by the request pipelines.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Failure of an outbound call (page fetch or render service).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL {0:?}")]
    InvalidUrl(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream answered with status {0}")]
    Status(u16),
    #[error("upstream request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if let Some(status) = err.status() {
            UpstreamError::Status(status.as_u16())
        } else {
            UpstreamError::Request(err)
        }
    }
}

/// Outcome classes of a dispatched request that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Missing or malformed client input.
    #[error("client error: {0}")]
    ClientError(&'static str),
    /// Render backend or outbound fetch failure.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// Asset or target absent.
    #[error("not found")]
    NotFound,
    /// Anything unexpected, including panics inside a pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::ClientError(_) => StatusCode::BAD_REQUEST,
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::Upstream(_) | DispatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short message sent to the client. Never includes the cause.
    fn public_message(&self) -> &'static str {
        match self {
            DispatchError::ClientError(message) => message,
            DispatchError::Upstream(_) => "Upstream request failed",
            DispatchError::NotFound => "Not Found",
            DispatchError::Internal(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_bodies_hide_causes() {
        let err = DispatchError::Internal("thread panicked at src/secret.rs:12".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(DispatchError::ClientError("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(DispatchError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            DispatchError::Upstream(UpstreamError::Timeout).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
