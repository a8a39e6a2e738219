use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = CinelinkError> = std::result::Result<T, E>;

/// Errors that can surface from startup or from the HTTP surface.
///
/// Network failures of the catalog, discovery and probe collaborators never
/// appear here: they are folded into "not found" outcomes at the lowest layer.
#[derive(Error, Debug)]
pub enum CinelinkError {
    /// Invalid or missing configuration, including precondition violations
    /// such as a zero TTL or a zero concurrency limit.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable request (empty query, unknown media kind).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Lookup finished but produced nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Failed to build the shared HTTP client.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Socket or listener failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CinelinkError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            CinelinkError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CinelinkError::NotFound(_) => StatusCode::NOT_FOUND,
            CinelinkError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            CinelinkError::Config(_) | CinelinkError::Io(_) | CinelinkError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CinelinkError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let resp = CinelinkError::BadRequest("empty query".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_status_matches_status_method() {
        let errors = [
            CinelinkError::BadRequest("q".into()),
            CinelinkError::NotFound("x".into()),
            CinelinkError::Config("c".into()),
            CinelinkError::Internal("i".into()),
        ];
        for err in errors {
            let expected = err.status();
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = CinelinkError::NotFound("no metadata".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn config_error_message_is_prefixed() {
        let err = CinelinkError::Config("RACE_CONCURRENCY must be positive".into());
        assert_eq!(
            err.to_string(),
            "configuration error: RACE_CONCURRENCY must be positive"
        );
    }
}
