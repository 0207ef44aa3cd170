use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the remote object is gone, so reads can drop it from state
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_)) || matches!(self, ApiError::Api { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_covers_http_404() {
        assert!(ApiError::NotFound("product abc".into()).is_not_found());
        assert!(ApiError::Api {
            status: 404,
            message: "gone".into()
        }
        .is_not_found());
        assert!(!ApiError::RateLimited.is_not_found());
    }

    #[test]
    fn api_error_message_includes_status() {
        let err = ApiError::Api {
            status: 400,
            message: "Invalid speed".into(),
        };
        assert_eq!(
            err.to_string(),
            "API returned error (HTTP 400): Invalid speed"
        );
    }
}
