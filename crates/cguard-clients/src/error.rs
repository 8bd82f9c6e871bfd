//! Client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} service unavailable: {message}")]
    ServiceUnavailable { service: &'static str, message: String },

    #[error("{service} request failed with status {status}: {body}")]
    RequestFailed {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Map a non-success HTTP status to an error.
    ///
    /// 429 and 5xx are treated as the service being unavailable.
    pub fn from_status(service: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ClientError::ServiceUnavailable {
                service,
                message: format!("{}: {}", status, body),
            }
        } else {
            ClientError::RequestFailed {
                service,
                status: status.as_u16(),
                body,
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ServiceUnavailable { .. } => true,
            ClientError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        let err = ClientError::from_status("moderation", StatusCode::BAD_GATEWAY, "down".into());
        assert!(err.is_retryable());

        let err = ClientError::from_status("moderation", StatusCode::TOO_MANY_REQUESTS, "".into());
        assert!(err.is_retryable());

        let err = ClientError::from_status("moderation", StatusCode::BAD_REQUEST, "bad".into());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_invalid_response_not_retryable() {
        assert!(!ClientError::InvalidResponse("x".into()).is_retryable());
    }
}
