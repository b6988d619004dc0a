//! Typed errors for Gemini operations
//!
//! Classifies provider failures so the retry policy can tell a transient
//! blip (rate limit, 5xx, dropped connection) from a request that will
//! never succeed as sent (bad payload, rejected credential).

use thiserror::Error;

/// Gemini operation errors with typed variants
///
/// - `MissingCredential` - no API key in the environment; raised before any request
/// - `Unauthorized` (401) / `Forbidden` (403) - key rejected
/// - `NotFound` (404) - unknown model
/// - `RateLimited` (429) - quota exceeded
/// - `BadRequest` (400) - malformed request or unsupported attachment
/// - `ServiceError` (5xx) - server-side issue
/// - `Network` - connection/timeout
/// - `InvalidResponse` - body could not be decoded
/// - `Other` - catch-all
#[derive(Debug, Error)]
pub enum LlmError {
    /// The credential environment variable is unset or blank
    #[error("API key environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The inner string may contain the quota reset time if the provider sent one.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Gemini answers 400 for oversized or unreadable inline data as well as
    /// for malformed JSON, so this also covers "try a different file".
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether resending the same request could plausibly succeed.
    ///
    /// Unclassified failures count as transient: without a status code there
    /// is no evidence the request itself is at fault.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            LlmError::MissingCredential(_)
                | LlmError::Unauthorized(_)
                | LlmError::Forbidden(_)
                | LlmError::NotFound(_)
                | LlmError::BadRequest(_)
        )
    }

    /// Whether the failure points at the API key rather than the request
    pub fn is_credential_problem(&self) -> bool {
        matches!(
            self,
            LlmError::MissingCredential(_) | LlmError::Unauthorized(_) | LlmError::Forbidden(_)
        )
    }

    /// Convert HTTP status code and error text into typed LlmError
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            400 => LlmError::BadRequest(error_text),
            401 => LlmError::Unauthorized(error_text),
            403 => LlmError::Forbidden(error_text),
            404 => LlmError::NotFound(error_text),
            429 => LlmError::RateLimited(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into typed LlmError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            let error_text = e.to_string();
            Self::from_http_status(status, error_text)
        } else {
            LlmError::Other(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited("quota".to_string()).is_transient());
        assert!(LlmError::ServiceError("503".to_string()).is_transient());
        assert!(LlmError::Network("reset".to_string()).is_transient());
        assert!(LlmError::InvalidResponse("eof".to_string()).is_transient());
        assert!(LlmError::Other(anyhow::anyhow!("mystery")).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(!LlmError::BadRequest("bad mime".to_string()).is_transient());
        assert!(!LlmError::Unauthorized("bad key".to_string()).is_transient());
        assert!(!LlmError::Forbidden("no access".to_string()).is_transient());
        assert!(!LlmError::NotFound("no model".to_string()).is_transient());
        assert!(!LlmError::MissingCredential("GEMINI_API_KEY".to_string()).is_transient());
    }

    #[test]
    fn test_credential_problem() {
        assert!(LlmError::MissingCredential("K".to_string()).is_credential_problem());
        assert!(LlmError::Forbidden("x".to_string()).is_credential_problem());
        assert!(!LlmError::RateLimited("x".to_string()).is_credential_problem());
    }

    #[test]
    fn test_from_http_status() {
        let err =
            LlmError::from_http_status(reqwest::StatusCode::BAD_REQUEST, "Bad request".to_string());
        assert!(matches!(err, LlmError::BadRequest(_)));

        let err =
            LlmError::from_http_status(reqwest::StatusCode::FORBIDDEN, "Forbidden".to_string());
        assert!(matches!(err, LlmError::Forbidden(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded".to_string(),
        );
        assert!(matches!(err, LlmError::RateLimited(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "Overloaded".to_string(),
        );
        assert!(matches!(err, LlmError::ServiceError(_)));

        let err = LlmError::from_http_status(reqwest::StatusCode::IM_A_TEAPOT, "?".to_string());
        assert!(matches!(err, LlmError::Other(_)));
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::MissingCredential("GEMINI_API_KEY".to_string());
        assert_eq!(
            err.to_string(),
            "API key environment variable GEMINI_API_KEY is not set"
        );

        let err = LlmError::RateLimited("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Rate limited: quota exceeded");
    }
}
