//! Classifies an opaque `anyhow::Error` from a [`catalog_sync_core::RemoteCatalog`]
//! or [`catalog_sync_core::InventoryRemote`] call into an [`ErrorClass`] (spec §4.1).
//!
//! These collaborators return `anyhow::Result`, so the concrete transport
//! error is not visible here. Classification falls back to matching the
//! rendered error text for the markers an HTTP client customarily leaves in
//! its error messages (status codes, "timed out", "rate limit"); a remote
//! client wanting precise classification should downcast its own error type
//! and implement [`Classify`] directly instead of going through this path.

use catalog_sync_core::resilience::{Classify, ErrorClass};

pub struct RemoteCallError(pub anyhow::Error);

impl std::fmt::Display for RemoteCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<anyhow::Error> for RemoteCallError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl Classify for RemoteCallError {
    fn classify(&self) -> ErrorClass {
        let message = self.0.to_string().to_lowercase();

        if message.contains("429") || message.contains("rate limit") {
            ErrorClass::RateLimited
        } else if message.contains("quota") {
            ErrorClass::QuotaExceeded
        } else if message.contains("401") || message.contains("unauthorized") {
            ErrorClass::AuthRequired
        } else if message.contains("token expired") || message.contains("expired token") {
            ErrorClass::TokenExpired
        } else if message.contains("403") || message.contains("permission denied") || message.contains("forbidden") {
            ErrorClass::PermissionDenied
        } else if message.contains("404") || message.contains("not found") {
            ErrorClass::NotFound
        } else if message.contains("400") || message.contains("invalid request") {
            ErrorClass::InvalidRequest
        } else if message.contains("validation") {
            ErrorClass::Validation
        } else if message.contains("503") || message.contains("service unavailable") {
            ErrorClass::ServiceUnavailable
        } else if message.contains("50") && (message.contains("status") || message.contains("server error")) {
            ErrorClass::Server5xx
        } else if message.contains("timed out") || message.contains("timeout") {
            ErrorClass::Timeout
        } else {
            ErrorClass::NetworkUnavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(message: &str) -> RemoteCallError {
        RemoteCallError(anyhow::anyhow!(message.to_string()))
    }

    #[test]
    fn recognizes_rate_limit_markers() {
        assert_eq!(err("HTTP 429 Too Many Requests").classify(), ErrorClass::RateLimited);
    }

    #[test]
    fn recognizes_auth_markers() {
        assert_eq!(err("401 Unauthorized").classify(), ErrorClass::AuthRequired);
    }

    #[test]
    fn recognizes_timeout_markers() {
        assert_eq!(err("request timed out after 30s").classify(), ErrorClass::Timeout);
    }

    #[test]
    fn unrecognized_markers_default_to_network_unavailable() {
        assert_eq!(err("connection reset by peer").classify(), ErrorClass::NetworkUnavailable);
    }
}
