//! Error types for ArcGIS adapter operations
//!
//! Every failure the adapter can report maps onto one `ArcgisError` variant.
//! `kind()` gives the stable tag that is sent across the tool boundary.

use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArcgisError>;

#[derive(Debug, Clone, Error)]
pub enum ArcgisError {
    /// Missing or invalid credentials/endpoints. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token issuance failed
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// A call exceeded its per-call timeout. Never retried automatically.
    #[error("Request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    /// Connection failure, non-2xx status or an unreadable response body
    #[error("{}", network_message(.endpoint, .status, .detail))]
    Network {
        endpoint: String,
        status: Option<u16>,
        detail: String,
    },

    /// Service resolution failed
    #[error("Service '{name}' not found in folder '{folder}'")]
    NotFound { name: String, folder: String },

    /// The backend rejected a query
    #[error("Query failed: {message}")]
    Query { message: String, details: Vec<String> },

    /// A tool argument was missing or had the wrong type
    #[error("Invalid argument '{field}': {message}")]
    Validation { field: String, message: String },
}

fn network_message(endpoint: &str, status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("HTTP {} from {}: {}", code, endpoint, detail),
        None => format!("Request to {} failed: {}", endpoint, detail),
    }
}

impl ArcgisError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn network(endpoint: impl Into<String>, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            folder: folder.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable snake_case tag for this error
    pub fn kind(&self) -> &'static str {
        match self {
            ArcgisError::Config(_) => "config_error",
            ArcgisError::Auth { .. } => "auth_error",
            ArcgisError::Timeout { .. } | ArcgisError::Network { .. } => "network_error",
            ArcgisError::NotFound { .. } => "not_found",
            ArcgisError::Query { .. } => "query_error",
            ArcgisError::Validation { .. } => "validation_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ArcgisError::Timeout { .. })
    }

    /// Structured detail attached to error envelopes
    pub fn details(&self) -> Option<Value> {
        match self {
            ArcgisError::Network { status, detail, .. } => Some(json!({
                "status": status,
                "text": detail,
            })),
            ArcgisError::NotFound { name, folder } => Some(json!({
                "name": name,
                "folder": folder,
            })),
            ArcgisError::Query { details, .. } if !details.is_empty() => Some(json!(details)),
            ArcgisError::Validation { field, .. } => Some(json!({ "field": field })),
            _ => None,
        }
    }

    /// Map an ArcGIS `{"error": {...}}` body to an error.
    ///
    /// ArcGIS reports most failures with HTTP 200 and an error object; codes
    /// 498/499 mean the token was rejected.
    pub fn from_body(endpoint: &str, body: &Value) -> Option<Self> {
        let error = body.get("error")?;
        let code = error.get("code").and_then(|c| c.as_u64()).and_then(|c| u16::try_from(c).ok());
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();

        match code {
            Some(498) | Some(499) => Some(ArcgisError::auth(message)),
            _ => Some(ArcgisError::network(endpoint, code, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ArcgisError::config("x").kind(), "config_error");
        assert_eq!(ArcgisError::auth("x").kind(), "auth_error");
        assert_eq!(
            ArcgisError::Timeout { endpoint: "a".into(), seconds: 10 }.kind(),
            "network_error"
        );
        assert_eq!(ArcgisError::not_found("a", "").kind(), "not_found");
    }

    #[test]
    fn test_not_found_message() {
        let err = ArcgisError::not_found("Unknown", "");
        assert_eq!(err.to_string(), "Service 'Unknown' not found in folder ''");
    }

    #[test]
    fn test_network_message_with_status() {
        let err = ArcgisError::network("Hosted", Some(503), "Service Unavailable");
        assert_eq!(err.to_string(), "HTTP 503 from Hosted: Service Unavailable");
    }

    #[test]
    fn test_from_body_token_rejected() {
        let body = json!({"error": {"code": 498, "message": "Invalid token."}});
        let err = ArcgisError::from_body("Hosted", &body).unwrap();
        assert!(matches!(err, ArcgisError::Auth { .. }));
    }

    #[test]
    fn test_from_body_out_of_range_code() {
        // 66034 would wrap to 498 if narrowed blindly
        let body = json!({"error": {"code": 66034, "message": "Strange failure"}});
        let err = ArcgisError::from_body("Hosted", &body).unwrap();
        assert_eq!(err.kind(), "network_error");
        assert_eq!(err.details().unwrap()["status"], Value::Null);
    }

    #[test]
    fn test_from_body_without_error() {
        let body = json!({"services": []});
        assert!(ArcgisError::from_body("", &body).is_none());
    }
}
