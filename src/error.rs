//! Application error types.
//!
//! Errors are serializable so a view layer can render them as an inline
//! alert or a full-page "request failed" state without string parsing.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by the client core.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Local store operation failed.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Registry API answered with a non-success status.
    #[error("Registry API error: {message}")]
    RegistryApi {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Credentials missing, invalid, or expired.
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// CSRF token could not be obtained or was rejected twice.
    #[error("CSRF error: {message}")]
    Csrf { message: String },

    /// Registry answered 404 for `resource`.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Client-side validation failed; no request was issued.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a registry API error without status context.
    pub fn registry_api(message: impl Into<String>) -> Self {
        Self::RegistryApi {
            message: message.into(),
            status_code: None,
            endpoint: None,
        }
    }

    /// Create a registry API error with status code and endpoint.
    pub fn registry_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::RegistryApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn csrf(message: impl Into<String>) -> Self {
        Self::Csrf {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors that will not go away by asking again.
    ///
    /// Pollers use this to decide between rescheduling and stopping.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::NotFound { .. } | Self::InvalidInput { .. }
        )
    }

    /// HTTP status behind a registry error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RegistryApi { status_code, .. } => *status_code,
            Self::NotFound { .. } => Some(404),
            Self::Authentication { .. } => Some(401),
            _ => None,
        }
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to registry")
        } else if err.is_status() {
            Self::registry_api(format!("HTTP error: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}
