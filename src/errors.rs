use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No configuration record exists for the name. A valid state, not a failure.
    #[error("backend not configured")]
    NotConfigured,

    #[error("{0}: nil value")]
    MissingDependency(&'static str),

    #[error("{field}: invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("required fields missing: {}", .0.join(", "))]
    FieldsRequired(Vec<&'static str>),

    #[error("access token not found")]
    CredentialNotFound,

    #[error("{operation}: {message}")]
    Remote { operation: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Remote {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CredentialNotFound)
    }

    /// Prefix remote failures with the operation being performed. Every other
    /// variant is returned untouched so callers can still match on it.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Error::Remote { operation, message } => Error::Remote {
                operation: format!("{}: {}", context, operation),
                message,
            },
            other => other,
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::NotConfigured => (StatusCode::BAD_REQUEST, "not_configured"),
            Error::MissingDependency(_) => (StatusCode::BAD_REQUEST, "missing_dependency"),
            Error::InvalidValue { .. } => (StatusCode::BAD_REQUEST, "invalid_value"),
            Error::FieldsRequired(_) => (StatusCode::BAD_REQUEST, "field_required"),
            Error::CredentialNotFound => (StatusCode::NOT_FOUND, "credential_not_found"),
            Error::Remote { .. } => (StatusCode::BAD_GATEWAY, "remote_failure"),
            Error::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Error::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
