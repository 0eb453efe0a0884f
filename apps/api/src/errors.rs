use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Raised while building the registry, override table or weights.
/// Every variant is fatal at start-up; no scan ever runs against a bad table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field type '{field_type}': invalid keyword '{keyword}': {source}")]
    InvalidKeyword {
        field_type: String,
        keyword: String,
        #[source]
        source: regex::Error,
    },

    #[error("field type '{field_type}': invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        field_type: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("field type '{0}' is declared more than once")]
    DuplicateFieldType(String),

    #[error("field type #{0} has an empty name")]
    EmptyFieldType(usize),

    #[error("field type '{0}' has no keywords or patterns")]
    NoSignals(String),

    #[error("field type '{0}' has no categories")]
    NoCategories(String),

    #[error("site override '{site}': invalid selector '{selector}' for '{field_type}': {reason}")]
    InvalidSelector {
        site: String,
        field_type: String,
        selector: String,
        reason: String,
    },

    #[error("site override '{site}' references unknown field type '{field_type}'")]
    UnknownFieldType { site: String, field_type: String },

    #[error("site override '{0}' has no domains")]
    NoDomains(String),

    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-element failure during a scan. The element is skipped, the scan goes on.
#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    #[error("element #{ordinal} is no longer attached to the document")]
    Detached { ordinal: usize },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Config(e) => {
                tracing::error!("Configuration error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "The detection engine is misconfigured".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
