use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

// ─── Startup misconfiguration ────────────────────────────────────

/// Rejected metrics settings. Raised while building the collector so a bad
/// flag stops the process at startup instead of surfacing per request.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample window capacity must be at least 1")]
    ZeroCapacity,

    #[error("histogram log interval must be at least 1")]
    ZeroLogInterval,

    #[error("{name} budget must be a positive finite number, got {value}")]
    InvalidBudget { name: &'static str, value: f64 },

    #[error("histogram needs at least one bucket boundary")]
    EmptyBuckets,

    #[error("histogram bucket boundaries must be positive, finite and strictly ascending: {0:?}")]
    UnorderedBuckets(Vec<f64>),

    #[error("report queue depth must be at least 1")]
    ZeroReportQueue,
}

// ─── HTTP-facing errors ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    /// Payload failed validation. Carries a machine code and one
    /// message per violated rule.
    Validation {
        code: &'static str,
        details: Vec<String>,
    },
    NotFound(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub code: String,
    pub details: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation { code, details } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Bad Request",
                    code: code.into(),
                    details,
                },
            ),
            Self::NotFound(path) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "Not Found",
                    code: "NOT_FOUND".into(),
                    details: vec![format!("no route for {path}")],
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
