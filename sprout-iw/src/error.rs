//! Error types for sprout-iw
//!
//! Every workflow failure is a distinct, named variant recovered at the
//! boundary of the operation that caused it; nothing here is coerced into
//! a default or retried automatically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sprout_common::types::{SessionDelivery, SessionFormat, SessionStatus};
use thiserror::Error;
use uuid::Uuid;

use crate::wrapup::WrapUpStep;

/// Main error type for the sprout-iw module
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O and socket errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared-crate errors (timestamp parsing, config, ...)
    #[error(transparent)]
    Common(#[from] sprout_common::Error),

    /// State machine asked to leave a terminal or incompatible state
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Workflow asked to advance past a step whose predicate fails
    #[error("Step '{step}' incomplete: {missing}")]
    IncompleteStep { step: WrapUpStep, missing: String },

    /// Artifact marked needs-revision without feedback text
    #[error("Feedback required to mark artifact {artifact_id} needs-revision")]
    MissingFeedback { artifact_id: Uuid },

    /// Finalization attempted on a session that is not wrap-up-pending,
    /// or whose wrap-up is already completed
    #[error("Finalize conflict: {0}")]
    FinalizeConflict(String),

    /// Another instructor holds the in-progress draft for this session
    #[error("Wrap-up for session {session_id} already in progress")]
    DraftConflict { session_id: Uuid },

    /// Unknown (format, delivery) pair in the rate table
    #[error("No rate configured for {} / {}", .format.as_str(), .delivery.as_str())]
    RateLookupMiss {
        format: SessionFormat,
        delivery: SessionDelivery,
    },

    /// Instructor has no open pay period to post into
    #[error("No open pay period for instructor {instructor_id}")]
    NoOpenPayPeriod { instructor_id: Uuid },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (fatal, aborts the operation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using sprout-iw Error
pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::MissingFeedback { .. } => StatusCode::BAD_REQUEST,
            Error::IncompleteStep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::FinalizeConflict(_) => StatusCode::CONFLICT,
            Error::DraftConflict { .. } => StatusCode::CONFLICT,
            Error::RateLookupMiss { .. }
            | Error::NoOpenPayPeriod { .. }
            | Error::Config(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Common(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
