use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Malformed or incomplete appliance input. Lists the offending fields.
    Validation {
        /// Human-readable message.
        message: String,
        /// Names of the fields that are missing or out of range.
        fields: Vec<String>,
    },
    /// The AI model returned text we could not parse into a recommendation.
    /// Retryable: the client should resubmit.
    ResponseParse(String),
    /// The AI recommendation failed the pricing/sizing sanity checks.
    /// Retryable: carries the full list of violations.
    RecommendationInvalid(Vec<String>),
    /// The AI upstream is unreachable or the circuit breaker is open.
    /// Retryable.
    UpstreamUnavailable(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::Validation { message, fields } => {
                write!(f, "Validation error: {} (fields: {})", message, fields.join(", "))
            }
            AppError::ResponseParse(msg) => write!(f, "AI response parse error: {}", msg),
            AppError::RecommendationInvalid(issues) => {
                write!(f, "Recommendation rejected: {}", issues.join("; "))
            }
            AppError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Every failure is a well-formed JSON object. Retryable AI-pipeline
    /// failures carry `canRetry: true` so the caller knows resubmitting may
    /// succeed; input validation failures list the offending fields.
    fn into_response(self) -> Response {
        match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Validation { message, fields } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": message,
                    "required": fields,
                })),
            )
                .into_response(),
            AppError::ResponseParse(msg) => {
                tracing::warn!("AI response parse failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "message": "The recommendation service returned an unreadable result. Please retry.",
                        "canRetry": true,
                    })),
                )
                    .into_response()
            }
            AppError::RecommendationInvalid(issues) => {
                tracing::warn!("Recommendation rejected by validator: {:?}", issues);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "success": false,
                        "message": "The generated recommendation failed sanity checks. Please retry.",
                        "errors": issues,
                        "canRetry": true,
                    })),
                )
                    .into_response()
            }
            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "message": "The recommendation service is temporarily unavailable. Please retry.",
                        "canRetry": true,
                    })),
                )
                    .into_response()
            }
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                error_body(
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                error_body(StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "message": message,
        })),
    )
        .into_response()
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}
