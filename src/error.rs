use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::OnceLock;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Process-wide deployment mode, set once at startup. Controls whether
/// unexpected errors leak their detail to the caller.
static PRODUCTION: OnceLock<bool> = OnceLock::new();

pub fn set_production_mode(production: bool) {
    let _ = PRODUCTION.set(production);
}

fn production_mode() -> bool {
    *PRODUCTION.get().unwrap_or(&false)
}

/// Typed failure taxonomy for all flows. Every variant carries its HTTP
/// status; handlers return `Result<T, ApiError>` and let the transport
/// boundary format the response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Email dispatch failed; the flow has already rolled back any token
    /// state it wrote optimistically.
    #[error("{0}")]
    Delivery(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Delivery(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(err) => {
                error!(error = %err, "unexpected error");
                if production_mode() {
                    "Something went wrong".to_string()
                } else {
                    format!("{err:#}")
                }
            }
            ApiError::Delivery(msg) => {
                error!(error = %msg, "email delivery failed");
                msg.clone()
            }
            other => other.to_string(),
        };
        let label = if status.is_client_error() { "fail" } else { "error" };
        (status, Json(json!({ "status": label, "message": message }))).into_response()
    }
}

/// Translate driver-level errors into the taxonomy before the response layer
/// sees them; raw sqlx errors never reach the client.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                if db.constraint().is_some_and(|c| c.contains("email")) {
                    ApiError::Conflict("Email already registered".into())
                } else if db.constraint().is_some_and(|c| c.contains("phone")) {
                    ApiError::Conflict("Phone number already registered".into())
                } else {
                    ApiError::Conflict("Duplicate value".into())
                }
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Delivery("smtp down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn display_carries_the_message() {
        let err = ApiError::Unauthorized("Incorrect email or password".into());
        assert_eq!(err.to_string(), "Incorrect email or password");
    }
}
