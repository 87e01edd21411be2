use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;

/// ApiError
///
/// Every failure a request can end in. Each variant maps to exactly one HTTP status and the
/// body is always `{"error": "..."}`. There is no retry anywhere: a failed store call is
/// surfaced to the caller as is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid API key")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("User not found")]
    NotFound,
    /// The message is logged, never sent to the client.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed with an internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// RepositoryError
///
/// Failures reported by the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A non-zero GitHub or Telegram id is already registered.
    #[error("user already exists")]
    Duplicate,
    /// A role that should have been seeded at startup is absent.
    #[error("role \"{0}\" is missing from the roles table")]
    MissingRole(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Maps a Postgres unique violation (SQLSTATE 23505) to `Duplicate`.
    pub fn from_write(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::Duplicate
            }
            _ => RepositoryError::Database(err),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate => ApiError::Conflict("User already exists".to_string()),
            RepositoryError::MissingRole(_) | RepositoryError::Database(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_errors_convert() {
        assert_eq!(
            ApiError::from(RepositoryError::Duplicate),
            ApiError::Conflict("User already exists".to_string())
        );
        assert!(matches!(
            ApiError::from(RepositoryError::MissingRole("student".into())),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(RepositoryError::from_write(sqlx::Error::RowNotFound)),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn internal_details_are_not_exposed() {
        let response = ApiError::Internal("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }
}
