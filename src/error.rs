use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Email or password does not match")]
    InvalidCredentials,

    #[error("Token is invalid or expired")]
    InvalidOrExpiredToken,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Payload too large")]
    PayloadTooLarge,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl utoipa::ToSchema for AppError {
    fn name() -> std::borrow::Cow<'static, str> {
        "ErrorResponse".into()
    }
}

impl utoipa::PartialSchema for AppError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        ErrorResponse::schema()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            // Same message whether the email is unknown or the password
            // is wrong: must not reveal which emails are registered.
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Email or password does not match".to_string(),
            ),
            // Same message whether the token is unknown or merely expired.
            AppError::InvalidOrExpiredToken => (
                StatusCode::BAD_REQUEST,
                "Token is invalid or expired, please try again".to_string(),
            ),
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DuplicateEmail => {
                (StatusCode::CONFLICT, "Email already exists".to_string())
            }
            AppError::Upload(msg) => {
                tracing::error!("Upload failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "File upload failed".to_string())
            }
            AppError::Delivery(msg) => {
                tracing::error!("Email delivery failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to send email, please try again later".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "File too large".to_string())
            }
        };

        let body = json!({
            "error": error_message,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credentials_is_401_with_generic_message() {
        let resp = AppError::InvalidCredentials.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_or_expired_token_is_400() {
        let resp = AppError::InvalidOrExpiredToken.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let resp = AppError::DuplicateEmail.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn collaborator_failures_are_5xx() {
        let resp = AppError::Delivery("smtp down".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let resp = AppError::Upload("disk full".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
