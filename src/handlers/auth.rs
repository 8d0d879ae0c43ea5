use crate::config::cookie::CookieConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::{Role, UserModel};
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::email::Notifier;
use crate::services::media::{
    discard_staged, stage_upload, MediaConfig, MediaStore, UploadOptions,
};
use crate::services::user::UserService;
use crate::utils::cookie::{build_clear_cookie, build_session_cookie};
use crate::utils::TokenIssuer;
use anyhow::anyhow;
use axum::{
    extract::{Multipart, Path},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Fields of the multipart registration form; the optional `avatar`
/// file part is handled separately.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterData {
    /// Full name (3-50 characters)
    #[validate(length(min = 3, max = 50))]
    pub full_name: String,
    /// Email address
    #[validate(email)]
    pub email: String,
    /// Password (min 8 characters)
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// User password
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// JWT session token (also set as the `token` cookie)
    pub token: String,
    /// The authenticated user
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// User ID
    pub id: i32,
    /// Full name
    pub full_name: String,
    /// Email address
    pub email: String,
    /// Avatar URL
    pub avatar_url: String,
    /// User role (USER or ADMIN)
    pub role: Role,
    /// Creation timestamp
    pub created_at: String,
}

impl From<UserModel> for UserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            role: user.role,
            created_at: user.created_at.to_string(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/user/register",
    request_body(content = RegisterData, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 409, description = "Email already exists", body = AppError),
        (status = 502, description = "Avatar upload failed (user is still created)", body = AppError),
    ),
    tag = "user"
)]
pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(issuer): Extension<TokenIssuer>,
    Extension(cookie_config): Extension<CookieConfig>,
    Extension(media): Extension<Arc<dyn MediaStore>>,
    Extension(media_config): Extension<MediaConfig>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut full_name = None;
    let mut email = None;
    let mut password = None;
    let mut staged: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "full_name" => full_name = Some(read_text_field(field).await?),
            "email" => email = Some(read_text_field(field).await?),
            "password" => password = Some(read_text_field(field).await?),
            "avatar" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                staged = Some(stage_upload(&media_config, &data).await?);
            }
            _ => {}
        }
    }

    let payload = match (full_name, email, password) {
        (Some(full_name), Some(email), Some(password)) => RegisterData {
            full_name,
            email,
            password,
        },
        _ => {
            cleanup_staged(&staged).await;
            return Err(AppError::Validation("All fields are required".to_string()));
        }
    };

    if let Err(e) = payload.validate() {
        cleanup_staged(&staged).await;
        return Err(AppError::Validation(format!("Validation error: {e}")));
    }

    let service = AuthService::new(db.clone());
    let user = match service
        .register(&payload.full_name, &payload.email, &payload.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            cleanup_staged(&staged).await;
            return Err(e);
        }
    };

    // The user exists from here on; a failed avatar upload surfaces an
    // error but does not roll the account back.
    let user = match staged {
        Some(path) => {
            let uploaded = media.upload(&path, &UploadOptions::avatar()).await;
            discard_staged(&path).await;
            let stored = uploaded?;
            UserService::new(db).update_avatar(user.id, stored).await?
        }
        None => user,
    };

    let token = issuer.issue(&user)?;
    let response = AuthResponse {
        token: token.clone(),
        user: UserResponse::from(user),
    };

    let mut http_response =
        ApiResponse::with_message(response, "User registered successfully".to_string())
            .into_response();
    set_session_cookie(&mut http_response, &cookie_config, &issuer, &token)?;
    Ok(http_response)
}

#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Email or password does not match", body = AppError),
    ),
    tag = "user"
)]
pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Extension(issuer): Extension<TokenIssuer>,
    Extension(cookie_config): Extension<CookieConfig>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }

    let service = AuthService::new(db);
    let user = service.login(&payload.email, &payload.password).await?;

    let token = issuer.issue(&user)?;
    let response = AuthResponse {
        token: token.clone(),
        user: UserResponse::from(user),
    };

    let mut http_response =
        ApiResponse::with_message(response, "User logged in successfully".to_string())
            .into_response();
    set_session_cookie(&mut http_response, &cookie_config, &issuer, &token)?;
    Ok(http_response)
}

#[utoipa::path(
    post,
    path = "/api/v1/user/logout",
    responses(
        (status = 200, description = "Logout successful", body = String),
    ),
    tag = "user"
)]
pub async fn logout(
    Extension(cookie_config): Extension<CookieConfig>,
) -> AppResult<impl IntoResponse> {
    let mut response = ApiResponse::with_message((), "User logged out successfully".to_string())
        .into_response();
    append_set_cookie(&mut response, &build_clear_cookie(&cookie_config))?;
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Current user retrieved successfully", body = UserResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "User no longer exists", body = AppError),
    ),
    tag = "user"
)]
pub async fn get_profile(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = AuthService::new(db);
    let user = service.get_user_by_id(user_id).await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password
    pub old_password: String,
    /// New password (min 8 characters)
    #[validate(length(min = 8))]
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/user/change-password",
    security(("jwt_token" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed successfully", body = String),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Old password mismatch", body = AppError),
    ),
    tag = "user"
)]
pub async fn change_password(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let service = AuthService::new(db);
    service
        .change_password(user_id, &payload.old_password, &payload.new_password)
        .await?;

    Ok(ApiResponse::with_message(
        (),
        "Password changed successfully".to_string(),
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    /// Email address
    #[validate(email)]
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/user/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = String),
        (status = 404, description = "Email is not registered", body = AppError),
        (status = 502, description = "Email delivery failed, reset token rolled back", body = AppError),
    ),
    tag = "user"
)]
pub async fn forgot_password(
    Extension(db): Extension<DatabaseConnection>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = AuthService::new(db);
    let email = service
        .forgot_password(&payload.email, notifier.as_ref())
        .await?;

    Ok(ApiResponse::with_message(
        (),
        format!("Reset password token has been sent to {email} successfully"),
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    /// New password (min 8 characters)
    #[validate(length(min = 8))]
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/user/reset-password/{token}",
    params(("token" = String, Path, description = "Reset token from the emailed link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed successfully", body = String),
        (status = 400, description = "Token is invalid or expired", body = AppError),
    ),
    tag = "user"
)]
pub async fn reset_password(
    Extension(db): Extension<DatabaseConnection>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = AuthService::new(db);
    service.reset_password(&token, &payload.password).await?;

    Ok(ApiResponse::with_message(
        (),
        "Password changed successfully".to_string(),
    ))
}

pub(crate) async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

pub(crate) async fn cleanup_staged(staged: &Option<PathBuf>) {
    if let Some(path) = staged {
        discard_staged(path).await;
    }
}

fn set_session_cookie(
    response: &mut Response,
    config: &CookieConfig,
    issuer: &TokenIssuer,
    token: &str,
) -> AppResult<()> {
    append_set_cookie(
        response,
        &build_session_cookie(config, token, issuer.ttl_seconds()),
    )
}

fn append_set_cookie(response: &mut Response, cookie_value: &str) -> AppResult<()> {
    let value = HeaderValue::from_str(cookie_value).map_err(|e| {
        AppError::Internal(anyhow!("Failed to build Set-Cookie header value: {}", e))
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}
