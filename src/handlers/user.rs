use crate::error::{AppError, AppResult};
use crate::handlers::auth::{cleanup_staged, read_text_field, UserResponse};
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::media::{
    discard_staged, stage_upload, MediaConfig, MediaStore, UploadOptions,
};
use crate::services::user::UserService;
use axum::{extract::Multipart, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Multipart profile update; only the name and the avatar are mutable.
/// Role and email cannot be changed here.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileData {
    /// Full name (3-50 characters)
    #[validate(length(min = 3, max = 50))]
    pub full_name: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/v1/user/update",
    security(("jwt_token" = [])),
    request_body(content = UpdateProfileData, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "user"
)]
pub async fn update_profile(
    Extension(db): Extension<DatabaseConnection>,
    Extension(media): Extension<Arc<dyn MediaStore>>,
    Extension(media_config): Extension<MediaConfig>,
    auth_user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let mut full_name = None;
    let mut staged: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "full_name" => full_name = Some(read_text_field(field).await?),
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

    let payload = UpdateProfileData { full_name };
    if let Err(e) = payload.validate() {
        cleanup_staged(&staged).await;
        return Err(AppError::Validation(format!("Validation error: {e}")));
    }

    let avatar = match staged {
        Some(path) => {
            // Drop the previous avatar before storing the new one;
            // failure to delete is not fatal.
            let current = AuthService::new(db.clone()).get_user_by_id(user_id).await;
            if let Ok(user) = &current {
                if let Err(e) = media.delete(&user.avatar_public_id).await {
                    tracing::warn!(user_id, "failed to delete previous avatar: {e}");
                }
            }

            let uploaded = media.upload(&path, &UploadOptions::avatar()).await;
            discard_staged(&path).await;
            Some(uploaded?)
        }
        None => None,
    };

    let service = UserService::new(db);
    let user = service
        .update_profile(user_id, payload.full_name, avatar)
        .await?;

    Ok(ApiResponse::with_message(
        UserResponse::from(user),
        "User updated successfully".to_string(),
    ))
}
