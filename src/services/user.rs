use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
    services::auth::normalize_full_name,
    services::media::StoredMedia,
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Mutates only the mutable profile fields: full name and avatar.
    /// Role and email cannot be changed through this path.
    pub async fn update_profile(
        &self,
        user_id: i32,
        full_name: Option<String>,
        avatar: Option<StoredMedia>,
    ) -> AppResult<UserModel> {
        let existing = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = chrono::Utc::now().naive_utc();

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = full_name {
            active.full_name = Set(normalize_full_name(&name));
        }
        if let Some(media) = avatar {
            active.avatar_public_id = Set(media.public_id);
            active.avatar_url = Set(media.secure_url);
        }
        active.updated_at = Set(now);

        let updated = active.update(&self.db).await?;
        Ok(updated)
    }

    /// Replace only the avatar (used right after a media upload).
    pub async fn update_avatar(&self, user_id: i32, media: StoredMedia) -> AppResult<UserModel> {
        self.update_profile(user_id, None, Some(media)).await
    }
}
