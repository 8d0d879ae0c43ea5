use crate::{
    config::auth::AuthConfig,
    error::{AppError, AppResult},
    models::{user, Role, User, UserModel},
    services::email::Notifier,
    utils::{
        password::{hash_password_async, verify_password_async},
        reset_token,
    },
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    SqlErr,
};

/// Placeholder until the user uploads an avatar; the public id stays
/// keyed by email.
const DEFAULT_AVATAR_URL: &str = "/uploads/lms/default-avatar.png";

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn normalize_full_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub struct AuthService {
    db: DatabaseConnection,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AuthConfig::from_env(),
        }
    }

    pub fn with_config(db: DatabaseConnection, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Register a new user with the default role and a placeholder
    /// avatar. Email uniqueness is enforced by the database constraint,
    /// not a check-then-create; a unique violation maps to
    /// `DuplicateEmail`, so two concurrent registrations cannot both
    /// succeed.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> AppResult<UserModel> {
        let email = normalize_email(email);
        let full_name = normalize_full_name(full_name);
        let password_hash = hash_password_async(password.to_string()).await?;
        let now = chrono::Utc::now().naive_utc();

        let new_user = user::ActiveModel {
            full_name: Set(full_name),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            avatar_public_id: Set(email),
            avatar_url: Set(DEFAULT_AVATAR_URL.to_string()),
            role: Set(Role::User),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = new_user.insert(&self.db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::DuplicateEmail
            } else {
                AppError::Database(e)
            }
        })?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Unknown email and wrong password return the identical error.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserModel> {
        let email = normalize_email(email);
        let user = User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&self.db)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let is_valid =
            verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !is_valid {
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// On an old-password mismatch nothing is written. Sessions are
    /// stateless, so tokens issued before the change stay valid until
    /// their own expiry.
    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;

        let is_valid =
            verify_password_async(old_password.to_string(), user.password_hash.clone()).await?;
        if !is_valid {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = hash_password_async(new_password.to_string()).await?;
        let now = chrono::Utc::now().naive_utc();
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.updated_at = Set(now);
        active.update(&self.db).await?;
        Ok(())
    }

    /// Generate a reset secret, persist its digest and expiry, then mail
    /// the link. There is no cross-service transaction, so a delivery
    /// failure triggers a compensating rollback: the reset fields are
    /// cleared again before the error surfaces, and no token the user
    /// never received stays valid. Returns the recipient address.
    pub async fn forgot_password(&self, email: &str, notifier: &dyn Notifier) -> AppResult<String> {
        let email = normalize_email(email);
        let user = User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let (token, digest) = reset_token::generate()?;
        let now = chrono::Utc::now().naive_utc();

        let mut active: user::ActiveModel = user.into();
        active.password_reset_digest = Set(Some(digest));
        active.password_reset_expires = Set(Some(reset_token::expiry()));
        active.updated_at = Set(now);
        let user = active.update(&self.db).await?;

        let recipient = user.email.clone();
        let reset_url = format!("{}/reset-password/{}", self.config.frontend_url, token);
        let body = format!(
            "You can reset your password by clicking <a href=\"{reset_url}\" target=\"_blank\">Reset your password</a>.<br/>\
            If the above link does not work, copy and paste this URL into a new tab: {reset_url}<br/>\
            The link expires in {} minutes. If you have not requested this, kindly ignore.",
            reset_token::RESET_TOKEN_TTL_MINUTES
        );

        if let Err(e) = notifier.send(&recipient, "Reset Password", &body).await {
            let mut active: user::ActiveModel = user.into();
            active.password_reset_digest = Set(None);
            active.password_reset_expires = Set(None);
            active.updated_at = Set(chrono::Utc::now().naive_utc());
            active.update(&self.db).await?;
            tracing::warn!(email = %recipient, "reset email delivery failed, reset token rolled back");
            return Err(e);
        }

        tracing::info!(email = %recipient, "password reset email sent");
        Ok(recipient)
    }

    /// Consume a reset token: digest must match a record and the expiry
    /// must still be in the future. The digest is cleared on success, so
    /// a token works exactly once. Unknown and expired tokens fail with
    /// the same error.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let digest = reset_token::digest(token);
        let user = User::find()
            .filter(user::Column::PasswordResetDigest.eq(&digest))
            .one(&self.db)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        match user.password_reset_expires {
            Some(expires) if expires > chrono::Utc::now().naive_utc() => {}
            _ => return Err(AppError::InvalidOrExpiredToken),
        }

        let new_hash = hash_password_async(new_password.to_string()).await?;
        let now = chrono::Utc::now().naive_utc();
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.password_reset_digest = Set(None);
        active.password_reset_expires = Set(None);
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        Ok(())
    }
}
