use crate::{
    error::AppError,
    models::Role,
    utils::{
        cookie::{extract_cookie, SESSION_COOKIE},
        TokenIssuer,
    },
};
use axum::{
    extract::{FromRequestParts, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
    Extension,
};

/// Identity extracted from a verified session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// Session authentication middleware.
///
/// Verifies the JWT from the `token` cookie (or an Authorization:
/// Bearer header) and adds the claims to request extensions. Sessions
/// are stateless: no database round-trip here, and expiry is the only
/// cutoff.
pub async fn auth_middleware(
    Extension(issuer): Extension<TokenIssuer>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&headers)
        .or_else(|| extract_cookie(&headers, SESSION_COOKIE))
        .ok_or(AppError::Unauthorized)?;

    let claims = issuer.verify(&token).map_err(|_| AppError::Unauthorized)?;

    let auth_user = AuthUser {
        user_id: claims.sub,
        email: claims.email,
        role: claims.role,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Parse user_id from AuthUser string to i32
pub fn parse_user_id(auth_user: &AuthUser) -> crate::error::AppResult<i32> {
    auth_user
        .user_id
        .parse()
        .map_err(|_| AppError::Validation("Invalid user ID".to_string()))
}

/// Verify the current session carries the admin role.
pub fn require_admin(auth_user: &AuthUser) -> crate::error::AppResult<i32> {
    if auth_user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    parse_user_id(auth_user)
}

/// Extractor for AuthUser from request extensions
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
