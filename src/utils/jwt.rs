use crate::config::jwt::JwtConfig;
use crate::error::AppResult;
use crate::models::{Role, UserModel};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Identity facts embedded in a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: Role,
    pub exp: usize, // expiration time
    pub iat: usize, // issued at
}

/// Signs and verifies session tokens. Built once from [`JwtConfig`] at
/// startup and handed to handlers/middleware explicitly; the signing
/// secret is process configuration, not user data.
///
/// Tokens are stateless: expiry is the only cutoff, there is no
/// revocation list. Immediate logout relies on the client discarding
/// the cookie.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl_seconds: config.session_ttl_seconds,
        }
    }

    /// Session TTL in seconds; also used for the cookie Max-Age.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn issue(&self, user: &UserModel) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: now + self.ttl_seconds as usize,
            iat: now,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Fails on a bad signature or an expired token.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}
