use std::env;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL the password-reset link points at.
    pub frontend_url: String,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        Self { frontend_url }
    }
}
