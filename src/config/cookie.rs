use std::env;

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: &'static str,
}

impl CookieConfig {
    /// The `Secure` attribute is tied to the deployment environment:
    /// cookies are HTTPS-only when APP_ENV=production.
    pub fn from_env() -> Self {
        let production = env::var("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let same_site = parse_same_site(
            &env::var("AUTH_COOKIE_SAMESITE").unwrap_or_else(|_| "Lax".to_string()),
        );

        // Browsers require SameSite=None cookies to also be Secure.
        let secure = production || same_site == "None";

        Self { secure, same_site }
    }
}

fn parse_same_site(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}
