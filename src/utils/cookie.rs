use crate::config::cookie::CookieConfig;
use axum::http::{header, HeaderMap};

/// Name of the session cookie carrying the JWT.
pub const SESSION_COOKIE: &str = "token";

pub fn build_session_cookie(config: &CookieConfig, value: &str, max_age_seconds: u64) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={value}; Path=/; Max-Age={max_age_seconds}; HttpOnly; SameSite={}",
        config.same_site
    );

    if config.secure {
        cookie.push_str("; Secure");
    }

    cookie
}

/// Max-Age=0 expires the cookie immediately; logout is idempotent.
pub fn build_clear_cookie(config: &CookieConfig) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite={}",
        config.same_site
    );

    if config.secure {
        cookie.push_str("; Secure");
    }

    cookie
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie_header| {
            cookie_header.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                let key = parts.next()?.trim();
                let value = parts.next()?.trim();
                if key == name {
                    Some(value.to_string())
                } else {
                    None
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn dev_config() -> CookieConfig {
        CookieConfig {
            secure: false,
            same_site: "Lax",
        }
    }

    #[test]
    fn session_cookie_is_http_only_with_max_age() {
        let cookie = build_session_cookie(&dev_config(), "jwt-value", 604800);
        assert!(cookie.starts_with("token=jwt-value"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn production_cookie_is_secure() {
        let config = CookieConfig {
            secure: true,
            same_site: "Lax",
        };
        let cookie = build_session_cookie(&config, "jwt-value", 604800);
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = build_clear_cookie(&dev_config());
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn extract_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; token=abc.def.ghi; b=2"),
        );
        assert_eq!(
            extract_cookie(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }
}
