use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use crate::middleware::auth::auth_middleware;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config);
    let protected =
        protected_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected)
}

/// Credential-lifecycle routes reachable without a session.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/user/register", routing::post(handlers::register))
        .route("/user/login", routing::post(handlers::login))
        // Logout only clears the cookie, so it needs no session.
        .route("/user/logout", routing::post(handlers::auth::logout))
        .route(
            "/user/forgot-password",
            routing::post(handlers::auth::forgot_password),
        )
        .route(
            "/user/reset-password/{token}",
            routing::post(handlers::auth::reset_password),
        );

    with_optional_rate_limit(router, config.enabled, config.auth)
}

/// Public reads: the course catalog.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new().route("/courses", routing::get(handlers::course::list_courses));

    with_optional_rate_limit(router, config.enabled, config.public_read)
}

/// Routes behind the session middleware.
fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/user/me", routing::get(handlers::auth::get_profile))
        .route("/user/update", routing::put(handlers::user::update_profile))
        .route(
            "/user/change-password",
            routing::post(handlers::auth::change_password),
        )
        // Course mutation is admin-only (checked in the handlers).
        .route("/courses", routing::post(handlers::course::create_course))
        .route(
            "/courses/{id}",
            routing::put(handlers::course::update_course)
                .delete(handlers::course::delete_course),
        )
        .route(
            "/courses/{id}/lectures",
            routing::get(handlers::course::get_course_lectures)
                .post(handlers::course::add_lecture),
        );

    with_optional_rate_limit(router, config.enabled, config.protected)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
        .expect("Invalid rate limit configuration");

    router.layer(GovernorLayer::new(governor_conf))
}
