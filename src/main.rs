mod config;
mod error;
mod handlers;
mod middleware;
mod migration;
mod models;
mod response;
mod routes;
mod services;
mod utils;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use config::cookie::CookieConfig;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use services::email::{EmailService, Notifier};
use services::media::{LocalMediaStore, MediaConfig, MediaStore};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::TokenIssuer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // User routes
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_profile,
        crate::handlers::auth::change_password,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,
        crate::handlers::user::update_profile,
        // Course routes
        crate::handlers::course::list_courses,
        crate::handlers::course::get_course_lectures,
        crate::handlers::course::create_course,
        crate::handlers::course::update_course,
        crate::handlers::course::delete_course,
        crate::handlers::course::add_lecture,
    ),
    components(
        schemas(
            crate::response::ApiResponse<serde_json::Value>,
            crate::error::AppError,
            // User
            crate::models::Role,
            crate::handlers::auth::RegisterData,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::ChangePasswordRequest,
            crate::handlers::auth::ForgotPasswordRequest,
            crate::handlers::auth::ResetPasswordRequest,
            crate::handlers::user::UpdateProfileData,
            // Course
            crate::handlers::course::CourseResponse,
            crate::handlers::course::LectureResponse,
            crate::handlers::course::CreateCourseData,
            crate::handlers::course::UpdateCourseRequest,
            crate::handlers::course::AddLectureData,
        )
    ),
    tags(
        (name = "user", description = "Account and credential-lifecycle operations"),
        (name = "courses", description = "Course and lecture management operations"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_api=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let (jwt_config, media_config) = validate_config()?;

    tracing::info!("Starting LMS API v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let issuer = TokenIssuer::new(&jwt_config);
    let cookie_config = CookieConfig::from_env();

    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(media_config.clone()));

    let email_service = EmailService::from_env();
    if email_service.is_configured() {
        tracing::info!("SMTP email service configured");
    } else {
        tracing::warn!("SMTP not configured, emails will be logged and skipped");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(email_service);

    let app = create_app(&media_config.upload_dir)
        .layer(Extension(db))
        .layer(Extension(issuer))
        .layer(Extension(cookie_config))
        .layer(Extension(media_config))
        .layer(Extension(media))
        .layer(Extension(notifier));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<(config::jwt::JwtConfig, MediaConfig)> {
    // JWT config, validated here; the issuer is built from it
    let jwt_config = config::jwt::JwtConfig::from_env()?;

    // DATABASE_URL is checked here for early error; actual connection happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    // Upload and staging directories, created if needed
    let media_config = MediaConfig::from_env();
    std::fs::create_dir_all(media_config.staging_dir()).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create upload directory '{}': {}",
            media_config.upload_dir,
            e
        )
    })?;

    Ok((jwt_config, media_config))
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app(upload_dir: &str) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ping", get(|| async { "pong" }))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(axum::middleware::from_fn(
            middleware::security::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "LMS API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
