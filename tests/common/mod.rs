#![allow(dead_code)]

use lms_api::config::cookie::CookieConfig;
use lms_api::config::jwt::JwtConfig;
use lms_api::services::email::Notifier;
use lms_api::services::media::{LocalMediaStore, MediaConfig, MediaStore};
use lms_api::utils::TokenIssuer;
use lms_api::{AppError, AppResult};
use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, Once,
};

static INIT: Once = Once::new();
static MIGRATIONS_RAN: AtomicBool = AtomicBool::new(false);
static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const TEST_PASSWORD: &str = "test_password_123";

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        std::env::set_var("FRONTEND_URL", "http://localhost:3000");
    });
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Captures outgoing mail instead of delivering it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<SentEmail>>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Fails every delivery, for exercising the forgot-password rollback.
pub struct FailingNotifier;

#[async_trait::async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _to: &str, _subject: &str, _html_body: &str) -> AppResult<()> {
        Err(AppError::Delivery("smtp unavailable".to_string()))
    }
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
    pub mailbox: RecordingNotifier,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }
}

pub async fn spawn_app() -> TestApp {
    let mailbox = RecordingNotifier::default();
    spawn_with(Arc::new(mailbox.clone()), mailbox).await
}

pub async fn spawn_app_with_failing_mail() -> TestApp {
    spawn_with(Arc::new(FailingNotifier), RecordingNotifier::default()).await
}

async fn spawn_with(notifier: Arc<dyn Notifier>, mailbox: RecordingNotifier) -> TestApp {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Run migrations only once globally (using atomic bool for thread safety)
    if !MIGRATIONS_RAN.swap(true, Ordering::SeqCst) {
        lms_api::migration::Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
    }

    // Clean data tables (reverse dependency order)
    cleanup_tables(&db).await;

    let issuer = TokenIssuer::new(&JwtConfig::from_env().expect("jwt config"));
    let cookie_config = CookieConfig::from_env();
    let media_config = MediaConfig {
        upload_dir: "./test_uploads".to_string(),
    };
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(media_config.clone()));

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(lms_api::routes::create_routes())
        .layer(axum::middleware::from_fn(
            lms_api::middleware::security::security_headers_middleware,
        ))
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(issuer))
        .layer(axum::extract::Extension(cookie_config))
        .layer(axum::extract::Extension(media_config))
        .layer(axum::extract::Extension(media))
        .layer(axum::extract::Extension(notifier));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
        mailbox,
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    for table in ["lectures", "courses", "users"] {
        db.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            format!("DELETE FROM {}", table),
        ))
        .await
        .unwrap_or_else(|e| panic!("Failed to clean table {}: {}", table, e));
    }
}

/// Register a fresh user through the API. Returns (user_id, token, email).
pub async fn create_test_user(app: &TestApp, name: &str) -> (i64, String, String) {
    let n = USER_COUNTER.fetch_add(1, Ordering::SeqCst);
    let email = format!("{name}_{n}@example.com");

    let form = reqwest::multipart::Form::new()
        .text("full_name", format!("{name} tester"))
        .text("email", email.clone())
        .text("password", TEST_PASSWORD);

    let resp = app
        .client
        .post(app.url("/user/register"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "registration should succeed");

    let body: Value = resp.json().await.unwrap();
    let user_id = body["data"]["user"]["id"].as_i64().unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();
    (user_id, token, email)
}

/// Register a user, promote it to ADMIN in the database, and log in
/// again so the fresh token carries the admin role claim.
pub async fn create_admin(app: &TestApp) -> String {
    let (user_id, _stale_token, email) = create_test_user(app, "admin").await;

    app.db
        .execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            format!("UPDATE users SET role = 'ADMIN' WHERE id = {user_id}"),
        ))
        .await
        .expect("Failed to promote user to admin");

    let resp = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["data"]["token"].as_str().unwrap().to_string()
}
