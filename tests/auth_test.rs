mod common;

use sea_orm::ConnectionTrait;
use serde_json::Value;

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn register_and_login_round_trip() {
    let app = common::spawn_app().await;

    let form = reqwest::multipart::Form::new()
        .text("full_name", "Jane Doe")
        .text("email", "jane@x.com")
        .text("password", "secret123");

    let resp = app
        .client
        .post(app.url("/user/register"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let raw = resp.text().await.unwrap();
    // The password never appears in any payload, hashed or otherwise.
    assert!(!raw.contains("password_hash"));
    assert!(!raw.contains("secret123"));

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert!(body["success"].as_bool().unwrap());
    assert!(body["data"]["token"].as_str().is_some());
    // Name and email are case-normalized, role defaults to USER and the
    // placeholder avatar is in place.
    assert_eq!(body["data"]["user"]["full_name"], "jane doe");
    assert_eq!(body["data"]["user"]["email"], "jane@x.com");
    assert_eq!(body["data"]["user"]["role"], "USER");
    assert!(body["data"]["user"]["avatar_url"].as_str().is_some());

    // Login with the same credentials succeeds and sets the cookie.
    let resp = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": "Jane@X.com ", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let cookies: Vec<String> = resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("token=") && c.contains("HttpOnly") && c.contains("Max-Age=604800")));

    let body: Value = resp.json().await.unwrap();
    let token = body["data"]["token"].as_str().unwrap();

    // The issued token authenticates /user/me.
    let resp = app
        .client
        .get(app.url("/user/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["full_name"], "jane doe");
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn session_cookie_authenticates_requests() {
    let app = common::spawn_app().await;
    let (_id, token, _email) = common::create_test_user(&app, "cookie_user").await;

    let resp = app
        .client
        .get(app.url("/user/me"))
        .header("Cookie", format!("token={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn register_duplicate_email_fails_with_conflict() {
    let app = common::spawn_app().await;

    for expected in [200, 409] {
        let form = reqwest::multipart::Form::new()
            .text("full_name", "Bob Smith")
            .text("email", "bob@example.com")
            .text("password", "password_123");

        let resp = app
            .client
            .post(app.url("/user/register"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }

    // No second record was created.
    let count = app
        .db
        .query_one(sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT COUNT(*)::BIGINT AS n FROM users WHERE email = 'bob@example.com'".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let n: i64 = count.try_get("", "n").unwrap();
    assert_eq!(n, 1);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn register_with_missing_fields_fails() {
    let app = common::spawn_app().await;

    let form = reqwest::multipart::Form::new()
        .text("full_name", "No Password")
        .text("email", "nopw@example.com");

    let resp = app
        .client
        .post(app.url("/user/register"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn wrong_password_and_unknown_email_fail_identically() {
    let app = common::spawn_app().await;
    let (_id, _token, email) = common::create_test_user(&app, "charlie").await;

    let wrong_password = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": email, "password": "wrongpass" }))
        .send()
        .await
        .unwrap();
    let unknown_email = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": "unknown@x.com", "password": "x" }))
        .send()
        .await
        .unwrap();

    // Identical status and body: the error must not reveal which
    // emails are registered.
    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_email.status(), 401);
    let body_a: Value = wrong_password.json().await.unwrap();
    let body_b: Value = unknown_email.json().await.unwrap();
    assert_eq!(body_a, body_b);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn logout_clears_the_session_cookie() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/user/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let cookies: Vec<String> = resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("token=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn me_requires_a_session() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/user/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn change_password_rejects_wrong_old_password() {
    let app = common::spawn_app().await;
    let (_id, token, email) = common::create_test_user(&app, "dave").await;

    let resp = app
        .client
        .post(app.url("/user/change-password"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "old_password": "not_the_password",
            "new_password": "new_password_456"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The stored hash is unchanged: the old password still logs in.
    let resp = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": email, "password": common::TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn change_password_rotates_the_credential() {
    let app = common::spawn_app().await;
    let (_id, token, email) = common::create_test_user(&app, "erin").await;

    let resp = app
        .client
        .post(app.url("/user/change-password"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "old_password": common::TEST_PASSWORD,
            "new_password": "new_password_456"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let old = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": email, "password": common::TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), 401);

    let new = app
        .client
        .post(app.url("/user/login"))
        .json(&serde_json::json!({ "email": email, "password": "new_password_456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), 200);

    // Stateless sessions: the token issued before the change stays
    // valid until its own expiry.
    let me = app
        .client
        .get(app.url("/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
}
