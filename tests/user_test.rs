mod common;

use serde_json::Value;

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn update_profile_changes_the_name() {
    let app = common::spawn_app().await;
    let (_id, token, _email) = common::create_test_user(&app, "renate").await;

    let form = reqwest::multipart::Form::new().text("full_name", "Renate Renamed");
    let resp = app
        .client
        .put(app.url("/user/update"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["full_name"], "renate renamed");

    let resp = app
        .client
        .get(app.url("/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["full_name"], "renate renamed");
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn update_profile_requires_a_session() {
    let app = common::spawn_app().await;

    let form = reqwest::multipart::Form::new().text("full_name", "Nobody");
    let resp = app
        .client
        .put(app.url("/user/update"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn role_and_email_are_immutable_through_profile_update() {
    let app = common::spawn_app().await;
    let (_id, token, email) = common::create_test_user(&app, "stable").await;

    // Unknown form fields are ignored, not applied.
    let form = reqwest::multipart::Form::new()
        .text("role", "ADMIN")
        .text("email", "hijacked@example.com");
    let resp = app
        .client
        .put(app.url("/user/update"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .get(app.url("/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["email"], email);
    assert_eq!(body["data"]["role"], "USER");
}

#[tokio::test]
#[ignore = "requires Postgres (set TEST_DATABASE_URL or DATABASE_URL)"]
async fn rejects_out_of_range_name() {
    let app = common::spawn_app().await;
    let (_id, token, _email) = common::create_test_user(&app, "tiny").await;

    let form = reqwest::multipart::Form::new().text("full_name", "ab");
    let resp = app
        .client
        .put(app.url("/user/update"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
