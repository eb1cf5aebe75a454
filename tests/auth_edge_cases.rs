use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use kennelworks::create_app;
use kennelworks::utils::hash_password;

async fn setup() -> Result<(Router, SqlitePool, tempfile::TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    std::env::set_var("OVERRIDE_TOKEN_SECRET", "test-override-secret");
    let app = create_app(pool.clone()).await?;

    Ok((app, pool, dir))
}

async fn insert_user(pool: &SqlitePool, role: &str, email: &str, password: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(email)
    .bind(email)
    .bind(hash_password(password)?)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body_json: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body_json {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn missing_and_garbage_tokens_are_unauthorized() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let (status, _) = send(&app, "GET", "/pets", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/pets", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn login_failures_are_uniform() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    insert_user(&pool, "CUSTOMER", "cust@example.com", "password123").await?;

    // unknown email and wrong password produce the same response
    let (status_a, body_a) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "password123" })),
    )
    .await?;
    let (status_b, body_b) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "cust@example.com", "password": "wrong-password" })),
    )
    .await?;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["message"], body_b["message"]);

    Ok(())
}

#[tokio::test]
async fn registration_rejects_short_passwords_and_duplicates() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "A", "email": "a@example.com", "password": "short" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "A", "email": "a@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "B", "email": "a@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn registration_always_lands_in_the_customer_role() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "A", "email": "a@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "CUSTOMER");
    assert_eq!(body["landing"], "/portal");

    Ok(())
}

#[tokio::test]
async fn step_up_requires_the_correct_password() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;

    let (_, login_body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "admin@example.com", "password": "password123" })),
    )
    .await?;
    let token = login_body["token"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/auth/step-up",
        Some(token),
        Some(json!({ "password": "wrong-password" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

/// Admin mutations of user records require a recent MFA step-up.
#[tokio::test]
async fn user_administration_requires_recent_mfa() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;
    let target = insert_user(&pool, "CUSTOMER", "cust@example.com", "password123").await?;

    let (_, login_body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "admin@example.com", "password": "password123" })),
    )
    .await?;
    let plain_token = login_body["token"].as_str().unwrap().to_string();

    // without step-up: refused
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{target}"),
        Some(&plain_token),
        Some(json!({ "role": "STAFF" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {}", body);

    // with step-up: allowed
    let (status, stepped) = send(
        &app,
        "POST",
        "/auth/step-up",
        Some(&plain_token),
        Some(json!({ "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let mfa_token = stepped["token"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{target}"),
        Some(mfa_token),
        Some(json!({ "role": "STAFF" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["role"], "STAFF");

    Ok(())
}

#[tokio::test]
async fn customers_can_update_only_their_own_profile() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let alice = insert_user(&pool, "CUSTOMER", "alice@example.com", "password123").await?;
    let bob = insert_user(&pool, "CUSTOMER", "bob@example.com", "password123").await?;

    let (_, login_body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "password123" })),
    )
    .await?;
    let token = login_body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{alice}"),
        Some(&token),
        Some(json!({ "name": "Alice L." })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["name"], "Alice L.");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/users/{bob}"),
        Some(&token),
        Some(json!({ "name": "Hacked" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
