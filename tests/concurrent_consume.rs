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

async fn post_json(app: Router, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))?;

    let resp: Response = app.oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

/// N concurrent consume attempts with the same token: exactly one
/// succeeds, the rest fail, and `used_at` is set exactly once.
#[tokio::test]
async fn concurrent_consumption_is_at_most_once() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;
    let customer_id = insert_user(&pool, "CUSTOMER", "cust@example.com", "password123").await?;

    let (status, login_body) = post_json(
        app.clone(),
        "/auth/login",
        "",
        json!({ "email": "admin@example.com", "password": "password123" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let admin_token = login_body["token"].as_str().unwrap().to_string();

    let (status, stepped) = post_json(
        app.clone(),
        "/auth/step-up",
        &admin_token,
        json!({ "password": "password123" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let admin_token = stepped["token"].as_str().unwrap().to_string();

    let (status, customer_login) = post_json(
        app.clone(),
        "/auth/login",
        "",
        json!({ "email": "cust@example.com", "password": "password123" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let customer_token = customer_login["token"].as_str().unwrap().to_string();

    let (status, issued) = post_json(
        app.clone(),
        "/overrides/issue",
        &admin_token,
        json!({
            "issued_to_user_id": customer_id,
            "scope": "POLICY_BYPASS",
            "entity_type": "booking",
            "entity_id": Uuid::new_v4(),
            "expires_in_minutes": 10
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "issue failed: {}", issued);
    let token = issued["token"].as_str().unwrap().to_string();

    const ATTEMPTS: usize = 8;
    let mut handles = Vec::with_capacity(ATTEMPTS);
    for _ in 0..ATTEMPTS {
        let app = app.clone();
        let customer_token = customer_token.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            post_json(
                app,
                "/overrides/consume",
                &customer_token,
                json!({ "token": token }),
            )
            .await
        }));
    }

    let mut successes = 0;
    let mut failures = 0;
    for handle in handles {
        let (status, _) = handle.await??;
        match status {
            StatusCode::OK => successes += 1,
            StatusCode::BAD_REQUEST => failures += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(successes, 1, "exactly one consume attempt must win");
    assert_eq!(failures, ATTEMPTS - 1);

    let used: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM approval_tokens WHERE used_at IS NOT NULL")
            .fetch_one(&pool)
            .await?;
    assert_eq!(used, 1);

    let events: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM override_events")
        .fetch_one(&pool)
        .await?;
    assert_eq!(events, 1, "only the winning consume writes an event");

    let audits: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM audit_log WHERE action = 'override_token_consumed'",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(audits, 1);

    Ok(())
}
