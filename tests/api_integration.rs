use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, Utc};
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

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    Ok(body["token"].as_str().context("missing token")?.to_string())
}

#[tokio::test]
async fn full_boarding_flow() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;
    insert_user(&pool, "STAFF", "staff@example.com", "password123").await?;
    let admin_token = login(&app, "admin@example.com", "password123").await?;
    let staff_token = login(&app, "staff@example.com", "password123").await?;

    // -- customer signs up
    let (status, registered) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", registered);
    let customer_token = registered["token"].as_str().unwrap().to_string();

    // -- admin sets up a kennel with capacity 1
    let (status, kennel) = send(
        &app,
        "POST",
        "/kennels",
        Some(&admin_token),
        Some(json!({ "name": "Run 1", "capacity": 1, "daily_rate_cents": 4500 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "kennel failed: {}", kennel);
    let kennel_id = kennel["id"].as_str().unwrap().to_string();

    // -- customer registers a pet
    let (status, pet) = send(
        &app,
        "POST",
        "/pets",
        Some(&customer_token),
        Some(json!({ "name": "Biscuit", "species": "dog", "breed": "corgi" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "pet failed: {}", pet);
    let pet_id = pet["id"].as_str().unwrap().to_string();

    // -- customer books four nights
    let start = Utc::now() + Duration::days(7);
    let end = start + Duration::days(4);
    let (status, booking) = send(
        &app,
        "POST",
        "/bookings",
        Some(&customer_token),
        Some(json!({
            "pet_id": pet_id,
            "kennel_id": kennel_id,
            "start_date": start.to_rfc3339(),
            "end_date": end.to_rfc3339(),
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "booking failed: {}", booking);
    let booking_id = booking["id"].as_str().unwrap().to_string();
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["total_cents"], 4 * 4500);

    // -- overlapping booking in the same kennel is refused at capacity 1
    let (status, conflict) = send(
        &app,
        "POST",
        "/bookings",
        Some(&customer_token),
        Some(json!({
            "pet_id": pet_id,
            "kennel_id": kennel_id,
            "start_date": (start + Duration::days(1)).to_rfc3339(),
            "end_date": (end + Duration::days(1)).to_rfc3339(),
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT, "body: {}", conflict);

    // -- a booking after checkout is fine
    let (status, second) = send(
        &app,
        "POST",
        "/bookings",
        Some(&customer_token),
        Some(json!({
            "pet_id": pet_id,
            "kennel_id": kennel_id,
            "start_date": (end + Duration::days(1)).to_rfc3339(),
            "end_date": (end + Duration::days(3)).to_rfc3339(),
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", second);

    // -- staff confirms the booking
    let (status, confirmed) = send(
        &app,
        "PUT",
        &format!("/bookings/{booking_id}"),
        Some(&staff_token),
        Some(json!({ "status": "confirmed" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", confirmed);
    assert_eq!(confirmed["status"], "confirmed");

    // -- bogus status is rejected
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/bookings/{booking_id}"),
        Some(&staff_token),
        Some(json!({ "status": "teleported" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // -- staff records a care log against the booking
    let (status, care_log) = send(
        &app,
        "POST",
        "/care-logs",
        Some(&staff_token),
        Some(json!({
            "booking_id": booking_id,
            "activity": "medication",
            "notes": "insulin administered"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "care log failed: {}", care_log);

    // customers cannot write care logs
    let (status, _) = send(
        &app,
        "POST",
        "/care-logs",
        Some(&customer_token),
        Some(json!({ "booking_id": booking_id, "activity": "walk" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // -- but they see the ones for their own bookings
    let (status, logs) = send(&app, "GET", "/care-logs", Some(&customer_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["data"][0]["booking_id"], booking_id);

    // -- staff notifies the customer
    let customer_id = registered["user"]["id"].as_str().unwrap();
    let (status, notification) = send(
        &app,
        "POST",
        "/notifications",
        Some(&staff_token),
        Some(json!({
            "user_id": customer_id,
            "title": "Pickup reminder",
            "body": "Biscuit goes home tomorrow."
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", notification);
    let notification_id = notification["id"].as_str().unwrap().to_string();

    // -- customer marks it read
    let (status, read) = send(
        &app,
        "PUT",
        &format!("/notifications/{notification_id}"),
        Some(&customer_token),
        Some(json!({ "read": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(read["read_at"].is_string());

    // -- admin can page through the audit trail
    let (status, audit_page) = send(&app, "GET", "/audit?limit=50", Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(audit_page["total"].as_i64().unwrap() > 0);

    // customers cannot
    let (status, _) = send(&app, "GET", "/audit", Some(&customer_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn booking_requires_an_owned_pet_and_valid_window() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;
    let admin_token = login(&app, "admin@example.com", "password123").await?;

    let alice = insert_user(&pool, "CUSTOMER", "alice@example.com", "password123").await?;
    insert_user(&pool, "CUSTOMER", "bob@example.com", "password123").await?;
    let bob_token = login(&app, "bob@example.com", "password123").await?;

    let (_, kennel) = send(
        &app,
        "POST",
        "/kennels",
        Some(&admin_token),
        Some(json!({ "name": "Run 2", "capacity": 2, "daily_rate_cents": 3000 })),
    )
    .await?;
    let kennel_id = kennel["id"].as_str().unwrap().to_string();

    // alice's pet, inserted directly
    let alice_pet = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO pets (id, owner_id, name, species, created_at, updated_at) VALUES (?, ?, 'Waffle', 'dog', ?, ?)",
    )
    .bind(alice_pet)
    .bind(alice)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let start = Utc::now() + Duration::days(1);
    let end = start + Duration::days(2);

    // bob cannot book alice's pet
    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(&bob_token),
        Some(json!({
            "pet_id": alice_pet,
            "kennel_id": kennel_id,
            "start_date": start.to_rfc3339(),
            "end_date": end.to_rfc3339(),
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // inverted window is a validation error
    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(&bob_token),
        Some(json!({
            "pet_id": alice_pet,
            "kennel_id": kennel_id,
            "start_date": end.to_rfc3339(),
            "end_date": start.to_rfc3339(),
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    Ok(())
}
