use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashSet;
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

async fn insert_pet(pool: &SqlitePool, owner_id: Uuid, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO pets (id, owner_id, name, species, created_at, updated_at) VALUES (?, ?, ?, 'dog', ?, ?)",
    )
    .bind(id)
    .bind(owner_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": password }).to_string(),
        ))?;
    let resp: Response = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    Ok(body["token"].as_str().context("missing token")?.to_string())
}

async fn get_json(app: &Router, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok((status, value))
}

fn ids_of(page: &Value) -> HashSet<String> {
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap().to_string())
        .collect()
}

/// A customer listing pets only ever sees their own, for any page/limit
/// combination; staff and admins see every row.
#[tokio::test]
async fn customers_only_see_their_own_pets() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let alice = insert_user(&pool, "CUSTOMER", "alice@example.com", "password123").await?;
    let bob = insert_user(&pool, "CUSTOMER", "bob@example.com", "password123").await?;
    insert_user(&pool, "STAFF", "staff@example.com", "password123").await?;
    insert_user(&pool, "ADMIN", "admin@example.com", "password123").await?;

    let p1 = insert_pet(&pool, alice, "Biscuit").await?;
    let p2 = insert_pet(&pool, alice, "Waffle").await?;
    let p3 = insert_pet(&pool, bob, "Mochi").await?;

    let alice_token = login(&app, "alice@example.com", "password123").await?;
    let staff_token = login(&app, "staff@example.com", "password123").await?;
    let admin_token = login(&app, "admin@example.com", "password123").await?;

    let alice_ids: HashSet<String> = [p1.to_string(), p2.to_string()].into_iter().collect();

    // every page/limit combination that covers all rows
    for (page, limit) in [(1, 1), (2, 1), (1, 2), (1, 20), (1, 100)] {
        let (status, body) =
            get_json(&app, &format!("/pets?page={page}&limit={limit}"), &alice_token).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2, "customer total must count only own rows");

        let seen = ids_of(&body);
        assert!(
            seen.is_subset(&alice_ids),
            "page {page}/{limit} leaked foreign rows: {body}"
        );
        assert!(!seen.contains(&p3.to_string()));
    }

    // accumulate all pages at limit=1 and confirm exactly {P1, P2}
    let mut collected = HashSet::new();
    for page in 1..=2 {
        let (_, body) = get_json(&app, &format!("/pets?page={page}&limit=1"), &alice_token).await?;
        collected.extend(ids_of(&body));
    }
    assert_eq!(collected, alice_ids);

    // staff and admin see all three
    for token in [&staff_token, &admin_token] {
        let (status, body) = get_json(&app, "/pets", token).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(ids_of(&body).len(), 3);
    }

    Ok(())
}

/// Reading or mutating a foreign row directly is refused.
#[tokio::test]
async fn foreign_rows_are_not_reachable_by_id() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let alice = insert_user(&pool, "CUSTOMER", "alice@example.com", "password123").await?;
    let bob = insert_user(&pool, "CUSTOMER", "bob@example.com", "password123").await?;
    insert_pet(&pool, alice, "Biscuit").await?;
    let bobs_pet = insert_pet(&pool, bob, "Mochi").await?;

    let alice_token = login(&app, "alice@example.com", "password123").await?;

    let (status, _) = get_json(&app, &format!("/pets/{bobs_pet}"), &alice_token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // mutation attempts are refused the same way
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/pets/{bobs_pet}"))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", alice_token))
        .body(Body::from(json!({ "name": "Stolen" }).to_string()))?;
    let resp: Response = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let name: String = sqlx::query_scalar("SELECT name FROM pets WHERE id = ?")
        .bind(bobs_pet)
        .fetch_one(&pool)
        .await?;
    assert_eq!(name, "Mochi");

    Ok(())
}

/// Customers listing users resolve to just their own record.
#[tokio::test]
async fn customer_user_listing_is_scoped_to_self() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let alice = insert_user(&pool, "CUSTOMER", "alice@example.com", "password123").await?;
    insert_user(&pool, "CUSTOMER", "bob@example.com", "password123").await?;
    let alice_token = login(&app, "alice@example.com", "password123").await?;

    let (status, body) = get_json(&app, "/users", &alice_token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["id"], alice.to_string());

    Ok(())
}
