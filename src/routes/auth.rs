use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::audit::{self, AuditAction};
use crate::authz::{landing_route, Role};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{
    fetch_db_user, fetch_db_user_by_email, AuthResponse, LoginRequest, RegisterRequest,
    StepUpRequest, User,
};
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = uuid::Uuid::new_v4();

    let mut tx = state.pool.begin().await?;

    let taken: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(&payload.email)
            .fetch_one(&mut *tx)
            .await?;
    if taken > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    // Self-service signup always lands in the customer role; staff
    // accounts are provisioned by an administrator.
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(Role::Customer.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    audit::record(
        &mut *tx,
        Some(user_id),
        AuditAction::Registered,
        "user",
        Some(user_id),
        json!({}),
    )
    .await?;

    tx.commit().await?;

    let user = User {
        id: user_id,
        name: payload.name,
        email: payload.email,
        role: Role::Customer,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    let token = state.jwt.encode(user.id, user.role, None)?;
    let landing = landing_route(user.role).to_string();

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user,
            landing,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = fetch_db_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id, user.role, None)?;

    audit::record(
        &state.pool,
        Some(user.id),
        AuditAction::Login,
        "user",
        Some(user.id),
        json!({}),
    )
    .await?;

    let landing = landing_route(user.role).to_string();
    Ok(Json(AuthResponse {
        token,
        user,
        landing,
    }))
}

/// Password re-authentication as an MFA step-up. The returned session
/// carries the verification timestamp that gates override issuance
/// (5-minute window) and sensitive mutations (12-hour window).
#[utoipa::path(
    post,
    path = "/auth/step-up",
    tag = "Auth",
    request_body = StepUpRequest,
    responses(
        (status = 200, description = "Step-up verified; returns an MFA-stamped session", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn step_up(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<StepUpRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = fetch_db_user(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    let verified_at = utc_now();
    let token = state.jwt.encode(user.id, user.role, Some(verified_at))?;

    audit::record(
        &state.pool,
        Some(user.id),
        AuditAction::MfaStepUp,
        "user",
        Some(user.id),
        json!({ "verified_at": verified_at }),
    )
    .await?;

    let landing = landing_route(user.role).to_string();
    Ok(Json(AuthResponse {
        token,
        user,
        landing,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = AuthResponse))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<AuthResponse>> {
    let db_user = fetch_db_user(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    let user: User = db_user.try_into()?;

    // Echo back a session token equivalent to the presented one so the
    // response shape matches login.
    let token = state
        .jwt
        .encode(user.id, user.role, auth.mfa_verified_at)?;
    let landing = landing_route(user.role).to_string();

    Ok(Json(AuthResponse {
        token,
        user,
        landing,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
