//! Override token issuance and consumption.
//!
//! Issuance is restricted to the admin tier with a fresh MFA step-up;
//! consumption is restricted to the designated recipient and happens at
//! most once per token. On the consume path, invalid, expired and
//! already-used tokens are indistinguishable to the caller.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction};
use crate::authz::MfaWindow;
use crate::crud::{PageQuery, Paginated};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::approval::{self, ApprovalMetadata, ApprovalToken, NewApprovalToken};
use crate::models::user::fetch_db_user;
use crate::tokens::{OverrideScope, Verification, MAX_TOKEN_MINUTES};
use crate::utils::utc_now;

/// Single user-visible message for every consume-path token failure.
const GENERIC_TOKEN_ERROR: &str = "token invalid, expired, or already used";

/// Lifetime of the ephemeral override session handed out at consumption.
const OVERRIDE_SESSION_MINUTES: i64 = 15;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueRequest {
    pub issued_to_user_id: Uuid,
    pub scope: OverrideScope,
    #[schema(example = "booking")]
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub reason: Option<String>,
    /// Defaults to the maximum window of 15 minutes.
    #[schema(example = 10)]
    pub expires_in_minutes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: OverrideScope,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsumeRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsumeResponse {
    pub success: bool,
    pub override_session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub scope: OverrideScope,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/overrides/issue",
    tag = "Overrides",
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Override token issued", body = IssueResponse),
        (status = 403, description = "Caller is not an administrator or MFA is stale")
    )
)]
pub async fn issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<IssueRequest>,
) -> AppResult<(StatusCode, Json<IssueResponse>)> {
    if !auth.role.can_issue_overrides() {
        record_issue_denial(&state, &auth).await;
        return Err(AppError::forbidden(
            "only administrators may issue override tokens",
        ));
    }
    if !auth.mfa_within(MfaWindow::Fresh) {
        return Err(AppError::forbidden(
            "fresh multi-factor verification required",
        ));
    }

    let minutes = payload.expires_in_minutes.unwrap_or(MAX_TOKEN_MINUTES);
    if !(1..=MAX_TOKEN_MINUTES).contains(&minutes) {
        return Err(AppError::validation(
            "expires_in_minutes",
            format!("must be between 1 and {}", MAX_TOKEN_MINUTES),
        ));
    }

    let recipient = fetch_db_user(&state.pool, payload.issued_to_user_id)
        .await?
        .ok_or_else(|| AppError::not_found("recipient user not found"))?;

    let expires_at = utc_now() + Duration::minutes(minutes);
    let (token, nonce) = state.codec.issue(
        auth.user_id,
        recipient.id,
        payload.scope,
        &payload.entity_type,
        payload.entity_id,
        expires_at,
    )?;
    let token_hash = state.codec.hash(&token)?;

    let metadata = ApprovalMetadata {
        entity_type: payload.entity_type.clone(),
        entity_id: payload.entity_id,
        reason: payload.reason.clone(),
        nonce: nonce.clone(),
    };

    let mut tx = state.pool.begin().await?;
    let approval_id = approval::insert_token(
        &mut tx,
        NewApprovalToken {
            token_hash,
            nonce,
            scope: payload.scope,
            expires_at,
            issued_by: auth.user_id,
            issued_to: recipient.id,
            metadata: &metadata,
        },
    )
    .await?;

    audit::record(
        &mut *tx,
        Some(auth.user_id),
        AuditAction::Approval,
        "approval_token",
        Some(approval_id),
        json!({
            "scope": payload.scope.as_str(),
            "entity_type": payload.entity_type,
            "entity_id": payload.entity_id,
            "issued_to": recipient.id,
            "reason": payload.reason,
            "expires_at": expires_at,
        }),
    )
    .await?;
    tx.commit().await?;

    // The token itself goes back to the caller only; it is delivered to
    // the recipient out-of-band and never persisted in the clear.
    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            token,
            expires_at,
            scope: payload.scope,
            entity_type: payload.entity_type,
            entity_id: payload.entity_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/overrides/consume",
    tag = "Overrides",
    request_body = ConsumeRequest,
    responses(
        (status = 200, description = "Token consumed; override session granted", body = ConsumeResponse),
        (status = 400, description = "Token invalid, expired, or already used"),
        (status = 403, description = "Token was issued to a different user")
    )
)]
pub async fn consume(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ConsumeRequest>,
) -> AppResult<Json<ConsumeResponse>> {
    let token_payload = match state.codec.verify(&payload.token) {
        Verification::Valid(token_payload) => token_payload,
        Verification::Invalid => return Err(AppError::token(GENERIC_TOKEN_ERROR)),
    };

    if token_payload.issued_to != auth.user_id {
        return Err(AppError::forbidden("token was not issued to this user"));
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let approval = approval::claim_by_nonce(&mut tx, &token_payload.nonce, now)
        .await?
        .ok_or_else(|| AppError::token(GENERIC_TOKEN_ERROR))?;

    let reason = serde_json::from_str::<ApprovalMetadata>(&approval.metadata)
        .ok()
        .and_then(|meta| meta.reason);

    approval::insert_override_event(
        &mut tx,
        auth.user_id,
        "override_token_consumed",
        &token_payload.entity_type,
        token_payload.entity_id,
        token_payload.scope,
        reason.as_deref(),
        json!({
            "approval_token_id": approval.id,
            "nonce": token_payload.nonce,
            "issued_by": token_payload.issued_by,
        }),
    )
    .await?;

    audit::record(
        &mut *tx,
        Some(auth.user_id),
        AuditAction::OverrideTokenConsumed,
        &token_payload.entity_type,
        token_payload.entity_id,
        json!({
            "scope": token_payload.scope.as_str(),
            "approval_token_id": approval.id,
        }),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        actor_id = %auth.user_id,
        scope = token_payload.scope.as_str(),
        entity_type = %token_payload.entity_type,
        "override token consumed"
    );

    Ok(Json(ConsumeResponse {
        success: true,
        override_session_id: Uuid::new_v4(),
        expires_at: now + Duration::minutes(OVERRIDE_SESSION_MINUTES),
        scope: token_payload.scope,
        entity_type: token_payload.entity_type,
        entity_id: token_payload.entity_id,
    }))
}

#[utoipa::path(
    get,
    path = "/overrides",
    tag = "Overrides",
    params(PageQuery),
    responses(
        (status = 200, description = "Issued approval tokens, newest first"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<ApprovalToken>>> {
    if !auth.role.is_administrative() {
        return Err(AppError::forbidden(
            "only administrators may list approval tokens",
        ));
    }

    let (page, limit) = query.normalize();
    let (data, total) = approval::list_tokens(&state.pool, page, limit).await?;

    Ok(Json(Paginated {
        data,
        page,
        limit,
        total,
        total_pages: (total + limit - 1) / limit,
    }))
}

async fn record_issue_denial(state: &AppState, auth: &AuthUser) {
    if !state.settings.audit_denials {
        return;
    }

    let result = audit::record(
        &state.pool,
        Some(auth.user_id),
        AuditAction::Denied,
        "approval_token",
        None,
        json!({ "verb": "issue", "role": auth.role.as_str() }),
    )
    .await;

    if let Err(err) = result {
        tracing::error!("failed to record denial: {err}");
    }
}
