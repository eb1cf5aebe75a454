//! Persisted side of the override flow: approval tokens and override
//! events. Rows are append-only; `used_at` is the single exception and
//! transitions exactly once, inside the consuming transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::tokens::OverrideScope;
use crate::utils::utc_now;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApprovalToken {
    pub id: Uuid,
    pub scope: OverrideScope,
    pub expires_at: DateTime<Utc>,
    pub issued_by: Uuid,
    pub issued_to: Uuid,
    pub used_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbApprovalToken {
    pub id: Uuid,
    pub token_hash: String,
    pub nonce: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub issued_by: Uuid,
    pub issued_to: Uuid,
    pub used_at: Option<DateTime<Utc>>,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbApprovalToken> for ApprovalToken {
    type Error = AppError;

    fn try_from(db: DbApprovalToken) -> Result<Self, Self::Error> {
        let scope = OverrideScope::parse(&db.scope)
            .ok_or_else(|| AppError::internal(format!("unknown scope in storage: {}", db.scope)))?;
        let metadata = serde_json::from_str(&db.metadata).unwrap_or(Value::Null);

        Ok(ApprovalToken {
            id: db.id,
            scope,
            expires_at: db.expires_at,
            issued_by: db.issued_by,
            issued_to: db.issued_to,
            used_at: db.used_at,
            metadata,
            created_at: db.created_at,
        })
    }
}

/// Metadata persisted alongside a token; mirrors the token payload so
/// the audit trail is complete without the raw token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalMetadata {
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub reason: Option<String>,
    pub nonce: String,
}

const SELECT_COLS: &str =
    "id, token_hash, nonce, scope, expires_at, issued_by, issued_to, used_at, metadata, created_at";

pub struct NewApprovalToken<'a> {
    pub token_hash: String,
    pub nonce: String,
    pub scope: OverrideScope,
    pub expires_at: DateTime<Utc>,
    pub issued_by: Uuid,
    pub issued_to: Uuid,
    pub metadata: &'a ApprovalMetadata,
}

pub async fn insert_token(
    conn: &mut SqliteConnection,
    token: NewApprovalToken<'_>,
) -> Result<Uuid, AppError> {
    let metadata = serde_json::to_string(token.metadata)
        .map_err(|err| AppError::internal(format!("metadata serialization failed: {err}")))?;
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO approval_tokens (id, token_hash, nonce, scope, expires_at, issued_by, issued_to, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&token.token_hash)
    .bind(&token.nonce)
    .bind(token.scope.as_str())
    .bind(token.expires_at)
    .bind(token.issued_by)
    .bind(token.issued_to)
    .bind(metadata)
    .bind(utc_now())
    .execute(conn)
    .await?;

    Ok(id)
}

/// Claim the active token for `nonce`. The conditional UPDATE is the
/// at-most-once guarantee: under concurrent consume attempts exactly one
/// caller flips `used_at` from NULL; everyone else sees zero rows
/// affected. Must run inside the caller's transaction so the claim and
/// the resulting event rows commit together.
pub async fn claim_by_nonce(
    conn: &mut SqliteConnection,
    nonce: &str,
    now: DateTime<Utc>,
) -> Result<Option<DbApprovalToken>, AppError> {
    let affected = sqlx::query(
        "UPDATE approval_tokens SET used_at = ? WHERE nonce = ? AND used_at IS NULL",
    )
    .bind(now)
    .bind(nonce)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, DbApprovalToken>(&format!(
        "SELECT {SELECT_COLS} FROM approval_tokens WHERE nonce = ?"
    ))
    .bind(nonce)
    .fetch_one(conn)
    .await?;

    Ok(Some(row))
}

pub async fn insert_override_event(
    conn: &mut SqliteConnection,
    actor_id: Uuid,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    scope: OverrideScope,
    reason: Option<&str>,
    metadata: Value,
) -> Result<Uuid, AppError> {
    let metadata = serde_json::to_string(&metadata)
        .map_err(|err| AppError::internal(format!("metadata serialization failed: {err}")))?;
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO override_events (id, actor_id, action, entity_type, entity_id, scope, reason, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(actor_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id.map(|v| v.to_string()))
    .bind(scope.as_str())
    .bind(reason)
    .bind(metadata)
    .bind(utc_now())
    .execute(conn)
    .await?;

    Ok(id)
}

pub async fn list_tokens(
    pool: &SqlitePool,
    page: i64,
    limit: i64,
) -> Result<(Vec<ApprovalToken>, i64), AppError> {
    let offset = (page - 1) * limit;
    let rows = sqlx::query_as::<_, DbApprovalToken>(&format!(
        "SELECT {SELECT_COLS} FROM approval_tokens ORDER BY created_at DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM approval_tokens")
        .fetch_one(pool)
        .await?;

    let tokens = rows
        .into_iter()
        .map(ApprovalToken::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tokens, total))
}
