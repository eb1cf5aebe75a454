//! Append-only audit log.
//!
//! One row per privileged state transition: CRUD mutations, override
//! issuance and consumption, auth events. Rows are written through the
//! same executor as the mutation they describe, so a mutation and its
//! audit entry commit or roll back together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Executor, FromRow, Sqlite};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Approval,
    OverrideTokenConsumed,
    Denied,
    Registered,
    Login,
    MfaStepUp,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
            AuditAction::Approval => "approval",
            AuditAction::OverrideTokenConsumed => "override_token_consumed",
            AuditAction::Denied => "denied",
            AuditAction::Registered => "registered",
            AuditAction::Login => "login",
            AuditAction::MfaStepUp => "mfa_step_up",
        }
    }
}

/// Replace the named top-level fields of a JSON object with a marker.
/// Snapshots of health records never reach the audit log in the clear.
pub fn redact(mut value: Value, fields: &[&str]) -> Value {
    if let Some(map) = value.as_object_mut() {
        for field in fields {
            if let Some(entry) = map.get_mut(*field) {
                if !entry.is_null() {
                    *entry = Value::String("[redacted]".to_string());
                }
            }
        }
    }
    value
}

pub async fn record<'a, E>(
    executor: E,
    actor_id: Option<Uuid>,
    action: AuditAction,
    target: &str,
    target_id: Option<Uuid>,
    meta: Value,
) -> Result<(), AppError>
where
    E: Executor<'a, Database = Sqlite>,
{
    let meta_json = serde_json::to_string(&meta)
        .map_err(|err| AppError::internal(format!("audit meta serialization failed: {err}")))?;

    sqlx::query(
        "INSERT INTO audit_log (id, actor_id, action, target, target_id, meta, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(actor_id)
    .bind(action.as_str())
    .bind(target)
    .bind(target_id.map(|id| id.to_string()))
    .bind(meta_json)
    .bind(utc_now())
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// READ SIDE (admin forensics listing)
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target: String,
    pub target_id: Option<String>,
    #[schema(value_type = Object)]
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target: String,
    pub target_id: Option<String>,
    pub meta: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbAuditEntry> for AuditEntry {
    fn from(db: DbAuditEntry) -> Self {
        let meta = serde_json::from_str(&db.meta).unwrap_or(Value::Null);
        AuditEntry {
            id: db.id,
            actor_id: db.actor_id,
            action: db.action,
            target: db.target,
            target_id: db.target_id,
            meta,
            created_at: db.created_at,
        }
    }
}
