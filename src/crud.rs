//! Generic CRUD engine.
//!
//! One engine executes list/read/create/update/delete for every managed
//! entity type. The engine owns the cross-cutting rules so individual
//! entities cannot get them wrong: capability checks and row scoping
//! from the policy table, MFA step-up for sensitive mutations, and
//! exactly one audit row per successful mutation, written inside the
//! mutation's transaction. Entities supply only their SQL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{SqliteConnection, SqlitePool};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction};
use crate::authz::{self, EntityKind, RowScope, Verb};
use crate::errors::AppError;
use crate::jwt::AuthUser;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<i64>,
    /// rows per page, capped at 100
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn normalize(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Persistence contract an entity brings to the engine. Implementations
/// live next to their models and contain nothing but SQL and
/// entity-specific validation; authorization stays in the engine.
#[async_trait]
pub trait CrudEntity: Serialize + Sized + Send + Sync + Unpin + 'static {
    type Create: DeserializeOwned + Send + Sync + 'static;
    type Update: DeserializeOwned + Send + Sync + 'static;

    /// Top-level snapshot fields masked before a snapshot reaches the
    /// audit log.
    const REDACTED_FIELDS: &'static [&'static str] = &[];

    fn kind() -> EntityKind;
    fn id(&self) -> Uuid;
    /// The user a row belongs to, for `RowScope::Mine` enforcement.
    /// `None` means the entity has no per-user owner (e.g. kennels).
    fn owner_id(&self) -> Option<Uuid>;

    async fn fetch_page(
        pool: &SqlitePool,
        scope: &RowScope,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), AppError>;

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError>;

    async fn insert(
        conn: &mut SqliteConnection,
        session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError>;

    async fn update_row(
        conn: &mut SqliteConnection,
        current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError>;

    async fn mark_deleted(conn: &mut SqliteConnection, id: Uuid) -> Result<(), AppError>;

    fn audit_snapshot(&self) -> Value {
        audit::redact(
            serde_json::to_value(self).unwrap_or(Value::Null),
            Self::REDACTED_FIELDS,
        )
    }
}

pub async fn list<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    query: &PageQuery,
) -> Result<Paginated<E>, AppError> {
    authorize::<E>(state, session, Verb::Read, None).await?;

    let scope = authz::scope(E::kind(), session.role, session.user_id);
    let (page, limit) = query.normalize();
    let (data, total) = E::fetch_page(&state.pool, &scope, page, limit).await?;

    Ok(Paginated {
        data,
        page,
        limit,
        total,
        total_pages: (total + limit - 1) / limit,
    })
}

pub async fn read<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    id: Uuid,
) -> Result<E, AppError> {
    authorize::<E>(state, session, Verb::Read, None).await?;

    let entity = E::fetch_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", E::kind().as_str())))?;

    enforce_row_scope(state, session, Verb::Read, &entity).await?;
    Ok(entity)
}

pub async fn create<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    payload: E::Create,
) -> Result<E, AppError> {
    authorize::<E>(state, session, Verb::Create, None).await?;
    enforce_step_up::<E>(session)?;

    let mut tx = state.pool.begin().await?;
    let entity = E::insert(&mut *tx, session, payload).await?;
    audit::record(
        &mut *tx,
        Some(session.user_id),
        AuditAction::Created,
        E::kind().as_str(),
        Some(entity.id()),
        json!({ "new": entity.audit_snapshot() }),
    )
    .await?;
    tx.commit().await?;

    Ok(entity)
}

pub async fn update<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    id: Uuid,
    payload: E::Update,
) -> Result<E, AppError> {
    authorize::<E>(state, session, Verb::Update, None).await?;
    enforce_step_up::<E>(session)?;

    let current = E::fetch_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", E::kind().as_str())))?;
    enforce_row_scope(state, session, Verb::Update, &current).await?;

    let old_snapshot = current.audit_snapshot();

    let mut tx = state.pool.begin().await?;
    let updated = E::update_row(&mut *tx, current, payload).await?;
    audit::record(
        &mut *tx,
        Some(session.user_id),
        AuditAction::Updated,
        E::kind().as_str(),
        Some(updated.id()),
        json!({ "new": updated.audit_snapshot(), "old": old_snapshot }),
    )
    .await?;
    tx.commit().await?;

    Ok(updated)
}

pub async fn delete<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    id: Uuid,
) -> Result<(), AppError> {
    authorize::<E>(state, session, Verb::Delete, None).await?;
    enforce_step_up::<E>(session)?;

    let current = E::fetch_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", E::kind().as_str())))?;
    enforce_row_scope(state, session, Verb::Delete, &current).await?;

    let mut tx = state.pool.begin().await?;
    E::mark_deleted(&mut *tx, id).await?;
    audit::record(
        &mut *tx,
        Some(session.user_id),
        AuditAction::Deleted,
        E::kind().as_str(),
        Some(id),
        json!({ "old": current.audit_snapshot() }),
    )
    .await?;
    tx.commit().await?;

    Ok(())
}

/// Capability gate. Denials return a structured 403 and, when denial
/// auditing is enabled, leave a trace; by default they write nothing.
async fn authorize<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    verb: Verb,
    entity_id: Option<Uuid>,
) -> Result<(), AppError> {
    let caps = authz::capabilities(E::kind(), session.role);
    if caps.allows(verb) {
        return Ok(());
    }

    tracing::debug!(
        user_id = %session.user_id,
        role = session.role.as_str(),
        verb = verb.as_str(),
        entity = E::kind().as_str(),
        "authorization denied"
    );
    record_denial(state, session, E::kind(), verb, entity_id).await;
    Err(AppError::forbidden(format!(
        "role {} may not {} {}",
        session.role.as_str(),
        verb.as_str(),
        E::kind().as_str()
    )))
}

/// Ownership gate for single-row operations under `RowScope::Mine`.
async fn enforce_row_scope<E: CrudEntity>(
    state: &AppState,
    session: &AuthUser,
    verb: Verb,
    entity: &E,
) -> Result<(), AppError> {
    match authz::scope(E::kind(), session.role, session.user_id) {
        RowScope::All => Ok(()),
        RowScope::Mine(user_id) => {
            if entity.owner_id() == Some(user_id) {
                Ok(())
            } else {
                record_denial(state, session, E::kind(), verb, Some(entity.id())).await;
                Err(AppError::forbidden(format!(
                    "{} does not belong to the caller",
                    E::kind().as_str()
                )))
            }
        }
    }
}

/// Step-up gate shared by all mutation verbs of a kind.
fn enforce_step_up<E: CrudEntity>(session: &AuthUser) -> Result<(), AppError> {
    if let Some(window) = authz::step_up_for_mutation(E::kind(), session.role) {
        if !session.mfa_within(window) {
            return Err(AppError::forbidden(
                "recent multi-factor verification required",
            ));
        }
    }
    Ok(())
}

async fn record_denial(
    state: &AppState,
    session: &AuthUser,
    kind: EntityKind,
    verb: Verb,
    entity_id: Option<Uuid>,
) {
    if !state.settings.audit_denials {
        return;
    }

    let result = audit::record(
        &state.pool,
        Some(session.user_id),
        AuditAction::Denied,
        kind.as_str(),
        entity_id,
        json!({ "verb": verb.as_str(), "role": session.role.as_str() }),
    )
    .await;

    if let Err(err) = result {
        tracing::error!("failed to record denial: {err}");
    }
}
