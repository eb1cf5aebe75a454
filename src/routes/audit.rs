use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::audit::{AuditEntry, DbAuditEntry};
use crate::crud::{PageQuery, Paginated};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    params(PageQuery),
    responses(
        (status = 200, description = "Audit log entries, newest first"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<AuditEntry>>> {
    if !auth.role.is_administrative() {
        return Err(AppError::forbidden(
            "only administrators may read the audit log",
        ));
    }

    let (page, limit) = query.normalize();
    let offset = (page - 1) * limit;

    let rows = sqlx::query_as::<_, DbAuditEntry>(
        "SELECT id, actor_id, action, target, target_id, meta, created_at FROM audit_log ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM audit_log")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(Paginated {
        data: rows.into_iter().map(AuditEntry::from).collect(),
        page,
        limit,
        total,
        total_pages: (total + limit - 1) / limit,
    }))
}
