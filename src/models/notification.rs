use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{EntityKind, RowScope};
use crate::crud::CrudEntity;
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::utils::utc_now;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotificationCreateRequest {
    pub user_id: Uuid,
    #[schema(example = "Pickup reminder")]
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotificationUpdateRequest {
    /// Set to true to mark the notification as read.
    pub read: Option<bool>,
}

const SELECT_COLS: &str = "id, user_id, title, body, read_at, created_at, updated_at, deleted_at";

#[async_trait]
impl CrudEntity for Notification {
    type Create = NotificationCreateRequest;
    type Update = NotificationUpdateRequest;

    fn kind() -> EntityKind {
        EntityKind::Notification
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    async fn fetch_page(
        pool: &SqlitePool,
        scope: &RowScope,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let offset = (page - 1) * limit;
        match scope {
            RowScope::All => {
                let rows = sqlx::query_as::<_, Notification>(&format!(
                    "SELECT {SELECT_COLS} FROM notifications WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM notifications WHERE deleted_at IS NULL",
                )
                .fetch_one(pool)
                .await?;
                Ok((rows, total))
            }
            RowScope::Mine(user_id) => {
                let rows = sqlx::query_as::<_, Notification>(&format!(
                    "SELECT {SELECT_COLS} FROM notifications WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM notifications WHERE user_id = ? AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_one(pool)
                .await?;
                Ok((rows, total))
            }
        }
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {SELECT_COLS} FROM notifications WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(notification)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        _session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
                .bind(payload.user_id)
                .fetch_one(&mut *conn)
                .await?;
        if exists == 0 {
            return Err(AppError::validation("user_id", "unknown user"));
        }

        let now = utc_now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: payload.user_id,
            title: payload.title,
            body: payload.body,
            read_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(notification)
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        let now = utc_now();
        if payload.read == Some(true) && current.read_at.is_none() {
            current.read_at = Some(now);
        }

        sqlx::query("UPDATE notifications SET read_at = ?, updated_at = ? WHERE id = ?")
            .bind(current.read_at)
            .bind(now)
            .bind(current.id)
            .execute(conn)
            .await?;

        current.updated_at = now;
        Ok(current)
    }

    async fn mark_deleted(conn: &mut SqliteConnection, id: Uuid) -> Result<(), AppError> {
        let now = utc_now();
        let affected = sqlx::query(
            "UPDATE notifications SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("notification not found"));
        }
        Ok(())
    }
}
