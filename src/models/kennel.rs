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
pub struct Kennel {
    pub id: Uuid,
    pub name: String,
    #[schema(example = "medium")]
    pub size: String,
    pub capacity: i64,
    pub daily_rate_cents: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KennelCreateRequest {
    #[schema(example = "Run 4")]
    pub name: String,
    pub size: Option<String>,
    #[schema(example = 2)]
    pub capacity: Option<i64>,
    #[schema(example = 4500)]
    pub daily_rate_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KennelUpdateRequest {
    pub name: Option<String>,
    pub size: Option<String>,
    pub capacity: Option<i64>,
    pub daily_rate_cents: Option<i64>,
    pub notes: Option<String>,
}

const SELECT_COLS: &str =
    "id, name, size, capacity, daily_rate_cents, notes, created_at, updated_at, deleted_at";

pub async fn fetch_kennel(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Kennel>, AppError> {
    let kennel = sqlx::query_as::<_, Kennel>(&format!(
        "SELECT {SELECT_COLS} FROM kennels WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(kennel)
}

#[async_trait]
impl CrudEntity for Kennel {
    type Create = KennelCreateRequest;
    type Update = KennelUpdateRequest;

    fn kind() -> EntityKind {
        EntityKind::Kennel
    }

    fn id(&self) -> Uuid {
        self.id
    }

    // Facility resource; not owned by any user.
    fn owner_id(&self) -> Option<Uuid> {
        None
    }

    async fn fetch_page(
        pool: &SqlitePool,
        _scope: &RowScope,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let offset = (page - 1) * limit;
        let rows = sqlx::query_as::<_, Kennel>(&format!(
            "SELECT {SELECT_COLS} FROM kennels WHERE deleted_at IS NULL ORDER BY name ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM kennels WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        let kennel = sqlx::query_as::<_, Kennel>(&format!(
            "SELECT {SELECT_COLS} FROM kennels WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(kennel)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        _session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        if payload.name.trim().is_empty() {
            return Err(AppError::validation("name", "must not be empty"));
        }
        let capacity = payload.capacity.unwrap_or(1);
        if capacity < 1 {
            return Err(AppError::validation("capacity", "must be at least 1"));
        }

        let now = utc_now();
        let kennel = Kennel {
            id: Uuid::new_v4(),
            name: payload.name,
            size: payload.size.unwrap_or_else(|| "medium".to_string()),
            capacity,
            daily_rate_cents: payload.daily_rate_cents.unwrap_or(0),
            notes: payload.notes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO kennels (id, name, size, capacity, daily_rate_cents, notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(kennel.id)
        .bind(&kennel.name)
        .bind(&kennel.size)
        .bind(kennel.capacity)
        .bind(kennel.daily_rate_cents)
        .bind(&kennel.notes)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(kennel)
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        if let Some(name) = payload.name {
            current.name = name;
        }
        if let Some(size) = payload.size {
            current.size = size;
        }
        if let Some(capacity) = payload.capacity {
            if capacity < 1 {
                return Err(AppError::validation("capacity", "must be at least 1"));
            }
            current.capacity = capacity;
        }
        if let Some(rate) = payload.daily_rate_cents {
            current.daily_rate_cents = rate;
        }
        if payload.notes.is_some() {
            current.notes = payload.notes;
        }

        let now = utc_now();
        sqlx::query(
            "UPDATE kennels SET name = ?, size = ?, capacity = ?, daily_rate_cents = ?, notes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&current.name)
        .bind(&current.size)
        .bind(current.capacity)
        .bind(current.daily_rate_cents)
        .bind(&current.notes)
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
            "UPDATE kennels SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("kennel not found"));
        }
        Ok(())
    }
}
