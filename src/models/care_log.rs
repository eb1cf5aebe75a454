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

pub const ACTIVITIES: [&str; 5] = ["feeding", "walk", "medication", "grooming", "observation"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CareLog {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Customer of the booking, denormalized for row scoping.
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    #[schema(example = "medication")]
    pub activity: String,
    /// Free-text care notes; masked in audit snapshots.
    pub notes: Option<String>,
    pub logged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CareLogCreateRequest {
    pub booking_id: Uuid,
    #[schema(example = "walk")]
    pub activity: String,
    pub notes: Option<String>,
    pub logged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CareLogUpdateRequest {
    pub activity: Option<String>,
    pub notes: Option<String>,
}

const SELECT_COLS: &str = "id, booking_id, customer_id, staff_id, activity, notes, logged_at, created_at, updated_at, deleted_at";

fn validate_activity(activity: &str) -> Result<(), AppError> {
    if !ACTIVITIES.contains(&activity) {
        return Err(AppError::validation(
            "activity",
            format!("must be one of {:?}", ACTIVITIES),
        ));
    }
    Ok(())
}

#[async_trait]
impl CrudEntity for CareLog {
    type Create = CareLogCreateRequest;
    type Update = CareLogUpdateRequest;

    const REDACTED_FIELDS: &'static [&'static str] = &["notes"];

    fn kind() -> EntityKind {
        EntityKind::CareLog
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.customer_id)
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
                let rows = sqlx::query_as::<_, CareLog>(&format!(
                    "SELECT {SELECT_COLS} FROM care_logs WHERE deleted_at IS NULL ORDER BY logged_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(1) FROM care_logs WHERE deleted_at IS NULL")
                        .fetch_one(pool)
                        .await?;
                Ok((rows, total))
            }
            RowScope::Mine(user_id) => {
                let rows = sqlx::query_as::<_, CareLog>(&format!(
                    "SELECT {SELECT_COLS} FROM care_logs WHERE customer_id = ? AND deleted_at IS NULL ORDER BY logged_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM care_logs WHERE customer_id = ? AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_one(pool)
                .await?;
                Ok((rows, total))
            }
        }
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        let log = sqlx::query_as::<_, CareLog>(&format!(
            "SELECT {SELECT_COLS} FROM care_logs WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(log)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        validate_activity(&payload.activity)?;

        let customer_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT customer_id FROM bookings WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(payload.booking_id)
        .fetch_optional(&mut *conn)
        .await?;
        let customer_id =
            customer_id.ok_or_else(|| AppError::validation("booking_id", "unknown booking"))?;

        let now = utc_now();
        let log = CareLog {
            id: Uuid::new_v4(),
            booking_id: payload.booking_id,
            customer_id,
            staff_id: session.user_id,
            activity: payload.activity,
            notes: payload.notes,
            logged_at: payload.logged_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO care_logs (id, booking_id, customer_id, staff_id, activity, notes, logged_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.id)
        .bind(log.booking_id)
        .bind(log.customer_id)
        .bind(log.staff_id)
        .bind(&log.activity)
        .bind(&log.notes)
        .bind(log.logged_at)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(log)
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        if let Some(activity) = payload.activity {
            validate_activity(&activity)?;
            current.activity = activity;
        }
        if payload.notes.is_some() {
            current.notes = payload.notes;
        }

        let now = utc_now();
        sqlx::query("UPDATE care_logs SET activity = ?, notes = ?, updated_at = ? WHERE id = ?")
            .bind(&current.activity)
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
            "UPDATE care_logs SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("care log not found"));
        }
        Ok(())
    }
}
