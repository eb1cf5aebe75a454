use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{EntityKind, Role, RowScope};
use crate::crud::CrudEntity;
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::models::kennel::fetch_kennel;
use crate::utils::utc_now;

pub const STATUSES: [&str; 5] = [
    "pending",
    "confirmed",
    "checked_in",
    "checked_out",
    "cancelled",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Uuid,
    pub kennel_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[schema(example = "pending")]
    pub status: String,
    pub deposit_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookingCreateRequest {
    pub pet_id: Uuid,
    pub kennel_id: Uuid,
    #[schema(format = DateTime, example = "2025-11-03T09:00:00Z")]
    pub start_date: DateTime<Utc>,
    #[schema(format = DateTime, example = "2025-11-07T17:00:00Z")]
    pub end_date: DateTime<Utc>,
    pub deposit_cents: Option<i64>,
    /// Staff-tier callers may book on behalf of a customer; customers
    /// always book for themselves.
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookingUpdateRequest {
    #[schema(example = "cancelled")]
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub deposit_cents: Option<i64>,
}

const SELECT_COLS: &str = "id, customer_id, pet_id, kennel_id, start_date, end_date, status, deposit_cents, total_cents, created_at, updated_at, deleted_at";

/// Overlapping, non-cancelled bookings currently holding a spot in the
/// kennel over the given window.
async fn occupancy(
    conn: &mut SqliteConnection,
    kennel_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM bookings WHERE kennel_id = ? AND deleted_at IS NULL AND status != 'cancelled' AND start_date < ? AND end_date > ?",
    )
    .bind(kennel_id)
    .bind(end)
    .bind(start)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::validation(
            "end_date",
            "must be after start_date",
        ));
    }
    Ok(())
}

fn nightly_total(start: DateTime<Utc>, end: DateTime<Utc>, daily_rate_cents: i64) -> i64 {
    let nights = (end - start).num_days().max(1);
    nights * daily_rate_cents
}

#[async_trait]
impl CrudEntity for Booking {
    type Create = BookingCreateRequest;
    type Update = BookingUpdateRequest;

    fn kind() -> EntityKind {
        EntityKind::Booking
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
                let rows = sqlx::query_as::<_, Booking>(&format!(
                    "SELECT {SELECT_COLS} FROM bookings WHERE deleted_at IS NULL ORDER BY start_date DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(1) FROM bookings WHERE deleted_at IS NULL")
                        .fetch_one(pool)
                        .await?;
                Ok((rows, total))
            }
            RowScope::Mine(user_id) => {
                let rows = sqlx::query_as::<_, Booking>(&format!(
                    "SELECT {SELECT_COLS} FROM bookings WHERE customer_id = ? AND deleted_at IS NULL ORDER BY start_date DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM bookings WHERE customer_id = ? AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_one(pool)
                .await?;
                Ok((rows, total))
            }
        }
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {SELECT_COLS} FROM bookings WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(booking)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        validate_window(payload.start_date, payload.end_date)?;

        let customer_id = match session.role {
            Role::Customer => session.user_id,
            _ => payload.customer_id.unwrap_or(session.user_id),
        };

        // Pet must exist and, for customers, be their own.
        let pet_owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT owner_id FROM pets WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(payload.pet_id)
        .fetch_optional(&mut *conn)
        .await?;
        let pet_owner =
            pet_owner.ok_or_else(|| AppError::validation("pet_id", "unknown pet"))?;
        if session.role == Role::Customer && pet_owner != session.user_id {
            return Err(AppError::forbidden("pet does not belong to the caller"));
        }

        let kennel = fetch_kennel(&mut *conn, payload.kennel_id)
            .await?
            .ok_or_else(|| AppError::validation("kennel_id", "unknown kennel"))?;

        let occupied = occupancy(
            &mut *conn,
            kennel.id,
            payload.start_date,
            payload.end_date,
        )
        .await?;
        if occupied >= kennel.capacity {
            return Err(AppError::conflict(
                "kennel at capacity for the requested dates",
            ));
        }

        let now = utc_now();
        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id,
            pet_id: payload.pet_id,
            kennel_id: kennel.id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            status: "pending".to_string(),
            deposit_cents: payload.deposit_cents.unwrap_or(0),
            total_cents: nightly_total(
                payload.start_date,
                payload.end_date,
                kennel.daily_rate_cents,
            ),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO bookings (id, customer_id, pet_id, kennel_id, start_date, end_date, status, deposit_cents, total_cents, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(booking.id)
        .bind(booking.customer_id)
        .bind(booking.pet_id)
        .bind(booking.kennel_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(&booking.status)
        .bind(booking.deposit_cents)
        .bind(booking.total_cents)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(booking)
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        if let Some(status) = payload.status {
            if !STATUSES.contains(&status.as_str()) {
                return Err(AppError::validation(
                    "status",
                    format!("must be one of {:?}", STATUSES),
                ));
            }
            current.status = status;
        }
        if let Some(start) = payload.start_date {
            current.start_date = start;
        }
        if let Some(end) = payload.end_date {
            current.end_date = end;
        }
        validate_window(current.start_date, current.end_date)?;

        if let Some(deposit) = payload.deposit_cents {
            current.deposit_cents = deposit;
        }

        let now = utc_now();
        sqlx::query(
            "UPDATE bookings SET status = ?, start_date = ?, end_date = ?, deposit_cents = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&current.status)
        .bind(current.start_date)
        .bind(current.end_date)
        .bind(current.deposit_cents)
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
            "UPDATE bookings SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("booking not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn totals_are_per_night_with_a_one_night_floor() {
        let start = Utc::now();
        assert_eq!(nightly_total(start, start + Duration::days(4), 4500), 18_000);
        // Sub-day stays still bill one night.
        assert_eq!(nightly_total(start, start + Duration::hours(6), 4500), 4500);
    }

    #[test]
    fn window_validation_rejects_inverted_ranges() {
        let start = Utc::now();
        assert!(validate_window(start, start - Duration::days(1)).is_err());
        assert!(validate_window(start, start).is_err());
        assert!(validate_window(start, start + Duration::days(1)).is_ok());
    }
}
