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
use crate::utils::utc_now;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Pet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[schema(example = "dog")]
    pub species: String,
    pub breed: Option<String>,
    /// Health record content; masked in audit snapshots.
    pub medical_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PetCreateRequest {
    #[schema(example = "Biscuit")]
    pub name: String,
    #[schema(example = "dog")]
    pub species: Option<String>,
    pub breed: Option<String>,
    pub medical_notes: Option<String>,
    /// Only honored for staff-tier callers; customers always own the
    /// pets they register.
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PetUpdateRequest {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub medical_notes: Option<String>,
}

const SELECT_COLS: &str =
    "id, owner_id, name, species, breed, medical_notes, created_at, updated_at, deleted_at";

#[async_trait]
impl CrudEntity for Pet {
    type Create = PetCreateRequest;
    type Update = PetUpdateRequest;

    const REDACTED_FIELDS: &'static [&'static str] = &["medical_notes"];

    fn kind() -> EntityKind {
        EntityKind::Pet
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
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
                let rows = sqlx::query_as::<_, Pet>(&format!(
                    "SELECT {SELECT_COLS} FROM pets WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(1) FROM pets WHERE deleted_at IS NULL")
                        .fetch_one(pool)
                        .await?;
                Ok((rows, total))
            }
            RowScope::Mine(user_id) => {
                let rows = sqlx::query_as::<_, Pet>(&format!(
                    "SELECT {SELECT_COLS} FROM pets WHERE owner_id = ? AND deleted_at IS NULL ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM pets WHERE owner_id = ? AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_one(pool)
                .await?;
                Ok((rows, total))
            }
        }
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        let pet = sqlx::query_as::<_, Pet>(&format!(
            "SELECT {SELECT_COLS} FROM pets WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(pet)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        if payload.name.trim().is_empty() {
            return Err(AppError::validation("name", "must not be empty"));
        }

        let owner_id = match session.role {
            Role::Customer => session.user_id,
            _ => payload.owner_id.unwrap_or(session.user_id),
        };

        let now = utc_now();
        let pet = Pet {
            id: Uuid::new_v4(),
            owner_id,
            name: payload.name,
            species: payload.species.unwrap_or_else(|| "dog".to_string()),
            breed: payload.breed,
            medical_notes: payload.medical_notes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO pets (id, owner_id, name, species, breed, medical_notes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pet.id)
        .bind(pet.owner_id)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(&pet.medical_notes)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(pet)
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        if let Some(name) = payload.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name", "must not be empty"));
            }
            current.name = name;
        }
        if let Some(species) = payload.species {
            current.species = species;
        }
        if payload.breed.is_some() {
            current.breed = payload.breed;
        }
        if payload.medical_notes.is_some() {
            current.medical_notes = payload.medical_notes;
        }

        let now = utc_now();
        sqlx::query(
            "UPDATE pets SET name = ?, species = ?, breed = ?, medical_notes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&current.name)
        .bind(&current.species)
        .bind(&current.breed)
        .bind(&current.medical_notes)
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
            "UPDATE pets SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("pet not found"));
        }
        Ok(())
    }
}
