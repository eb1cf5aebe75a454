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
use crate::utils::{hash_password, utc_now};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let role = Role::parse(&value.role)
            .ok_or_else(|| AppError::internal(format!("unknown role in storage: {}", value.role)))?;

        Ok(User {
            id: value.id,
            name: value.name,
            email: value.email,
            role,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StepUpRequest {
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    /// Dashboard route for this role, from the role registry.
    pub landing: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

pub async fn email_available(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<bool, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_one(conn)
            .await?;
    Ok(count == 0)
}

pub async fn fetch_db_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<DbUser>, AppError> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, created_at, updated_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn fetch_db_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<DbUser>, AppError> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, created_at, updated_at, deleted_at FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[async_trait]
impl CrudEntity for User {
    type Create = UserCreateRequest;
    type Update = UserUpdateRequest;

    fn kind() -> EntityKind {
        EntityKind::User
    }

    fn id(&self) -> Uuid {
        self.id
    }

    // A user row belongs to itself; customers resolve to their own row.
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    async fn fetch_page(
        pool: &SqlitePool,
        scope: &RowScope,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let offset = (page - 1) * limit;
        let (rows, total) = match scope {
            RowScope::All => {
                let rows = sqlx::query_as::<_, DbUser>(
                    "SELECT id, name, email, password_hash, role, created_at, updated_at, deleted_at FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE deleted_at IS NULL")
                        .fetch_one(pool)
                        .await?;
                (rows, total)
            }
            RowScope::Mine(user_id) => {
                let rows = sqlx::query_as::<_, DbUser>(
                    "SELECT id, name, email, password_hash, role, created_at, updated_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL LIMIT ? OFFSET ?",
                )
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_one(pool)
                .await?;
                (rows, total)
            }
        };

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    async fn fetch_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, AppError> {
        fetch_db_user(pool, id).await?.map(User::try_from).transpose()
    }

    async fn insert(
        conn: &mut SqliteConnection,
        _session: &AuthUser,
        payload: Self::Create,
    ) -> Result<Self, AppError> {
        if !email_available(conn, &payload.email).await? {
            return Err(AppError::conflict("email already in use"));
        }

        let password_hash = hash_password(&payload.password)?;
        let now = utc_now();
        let user_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(password_hash)
        .bind(payload.role.as_str())
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(User {
            id: user_id,
            name: payload.name,
            email: payload.email,
            role: payload.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    async fn update_row(
        conn: &mut SqliteConnection,
        mut current: Self,
        payload: Self::Update,
    ) -> Result<Self, AppError> {
        if let Some(name) = payload.name {
            current.name = name;
        }
        if let Some(email) = payload.email {
            if email != current.email && !email_available(&mut *conn, &email).await? {
                return Err(AppError::conflict("email already in use"));
            }
            current.email = email;
        }
        if let Some(role) = payload.role {
            current.role = role;
        }

        let now = utc_now();

        sqlx::query("UPDATE users SET name = ?, email = ?, role = ?, updated_at = ? WHERE id = ?")
            .bind(&current.name)
            .bind(&current.email)
            .bind(current.role.as_str())
            .bind(now)
            .bind(current.id)
            .execute(&mut *conn)
            .await?;

        if let Some(password) = payload.password {
            let password_hash = hash_password(&password)?;
            sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                .bind(password_hash)
                .bind(current.id)
                .execute(conn)
                .await?;
        }

        current.updated_at = now;
        Ok(current)
    }

    async fn mark_deleted(conn: &mut SqliteConnection, id: Uuid) -> Result<(), AppError> {
        let now = utc_now();
        let affected = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(())
    }
}
