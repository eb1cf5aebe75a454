use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use kennelworks::authz::Role;
use kennelworks::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "kennelworks admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create the initial OWNER account
    SeedAdmin {
        name: String,
        email: String,
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may
    // differ, so fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::SeedAdmin {
            name,
            email,
            password,
        } => {
            let pool = get_pool().await?;
            seed_admin(&pool, &name, &email, &password).await?;
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;
    Ok(pool)
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrator = sqlx::migrate::Migrator::new(path).await?;
    Ok(migrator)
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let applied: Vec<i64> = sqlx::query("SELECT version FROM _sqlx_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .map(|rows| rows.iter().map(|row| row.get::<i64, _>("version")).collect())
        .unwrap_or_default();

    for migration in migrator.iter() {
        let status = if applied.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        println!("{:>6} {} [{}]", migration.version, migration.description, status);
    }

    Ok(())
}

async fn seed_admin(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_one(pool)
            .await?;
    if existing > 0 {
        anyhow::bail!("a user with email {email} already exists");
    }

    let password_hash = hash_password(password)?;
    let now = Utc::now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(Role::Owner.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    println!("Created OWNER account {email} ({user_id})");
    Ok(())
}
