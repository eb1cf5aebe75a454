use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppSettings;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{
    audit, auth, bookings, care_logs, health, kennels, notifications, overrides, pets, users,
};
use crate::tokens::OverrideTokenCodec;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub codec: Arc<OverrideTokenCodec>,
    pub settings: Arc<AppSettings>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        jwt: JwtConfig,
        codec: OverrideTokenCodec,
        settings: AppSettings,
    ) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            codec: Arc::new(codec),
            settings: Arc::new(settings),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let codec = OverrideTokenCodec::from_env()?;
    let settings = AppSettings::from_env();
    let state = AppState::new(pool, jwt_config, codec, settings);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/step-up", post(auth::step_up))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let override_routes = Router::new()
        .route("/", get(overrides::list))
        .route("/issue", post(overrides::issue))
        .route("/consume", post(overrides::consume));

    let pet_routes = Router::new()
        .route("/", get(pets::list))
        .route("/", post(pets::create))
        .route("/:id", get(pets::read))
        .route("/:id", put(pets::update))
        .route("/:id", delete(pets::delete));

    let booking_routes = Router::new()
        .route("/", get(bookings::list))
        .route("/", post(bookings::create))
        .route("/:id", get(bookings::read))
        .route("/:id", put(bookings::update))
        .route("/:id", delete(bookings::delete));

    let kennel_routes = Router::new()
        .route("/", get(kennels::list))
        .route("/", post(kennels::create))
        .route("/:id", get(kennels::read))
        .route("/:id", put(kennels::update))
        .route("/:id", delete(kennels::delete));

    let user_routes = Router::new()
        .route("/", get(users::list))
        .route("/", post(users::create))
        .route("/:id", get(users::read))
        .route("/:id", put(users::update))
        .route("/:id", delete(users::delete));

    let care_log_routes = Router::new()
        .route("/", get(care_logs::list))
        .route("/", post(care_logs::create))
        .route("/:id", get(care_logs::read))
        .route("/:id", put(care_logs::update))
        .route("/:id", delete(care_logs::delete));

    let notification_routes = Router::new()
        .route("/", get(notifications::list))
        .route("/", post(notifications::create))
        .route("/:id", get(notifications::read))
        .route("/:id", put(notifications::update))
        .route("/:id", delete(notifications::delete));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/overrides", override_routes)
        .nest("/pets", pet_routes)
        .nest("/bookings", booking_routes)
        .nest("/kennels", kennel_routes)
        .nest("/users", user_routes)
        .nest("/care-logs", care_log_routes)
        .nest("/notifications", notification_routes)
        .route("/audit", get(audit::list))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
