use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::audit::AuditEntry;
use crate::authz::{EntityKind, Role};
use crate::models;
use crate::routes;
use crate::tokens::OverrideScope;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::step_up,
        routes::auth::me,
        routes::auth::logout,
        routes::overrides::issue,
        routes::overrides::consume,
        routes::overrides::list,
        routes::pets::list,
        routes::pets::read,
        routes::pets::create,
        routes::pets::update,
        routes::pets::delete,
        routes::bookings::list,
        routes::bookings::read,
        routes::bookings::create,
        routes::bookings::update,
        routes::bookings::delete,
        routes::kennels::list,
        routes::kennels::read,
        routes::kennels::create,
        routes::kennels::update,
        routes::kennels::delete,
        routes::users::list,
        routes::users::read,
        routes::users::create,
        routes::users::update,
        routes::users::delete,
        routes::care_logs::list,
        routes::care_logs::read,
        routes::care_logs::create,
        routes::care_logs::update,
        routes::care_logs::delete,
        routes::notifications::list,
        routes::notifications::read,
        routes::notifications::create,
        routes::notifications::update,
        routes::notifications::delete,
        routes::audit::list,
        routes::health::health
    ),
    components(
        schemas(
            Role,
            EntityKind,
            OverrideScope,
            AuditEntry,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::StepUpRequest,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::pet::Pet,
            models::pet::PetCreateRequest,
            models::pet::PetUpdateRequest,
            models::kennel::Kennel,
            models::kennel::KennelCreateRequest,
            models::kennel::KennelUpdateRequest,
            models::booking::Booking,
            models::booking::BookingCreateRequest,
            models::booking::BookingUpdateRequest,
            models::care_log::CareLog,
            models::care_log::CareLogCreateRequest,
            models::care_log::CareLogUpdateRequest,
            models::notification::Notification,
            models::notification::NotificationCreateRequest,
            models::notification::NotificationUpdateRequest,
            models::approval::ApprovalToken,
            routes::overrides::IssueRequest,
            routes::overrides::IssueResponse,
            routes::overrides::ConsumeRequest,
            routes::overrides::ConsumeResponse,
            routes::health::HealthResponse,
            routes::auth::MessageResponse
        )
    ),
    tags(
        (name = "Auth", description = "Authentication and MFA step-up"),
        (name = "Overrides", description = "Override token issuance and consumption"),
        (name = "Pets", description = "Pet records"),
        (name = "Bookings", description = "Boarding reservations"),
        (name = "Kennels", description = "Kennel inventory"),
        (name = "Users", description = "User administration"),
        (name = "CareLogs", description = "Staff care logging"),
        (name = "Notifications", description = "User notifications"),
        (name = "Audit", description = "Audit log access"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Generated document plus the bearer-auth scheme and a default server
/// entry, so Swagger UI's Authorize dialog and Try-it-out work against
/// the running backend.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    if let Some(components) = doc
        .pointer_mut("/components")
        .and_then(|c| c.as_object_mut())
    {
        components.insert(
            "securitySchemes".to_string(),
            json!({
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            }),
        );
    }

    if doc.get("security").is_none() {
        doc["security"] = json!([{ "bearerAuth": [] }]);
    }
    if doc.get("servers").is_none() {
        doc["servers"] = json!([{ "url": format!("http://localhost:{}", port) }]);
    }

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc)?);

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json(doc_json.as_ref().clone()) }
        })
    };

    let router = Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config));

    Ok(router)
}
