use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::crud::{self, PageQuery, Paginated};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::care_log::{CareLog, CareLogCreateRequest, CareLogUpdateRequest};

#[utoipa::path(
    get,
    path = "/care-logs",
    tag = "CareLogs",
    params(PageQuery),
    responses((status = 200, description = "List care logs visible to the caller"))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<CareLog>>> {
    Ok(Json(crud::list::<CareLog>(&state, &auth, &query).await?))
}

#[utoipa::path(
    get,
    path = "/care-logs/{id}",
    tag = "CareLogs",
    params(("id" = Uuid, Path, description = "Care log id")),
    responses((status = 200, description = "Care log detail", body = CareLog))
)]
pub async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CareLog>> {
    Ok(Json(crud::read::<CareLog>(&state, &auth, id).await?))
}

#[utoipa::path(
    post,
    path = "/care-logs",
    tag = "CareLogs",
    request_body = CareLogCreateRequest,
    responses((status = 201, description = "Care log recorded", body = CareLog))
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CareLogCreateRequest>,
) -> AppResult<(StatusCode, Json<CareLog>)> {
    let log = crud::create::<CareLog>(&state, &auth, payload).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

#[utoipa::path(
    put,
    path = "/care-logs/{id}",
    tag = "CareLogs",
    params(("id" = Uuid, Path, description = "Care log id")),
    request_body = CareLogUpdateRequest,
    responses((status = 200, description = "Care log updated", body = CareLog))
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CareLogUpdateRequest>,
) -> AppResult<Json<CareLog>> {
    Ok(Json(
        crud::update::<CareLog>(&state, &auth, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/care-logs/{id}",
    tag = "CareLogs",
    params(("id" = Uuid, Path, description = "Care log id")),
    responses((status = 204, description = "Care log soft deleted"))
)]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    crud::delete::<CareLog>(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
