//! Pet router: thin handlers over the CRUD engine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::crud::{self, PageQuery, Paginated};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::pet::{Pet, PetCreateRequest, PetUpdateRequest};

#[utoipa::path(
    get,
    path = "/pets",
    tag = "Pets",
    params(PageQuery),
    responses((status = 200, description = "List pets visible to the caller"))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<Pet>>> {
    Ok(Json(crud::list::<Pet>(&state, &auth, &query).await?))
}

#[utoipa::path(
    get,
    path = "/pets/{id}",
    tag = "Pets",
    params(("id" = Uuid, Path, description = "Pet id")),
    responses((status = 200, description = "Pet detail", body = Pet))
)]
pub async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Pet>> {
    Ok(Json(crud::read::<Pet>(&state, &auth, id).await?))
}

#[utoipa::path(
    post,
    path = "/pets",
    tag = "Pets",
    request_body = PetCreateRequest,
    responses((status = 201, description = "Pet created", body = Pet))
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PetCreateRequest>,
) -> AppResult<(StatusCode, Json<Pet>)> {
    let pet = crud::create::<Pet>(&state, &auth, payload).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

#[utoipa::path(
    put,
    path = "/pets/{id}",
    tag = "Pets",
    params(("id" = Uuid, Path, description = "Pet id")),
    request_body = PetUpdateRequest,
    responses((status = 200, description = "Pet updated", body = Pet))
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PetUpdateRequest>,
) -> AppResult<Json<Pet>> {
    Ok(Json(crud::update::<Pet>(&state, &auth, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/pets/{id}",
    tag = "Pets",
    params(("id" = Uuid, Path, description = "Pet id")),
    responses((status = 204, description = "Pet soft deleted"))
)]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    crud::delete::<Pet>(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
