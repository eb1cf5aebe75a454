use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::crud::{self, PageQuery, Paginated};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::kennel::{Kennel, KennelCreateRequest, KennelUpdateRequest};

#[utoipa::path(
    get,
    path = "/kennels",
    tag = "Kennels",
    params(PageQuery),
    responses((status = 200, description = "List kennels"))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<Kennel>>> {
    Ok(Json(crud::list::<Kennel>(&state, &auth, &query).await?))
}

#[utoipa::path(
    get,
    path = "/kennels/{id}",
    tag = "Kennels",
    params(("id" = Uuid, Path, description = "Kennel id")),
    responses((status = 200, description = "Kennel detail", body = Kennel))
)]
pub async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Kennel>> {
    Ok(Json(crud::read::<Kennel>(&state, &auth, id).await?))
}

#[utoipa::path(
    post,
    path = "/kennels",
    tag = "Kennels",
    request_body = KennelCreateRequest,
    responses((status = 201, description = "Kennel created", body = Kennel))
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<KennelCreateRequest>,
) -> AppResult<(StatusCode, Json<Kennel>)> {
    let kennel = crud::create::<Kennel>(&state, &auth, payload).await?;
    Ok((StatusCode::CREATED, Json(kennel)))
}

#[utoipa::path(
    put,
    path = "/kennels/{id}",
    tag = "Kennels",
    params(("id" = Uuid, Path, description = "Kennel id")),
    request_body = KennelUpdateRequest,
    responses((status = 200, description = "Kennel updated", body = Kennel))
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<KennelUpdateRequest>,
) -> AppResult<Json<Kennel>> {
    Ok(Json(
        crud::update::<Kennel>(&state, &auth, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/kennels/{id}",
    tag = "Kennels",
    params(("id" = Uuid, Path, description = "Kennel id")),
    responses((status = 204, description = "Kennel soft deleted"))
)]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    crud::delete::<Kennel>(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
