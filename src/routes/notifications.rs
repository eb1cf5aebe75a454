use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::crud::{self, PageQuery, Paginated};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::notification::{
    Notification, NotificationCreateRequest, NotificationUpdateRequest,
};

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    params(PageQuery),
    responses((status = 200, description = "List notifications visible to the caller"))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<Notification>>> {
    Ok(Json(
        crud::list::<Notification>(&state, &auth, &query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/notifications/{id}",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Notification detail", body = Notification))
)]
pub async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    Ok(Json(crud::read::<Notification>(&state, &auth, id).await?))
}

#[utoipa::path(
    post,
    path = "/notifications",
    tag = "Notifications",
    request_body = NotificationCreateRequest,
    responses((status = 201, description = "Notification created", body = Notification))
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NotificationCreateRequest>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    let notification = crud::create::<Notification>(&state, &auth, payload).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    request_body = NotificationUpdateRequest,
    responses((status = 200, description = "Notification updated", body = Notification))
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NotificationUpdateRequest>,
) -> AppResult<Json<Notification>> {
    Ok(Json(
        crud::update::<Notification>(&state, &auth, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 204, description = "Notification soft deleted"))
)]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    crud::delete::<Notification>(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
