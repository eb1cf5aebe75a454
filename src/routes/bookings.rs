use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::crud::{self, PageQuery, Paginated};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::booking::{Booking, BookingCreateRequest, BookingUpdateRequest};

#[utoipa::path(
    get,
    path = "/bookings",
    tag = "Bookings",
    params(PageQuery),
    responses((status = 200, description = "List bookings visible to the caller"))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<Booking>>> {
    Ok(Json(crud::list::<Booking>(&state, &auth, &query).await?))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses((status = 200, description = "Booking detail", body = Booking))
)]
pub async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    Ok(Json(crud::read::<Booking>(&state, &auth, id).await?))
}

#[utoipa::path(
    post,
    path = "/bookings",
    tag = "Bookings",
    request_body = BookingCreateRequest,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 409, description = "Kennel at capacity for the requested dates")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<BookingCreateRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let booking = crud::create::<Booking>(&state, &auth, payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    put,
    path = "/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = BookingUpdateRequest,
    responses((status = 200, description = "Booking updated", body = Booking))
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookingUpdateRequest>,
) -> AppResult<Json<Booking>> {
    Ok(Json(
        crud::update::<Booking>(&state, &auth, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses((status = 204, description = "Booking soft deleted"))
)]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    crud::delete::<Booking>(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
