use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::stalls::{CreateStallRequest, StallList, UpdateStallRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Stall,
    response::ApiResponse,
    routes::params::Pagination,
    services::stall_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stalls))
        .route("/", post(create_stall))
        .route("/{id}", get(get_stall))
        .route("/{id}", put(update_stall))
}

#[utoipa::path(
    get,
    path = "/api/stalls",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List stalls", body = ApiResponse<StallList>)
    ),
    tag = "Stalls"
)]
pub async fn list_stalls(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<StallList>>> {
    let resp = stall_service::list_stalls(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/stalls/{id}",
    params(
        ("id" = Uuid, Path, description = "Stall ID")
    ),
    responses(
        (status = 200, description = "Get stall", body = ApiResponse<Stall>),
        (status = 404, description = "Stall not found"),
    ),
    tag = "Stalls"
)]
pub async fn get_stall(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Stall>>> {
    let resp = stall_service::get_stall(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/stalls",
    request_body = CreateStallRequest,
    responses(
        (status = 201, description = "Create stall", body = ApiResponse<Stall>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stalls"
)]
pub async fn create_stall(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStallRequest>,
) -> AppResult<Json<ApiResponse<Stall>>> {
    let resp = stall_service::create_stall(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/stalls/{id}",
    params(
        ("id" = Uuid, Path, description = "Stall ID")
    ),
    request_body = UpdateStallRequest,
    responses(
        (status = 200, description = "Updated stall", body = ApiResponse<Stall>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Stall not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stalls"
)]
pub async fn update_stall(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStallRequest>,
) -> AppResult<Json<ApiResponse<Stall>>> {
    let resp = stall_service::update_stall(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
