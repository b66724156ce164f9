use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, UpdateOrderStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{InventoryTransaction, Order},
    response::ApiResponse,
    routes::params::{OrderListQuery, Pagination},
    services::{inventory_service, seller_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_stall_orders))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/inventory/{product_id}", get(list_transactions))
        .route("/inventory/{product_id}", post(adjust_stock))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    /// "in", "out" or "adjustment".
    pub transaction_type: String,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/seller/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders for the seller's stall", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn list_stall_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = seller_service::list_stall_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/seller/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Update order status", body = ApiResponse<Order>),
        (status = 400, description = "Illegal status transition"),
        (status = 403, description = "Not the stall owner"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = seller_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/inventory/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Inventory transactions for a product", body = ApiResponse<Vec<InventoryTransaction>>),
        (status = 403, description = "Not the stall owner"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<Vec<InventoryTransaction>>>> {
    let resp = inventory_service::list_transactions(&state, &user, product_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/seller/inventory/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<InventoryTransaction>),
        (status = 400, description = "Invalid adjustment"),
        (status = 403, description = "Not the stall owner"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<ApiResponse<InventoryTransaction>>> {
    let resp = inventory_service::adjust_stock(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}
