use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, UpdateOrderStatusRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        stalls::{Column as StallCol, Entity as Stalls},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_order_stall_owner, ensure_seller},
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::order_from_entity,
    state::AppState,
};

pub const ORDER_STATUSES: [&str; 6] = [
    "pending",
    "confirmed",
    "preparing",
    "ready",
    "completed",
    "cancelled",
];

/// Legal order-status moves. A pre-order walks pending -> confirmed ->
/// preparing -> ready -> completed; cancellation is allowed any time before
/// the food is ready.
pub fn status_transition_allowed(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("pending", "confirmed")
            | ("pending", "cancelled")
            | ("confirmed", "preparing")
            | ("confirmed", "cancelled")
            | ("preparing", "ready")
            | ("preparing", "cancelled")
            | ("ready", "completed")
    )
}

/// Orders for the stalls the authenticated seller owns.
pub async fn list_stall_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_seller(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let stall_ids: Vec<Uuid> = Stalls::find()
        .filter(StallCol::SellerId.eq(user.user_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    let mut condition = Condition::all().add(OrderCol::StallId.is_in(stall_ids));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderStatus.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    if !ORDER_STATUSES.contains(&payload.status.as_str()) {
        return Err(AppError::BadRequest("Invalid order status".into()));
    }
    ensure_order_stall_owner(&state.orm, user, id).await?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !status_transition_allowed(&existing.order_status, &payload.status) {
        return Err(AppError::BadRequest(format!(
            "cannot move order from {} to {}",
            existing.order_status, payload.status
        )));
    }

    let mut active: OrderActive = existing.into();
    active.order_status = Set(payload.status);
    if let Some(notes) = payload.seller_notes {
        active.seller_notes = Set(Some(notes));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("pre_orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.order_status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}
