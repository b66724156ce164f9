use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    checkout::{self, CartLine, CurrentProduct},
    dto::orders::{CheckoutRequest, CheckoutResponse, FailedStall, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, inventory_service},
    state::AppState,
};

const TRACKING_CODE_ATTEMPTS: usize = 3;

/// Place pre-orders from the customer's cart: revalidate, partition by
/// stall, submit one order per stall, then clear the submitted lines.
///
/// The precondition gate is all-or-nothing: any unavailable or price-changed
/// product aborts the whole checkout before a single write. Group submission
/// is transactional per stall; the stock decrement that follows each commit
/// is best-effort and idempotent, so a rejected decrement leaves the order
/// standing with its line flagged instead of failing the flow.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    ensure_customer(user)?;

    let (pickup_date, pickup_time) = match (payload.pickup_date, payload.pickup_time) {
        (Some(date), Some(time)) => (date, time),
        _ => {
            return Err(AppError::BadRequest(
                "pickup date and time are required".into(),
            ));
        }
    };
    if pickup_date <= Utc::now().date_naive() {
        return Err(AppError::BadRequest(
            "pickup date must be at least tomorrow".into(),
        ));
    }

    let lines = cart_service::load_cart_lines(state, user).await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    // One batched read of current product state for the whole cart.
    let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    product_ids.dedup();
    let current: HashMap<Uuid, CurrentProduct> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| {
            (
                p.id,
                CurrentProduct {
                    price: p.price,
                    stock_quantity: p.stock_quantity,
                    is_available: p.is_available,
                },
            )
        })
        .collect();

    let revalidation = checkout::revalidate(&lines, &current);
    if !revalidation.is_clean() {
        return Err(AppError::Conflict(revalidation.rejection_message()));
    }

    let mut orders: Vec<OrderWithItems> = Vec::new();
    let mut failed_stalls: Vec<FailedStall> = Vec::new();
    let mut cleared_product_ids: Vec<Uuid> = Vec::new();

    for (stall_id, group) in checkout::partition_by_stall(&lines) {
        match submit_group(
            state,
            user,
            stall_id,
            &group,
            &current,
            pickup_date,
            pickup_time,
            payload.notes.as_deref(),
        )
        .await
        {
            Ok(order_with_items) => {
                cleared_product_ids.extend(group.iter().map(|l| l.product_id));
                orders.push(order_with_items);
            }
            Err(err) => {
                tracing::error!(stall_id = %stall_id, error = %err, "order submission failed");
                failed_stalls.push(FailedStall {
                    stall_id,
                    stall_name: group
                        .first()
                        .map(|l| l.stall_name.clone())
                        .unwrap_or_default(),
                    error: "Failed to place order for this stall".into(),
                });
            }
        }
    }

    if orders.is_empty() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "checkout failed for every stall"
        )));
    }

    // Clear only the lines that were actually submitted; failed groups stay
    // in the cart for retry.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.is_in(cleared_product_ids))
        .exec(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.order.id).collect();
    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("pre_orders"),
        Some(serde_json::json!({ "order_ids": order_ids })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if failed_stalls.is_empty() {
        "Checkout success"
    } else {
        "Checkout partially succeeded"
    };
    Ok(ApiResponse::success(
        message,
        CheckoutResponse {
            orders,
            failed_stalls,
        },
        Some(Meta::empty()),
    ))
}

/// Create one pre-order and its items for a single stall group, then run the
/// post-commit stock decrements. Order + items are all-or-nothing; the
/// tracking code regenerates on a unique-constraint conflict.
#[allow(clippy::too_many_arguments)]
async fn submit_group(
    state: &AppState,
    user: &AuthUser,
    stall_id: Uuid,
    group: &[CartLine],
    current: &HashMap<Uuid, CurrentProduct>,
    pickup_date: chrono::NaiveDate,
    pickup_time: chrono::NaiveTime,
    notes: Option<&str>,
) -> AppResult<OrderWithItems> {
    let total_amount = checkout::group_total(group, current);

    let mut last_err: Option<AppError> = None;
    for _ in 0..TRACKING_CODE_ATTEMPTS {
        let txn = state.orm.begin().await?;
        let order = match insert_order(
            &txn,
            user,
            stall_id,
            total_amount,
            pickup_date,
            pickup_time,
            notes,
        )
        .await
        {
            Ok(order) => order,
            Err(AppError::OrmError(err))
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                // Tracking code collision; roll back and try a fresh one.
                txn.rollback().await?;
                last_err = Some(AppError::OrmError(err));
                continue;
            }
            Err(err) => {
                txn.rollback().await?;
                return Err(err);
            }
        };

        let mut items: Vec<OrderItemModel> = Vec::with_capacity(group.len());
        for line in group {
            let unit_price = current
                .get(&line.product_id)
                .map(|p| p.price)
                .unwrap_or(line.unit_price);
            let item = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(unit_price),
                subtotal: Set(unit_price * i64::from(line.quantity)),
                stock_adjusted: Set(false),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        let items = apply_stock_decrements(state, user, &order, items).await;

        return Ok(OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        });
    }

    Err(last_err.unwrap_or_else(|| {
        AppError::Internal(anyhow::anyhow!("could not generate a unique tracking code"))
    }))
}

async fn insert_order(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    stall_id: Uuid,
    total_amount: i64,
    pickup_date: chrono::NaiveDate,
    pickup_time: chrono::NaiveTime,
    notes: Option<&str>,
) -> AppResult<OrderModel> {
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(user.user_id),
        stall_id: Set(stall_id),
        total_amount: Set(total_amount),
        pickup_date: Set(pickup_date),
        pickup_time: Set(pickup_time),
        customer_notes: Set(notes.map(str::to_string)),
        seller_notes: Set(None),
        payment_status: Set("pending".into()),
        order_status: Set("pending".into()),
        tracking_code: Set(checkout::generate_tracking_code()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;
    Ok(order)
}

/// Best-effort inventory adjustment after the order committed. The order is
/// already durable at this point, so nothing here may fail the flow: a
/// rejected decrement (stock ran out between the gate and here) and a hard
/// database error are both logged and audited and leave the line's
/// stock_adjusted flag false for manual review.
async fn apply_stock_decrements(
    state: &AppState,
    user: &AuthUser,
    order: &OrderModel,
    items: Vec<OrderItemModel>,
) -> Vec<OrderItemModel> {
    let mut out = Vec::with_capacity(items.len());
    for mut item in items {
        let adjusted = match inventory_service::decrement_for_order(
            state,
            order.id,
            item.product_id,
            item.quantity,
        )
        .await
        {
            Ok(adjusted) => adjusted,
            Err(err) => {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %err,
                    "stock decrement errored after order commit"
                );
                false
            }
        };
        if adjusted {
            let flagged = OrderItems::update_many()
                .col_expr(OrderItemCol::StockAdjusted, Expr::value(true))
                .filter(OrderItemCol::Id.eq(item.id))
                .exec(&state.orm)
                .await;
            match flagged {
                Ok(_) => item.stock_adjusted = true,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to flag order item as stock adjusted");
                }
            }
        }
        if !item.stock_adjusted {
            tracing::warn!(
                order_id = %order.id,
                product_id = %item.product_id,
                quantity = item.quantity,
                "stock decrement did not land for committed order"
            );
            if let Err(err) = log_audit(
                &state.pool,
                Some(user.user_id),
                "stock_decrement_failed",
                Some("pre_orders"),
                Some(serde_json::json!({
                    "order_id": order.id,
                    "product_id": item.product_id,
                    "quantity": item.quantity,
                })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
        }
        out.push(item);
    }
    out
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_customer(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::CustomerId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderStatus.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::CustomerId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Customer confirms payment for a pending order.
pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::CustomerId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.payment_status == "paid" {
        return Err(AppError::BadRequest("Order already paid".into()));
    }
    if order.order_status == "cancelled" {
        return Err(AppError::BadRequest("Order is cancelled".into()));
    }

    let mut active: OrderActive = order.into();
    active.payment_status = Set("paid".into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_paid",
        Some("pre_orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        stall_id: model.stall_id,
        total_amount: model.total_amount,
        pickup_date: model.pickup_date,
        pickup_time: model.pickup_time,
        customer_notes: model.customer_notes,
        seller_notes: model.seller_notes,
        payment_status: model.payment_status,
        order_status: model.order_status,
        tracking_code: model.tracking_code,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        subtotal: model.subtotal,
        stock_adjusted: model.stock_adjusted,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
