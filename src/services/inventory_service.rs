use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    entity::{
        inventory_transactions::{
            ActiveModel as TxnActive, Column as TxnCol, Entity as InventoryTransactions,
            Model as TxnModel,
        },
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_stall_owner},
    models::InventoryTransaction,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    routes::seller::AdjustStockRequest,
    state::AppState,
};

/// Atomically take `quantity` units of a product for a committed order.
///
/// Returns false when the conditional update finds insufficient stock (the
/// stock ran out between the checkout gate and here). The recorded `out`
/// transaction doubles as an idempotency key: a retried checkout for the
/// same order never decrements twice.
pub async fn decrement_for_order(
    state: &AppState,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<bool> {
    let already = InventoryTransactions::find()
        .filter(TxnCol::ReferenceType.eq("pre_order"))
        .filter(TxnCol::ReferenceId.eq(order_id))
        .filter(TxnCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?;
    if already.is_some() {
        return Ok(true);
    }

    // Decrement with a floor check in one statement; never read-modify-write.
    // The transaction record commits together with the decrement so the
    // idempotency key can never lag behind an applied decrement.
    let txn = state.orm.begin().await?;
    let result = Products::update_many()
        .col_expr(
            ProdCol::StockQuantity,
            Expr::col(ProdCol::StockQuantity).sub(quantity),
        )
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::StockQuantity.gte(quantity))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(false);
    }

    TxnActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        transaction_type: Set("out".into()),
        quantity: Set(quantity),
        reference_type: Set(Some("pre_order".into())),
        reference_id: Set(Some(order_id)),
        notes: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(true)
}

/// Manual stock movement by the stall owner: "in" receives stock, "out"
/// removes it (floor-checked), "adjustment" sets the absolute count.
pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<InventoryTransaction>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    ensure_stall_owner(&state.orm, user, product.stall_id).await?;

    let new_stock = match payload.transaction_type.as_str() {
        "in" => product
            .stock_quantity
            .checked_add(payload.quantity)
            .ok_or_else(|| AppError::BadRequest("stock would overflow".into()))?,
        "out" => {
            let remaining = product.stock_quantity - payload.quantity;
            if remaining < 0 {
                return Err(AppError::BadRequest("stock cannot be negative".into()));
            }
            remaining
        }
        "adjustment" => payload.quantity,
        _ => {
            return Err(AppError::BadRequest(
                "transaction_type must be in, out or adjustment".into(),
            ));
        }
    };

    let mut active: ProductActive = product.into();
    active.stock_quantity = Set(new_stock);
    active.update(&txn).await?;

    let record = TxnActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        transaction_type: Set(payload.transaction_type.clone()),
        quantity: Set(payload.quantity),
        reference_type: Set(None),
        reference_id: Set(None),
        notes: Set(payload.notes.clone()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("inventory_transactions"),
        Some(serde_json::json!({
            "product_id": product_id,
            "transaction_type": payload.transaction_type,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stock adjusted",
        transaction_from_entity(record),
        Some(Meta::empty()),
    ))
}

pub async fn list_transactions(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<InventoryTransaction>>> {
    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    ensure_stall_owner(&state.orm, user, product.stall_id).await?;

    let (page, limit, offset) = pagination.normalize();
    let finder = InventoryTransactions::find()
        .filter(TxnCol::ProductId.eq(product_id))
        .order_by_desc(TxnCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(transaction_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", items, Some(meta)))
}

fn transaction_from_entity(model: TxnModel) -> InventoryTransaction {
    InventoryTransaction {
        id: model.id,
        product_id: model.product_id,
        transaction_type: model.transaction_type,
        quantity: model.quantity,
        reference_type: model.reference_type,
        reference_id: model.reference_id,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
