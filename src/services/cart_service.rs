use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    checkout::CartLine,
    dto::cart::{AddToCartRequest, CartLineDto, CartList, UpdateCartQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::CartItem,
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartLineRow {
    product_id: Uuid,
    product_name: String,
    unit_price: i64,
    current_price: i64,
    quantity: i32,
    stall_id: Uuid,
    stall_name: String,
}

/// The user's cart lines in add order, joined with product and stall. This
/// is the read the checkout flow starts from.
pub async fn load_cart_lines(state: &AppState, user: &AuthUser) -> AppResult<Vec<CartLine>> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.product_id, p.name AS product_name, ci.unit_price,
               p.price AS current_price, ci.quantity,
               s.id AS stall_id, s.stall_name
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        JOIN stalls s ON s.id = p.stall_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at ASC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| CartLine {
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            stall_id: row.stall_id,
            stall_name: row.stall_name,
        })
        .collect())
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    ensure_customer(user)?;
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.product_id, p.name AS product_name, ci.unit_price,
               p.price AS current_price, ci.quantity,
               s.id AS stall_id, s.stall_name
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        JOIN stalls s ON s.id = p.stall_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at ASC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<CartLineDto> = rows
        .into_iter()
        .map(|row| CartLineDto {
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            current_price: row.current_price,
            quantity: row.quantity,
            stall_id: row.stall_id,
            stall_name: row.stall_name,
        })
        .collect();

    let total = items
        .iter()
        .map(|i| i.unit_price * i64::from(i.quantity))
        .sum();

    Ok(ApiResponse::success(
        "OK",
        CartList { items, total },
        Some(Meta::empty()),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    // Fresh availability check before the line lands in the cart.
    let product: Option<(i64, bool, i32)> =
        sqlx::query_as("SELECT price, is_available, stock_quantity FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(&state.pool)
            .await?;
    let (price, is_available, stock_quantity) = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };
    if !is_available || stock_quantity <= 0 {
        return Err(AppError::BadRequest("product is out of stock".to_string()));
    }

    // Duplicate product lines merge by summing quantities; the cached
    // unit_price from the first add is kept so a later price change still
    // trips the checkout revalidator.
    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartQuantityRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if payload.quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE user_id = $1 AND product_id = $2
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .bind(payload.quantity)
    .fetch_optional(&state.pool)
    .await?;

    match cart_item {
        Some(item) => Ok(ApiResponse::success("OK", item, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
