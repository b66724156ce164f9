use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartQuantityRequest {
    pub quantity: i32,
}

/// Cart line joined with its product and stall, plus the current price so
/// clients can show a stale-price hint before checkout does.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineDto {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub current_price: i64,
    pub quantity: i32,
    pub stall_id: Uuid,
    pub stall_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartLineDto>,
    pub total: i64,
}
