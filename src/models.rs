use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Stall {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub stall_name: String,
    pub location: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub stall_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in sen.
    pub price: i64,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price cached at add-to-cart time; checkout revalidates against the
    /// current product price.
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub stall_id: Uuid,
    pub total_amount: i64,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub customer_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub payment_status: String,
    pub order_status: String,
    pub tracking_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price at time of purchase, never recomputed.
    pub unit_price: i64,
    pub subtotal: i64,
    /// Whether the inventory decrement for this line has landed.
    pub stock_adjusted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub product_id: Uuid,
    pub transaction_type: String,
    pub quantity: i32,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
