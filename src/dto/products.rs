use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub stall_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock_quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
