use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// A stall group whose submission failed; its cart lines are kept for retry.
#[derive(Debug, Serialize, ToSchema)]
pub struct FailedStall {
    pub stall_id: Uuid,
    pub stall_name: String,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub orders: Vec<OrderWithItems>,
    pub failed_stalls: Vec<FailedStall>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    pub seller_notes: Option<String>,
}
