use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Stall;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStallRequest {
    pub stall_name: String,
    pub location: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStallRequest {
    pub stall_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StallList {
    pub items: Vec<Stall>,
}
