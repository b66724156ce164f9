use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::dto::stalls::{CreateStallRequest, StallList, UpdateStallRequest};
use crate::{
    audit::log_audit,
    entity::stalls::{ActiveModel, Column, Entity as Stalls, Model as StallModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller, ensure_stall_owner},
    models::Stall,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_stalls(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<StallList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Stalls::find().order_by_asc(Column::StallName);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(stall_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Stalls", StallList { items }, Some(meta)))
}

pub async fn get_stall(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Stall>> {
    let stall = Stalls::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(stall_from_entity);
    let stall = match stall {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Stall", stall, None))
}

pub async fn create_stall(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStallRequest,
) -> AppResult<ApiResponse<Stall>> {
    ensure_seller(user)?;

    // One stall per seller.
    let existing = Stalls::find()
        .filter(Column::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest("seller already has a stall".into()));
    }

    let stall = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(user.user_id),
        stall_name: Set(payload.stall_name),
        location: Set(payload.location),
        description: Set(payload.description),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "stall_create",
        Some("stalls"),
        Some(serde_json::json!({ "stall_id": stall.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stall created",
        stall_from_entity(stall),
        Some(Meta::empty()),
    ))
}

pub async fn update_stall(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateStallRequest,
) -> AppResult<ApiResponse<Stall>> {
    ensure_stall_owner(&state.orm, user, id).await?;
    let existing = Stalls::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(stall_name) = payload.stall_name {
        active.stall_name = Set(stall_name);
    }
    if let Some(location) = payload.location {
        active.location = Set(location);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }

    let stall = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        stall_from_entity(stall),
        Some(Meta::empty()),
    ))
}

pub fn stall_from_entity(model: StallModel) -> Stall {
    Stall {
        id: model.id,
        seller_id: model.seller_id,
        stall_name: model.stall_name,
        location: model.location,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
