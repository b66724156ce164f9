use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::auth::Claims,
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        stalls::{Column as StallCol, Entity as Stalls},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_customer(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "customer")
}

pub fn ensure_seller(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "seller")
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

/// The seller capability check: the authenticated user must own the stall.
/// Every stall-scoped mutation goes through here instead of re-deriving
/// ownership per handler.
pub async fn ensure_stall_owner(orm: &OrmConn, user: &AuthUser, stall_id: Uuid) -> AppResult<()> {
    ensure_seller(user)?;
    let owned = Stalls::find()
        .filter(StallCol::Id.eq(stall_id))
        .filter(StallCol::SellerId.eq(user.user_id))
        .one(orm)
        .await?;
    if owned.is_none() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Seller capability check for an order: the order's stall must belong to
/// the authenticated seller. Returns the stall id on success.
pub async fn ensure_order_stall_owner(
    orm: &OrmConn,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<Uuid> {
    ensure_seller(user)?;
    let order = Orders::find()
        .filter(OrderCol::Id.eq(order_id))
        .one(orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let owned = Stalls::find()
        .filter(StallCol::Id.eq(order.stall_id))
        .filter(StallCol::SellerId.eq(user.user_id))
        .one(orm)
        .await?;
    if owned.is_none() {
        return Err(AppError::Forbidden);
    }
    Ok(order.stall_id)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role.clone(),
        })
    }
}
