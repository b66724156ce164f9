use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pre_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub stall_id: Uuid,
    pub total_amount: i64,
    pub pickup_date: Date,
    pub pickup_time: Time,
    pub customer_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub payment_status: String,
    pub order_status: String,
    #[sea_orm(unique)]
    pub tracking_code: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CustomerId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::stalls::Entity",
        from = "Column::StallId",
        to = "super::stalls::Column::Id"
    )]
    Stalls,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::stalls::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stalls.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
