use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compliance_checks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub region: String,
    pub operation: String,
    pub product_type: String,
    pub quantity: Option<i32>,
    pub compliant: bool,
    pub risk_level: String,
    pub violation_count: i32,
    pub next_review_at: DateTime<Utc>,
    pub checked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::compliance_violation::Entity")]
    Violations,
}

impl Related<super::compliance_violation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Violations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
