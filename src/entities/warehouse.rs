use super::types::{parse_column, Region, WarehouseStatus};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub region: String,
    pub address: Option<String>,
    /// Storage capacity in units.
    pub capacity: i32,
    pub status: String,
    pub timezone: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn region(&self) -> Result<Region, ServiceError> {
        parse_column(&self.region, "warehouses.region")
    }

    pub fn status(&self) -> Result<WarehouseStatus, ServiceError> {
        parse_column(&self.status, "warehouses.status")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::warehouse_inventory::Entity")]
    Inventory,
    #[sea_orm(has_many = "super::warehouse_staff::Entity")]
    Staff,
}

impl Related<super::warehouse_inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl Related<super::warehouse_staff::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Staff.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
