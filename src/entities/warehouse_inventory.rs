use super::types::StockStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stock of one product in one warehouse. `(warehouse_id, product_id)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_inventory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub product_type: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub reorder_point: i32,
    pub unit_cost: Decimal,
    pub location: Option<String>,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn available_quantity(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }

    pub fn stock_status(&self) -> StockStatus {
        stock_status(
            self.available_quantity(),
            self.min_stock_level,
            self.max_stock_level,
        )
    }

    /// On-hand value, saturating at the decimal bounds.
    pub fn stock_value(&self) -> Decimal {
        self.unit_cost.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Classify an available quantity against its thresholds.
pub fn stock_status(available: i32, min_stock_level: i32, max_stock_level: i32) -> StockStatus {
    if available <= 0 {
        StockStatus::OutOfStock
    } else if available < min_stock_level {
        StockStatus::LowStock
    } else if available > max_stock_level {
        StockStatus::Overstock
    } else {
        StockStatus::InStock
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_stock_levels() {
        assert_eq!(stock_status(0, 50, 500), StockStatus::OutOfStock);
        assert_eq!(stock_status(49, 50, 500), StockStatus::LowStock);
        assert_eq!(stock_status(50, 50, 500), StockStatus::InStock);
        assert_eq!(stock_status(500, 50, 500), StockStatus::InStock);
        assert_eq!(stock_status(501, 50, 500), StockStatus::Overstock);
    }

    proptest! {
        #[test]
        fn status_agrees_with_thresholds(available in -10i32..1_000, min in 0i32..200, span in 0i32..500) {
            let max = min + span;
            let status = stock_status(available, min, max);
            prop_assert_eq!(status == StockStatus::OutOfStock, available <= 0);
            if available > 0 {
                prop_assert_eq!(status == StockStatus::LowStock, available < min);
                prop_assert_eq!(status == StockStatus::Overstock, available >= min && available > max);
            }
        }
    }
}
