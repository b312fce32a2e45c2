//! Stock optimization: reorder recommendations and cross-warehouse
//! rebalancing suggestions.

use crate::{
    auth::{AuthUser, ANALYTICS_READ},
    db::DbPool,
    entities::{
        types::{Region, Severity},
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
    },
    errors::ServiceError,
    services::analytics::{AnalyticsEngine, AnalyticsScope, DemandForecast},
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const FORECAST_HORIZON_DAYS: i64 = 14;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReorderRecommendation {
    pub warehouse_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub available: i32,
    pub reorder_point: i32,
    pub recommended_quantity: i32,
    pub estimated_cost: Decimal,
    pub days_of_cover: Option<f64>,
    pub priority: Severity,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RebalanceSuggestion {
    pub product_id: String,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub quantity: i32,
    pub same_region: bool,
}

/// Urgency of a reorder from stock left and how long it lasts.
pub fn reorder_priority(available: i32, days_of_cover: Option<f64>) -> Severity {
    if available <= 0 {
        return Severity::Critical;
    }
    match days_of_cover {
        Some(days) if days <= 7.0 => Severity::High,
        Some(days) if days <= 14.0 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Items at or below their reorder point, topped up to the max level.
pub fn plan_reorders(
    items: &[warehouse_inventory::Model],
    forecasts: &[DemandForecast],
) -> Vec<ReorderRecommendation> {
    let cover: HashMap<(Uuid, &str), Option<f64>> = forecasts
        .iter()
        .map(|f| ((f.warehouse_id, f.product_id.as_str()), f.days_of_cover))
        .collect();

    let mut recommendations: Vec<ReorderRecommendation> = items
        .iter()
        .filter(|item| item.available_quantity() <= item.reorder_point)
        .filter_map(|item| {
            let available = item.available_quantity();
            let quantity = item.max_stock_level - available;
            if quantity <= 0 {
                return None;
            }
            let days_of_cover = cover
                .get(&(item.warehouse_id, item.product_id.as_str()))
                .copied()
                .flatten();
            Some(ReorderRecommendation {
                warehouse_id: item.warehouse_id,
                product_id: item.product_id.clone(),
                product_name: item.product_name.clone(),
                available,
                reorder_point: item.reorder_point,
                recommended_quantity: quantity,
                estimated_cost: item.unit_cost.saturating_mul(Decimal::from(quantity)),
                days_of_cover,
                priority: reorder_priority(available, days_of_cover),
            })
        })
        .collect();
    recommendations.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.available.cmp(&b.available))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    recommendations
}

/// Match surplus above max level against deficits below min level for each
/// product, same-region pairs first.
pub fn plan_rebalancing(items: &[(warehouse_inventory::Model, Region)]) -> Vec<RebalanceSuggestion> {
    let mut by_product: BTreeMap<&str, Vec<&(warehouse_inventory::Model, Region)>> = BTreeMap::new();
    for entry in items {
        by_product.entry(entry.0.product_id.as_str()).or_default().push(entry);
    }

    let mut suggestions = Vec::new();
    for (product_id, rows) in by_product {
        let mut surplus: Vec<(Uuid, Region, i32)> = rows
            .iter()
            .filter_map(|(item, region)| {
                let extra = item.available_quantity() - item.max_stock_level;
                (extra > 0).then_some((item.warehouse_id, *region, extra))
            })
            .collect();
        let mut deficits: Vec<(Uuid, Region, i32)> = rows
            .iter()
            .filter_map(|(item, region)| {
                let missing = item.min_stock_level - item.available_quantity();
                (missing > 0).then_some((item.warehouse_id, *region, missing))
            })
            .collect();
        if surplus.is_empty() || deficits.is_empty() {
            continue;
        }
        deficits.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        for same_region in [true, false] {
            for deficit in deficits.iter_mut() {
                for source in surplus.iter_mut() {
                    if deficit.2 == 0 {
                        break;
                    }
                    if source.2 == 0 || (source.1 == deficit.1) != same_region {
                        continue;
                    }
                    let quantity = source.2.min(deficit.2);
                    source.2 -= quantity;
                    deficit.2 -= quantity;
                    suggestions.push(RebalanceSuggestion {
                        product_id: product_id.to_string(),
                        from_warehouse_id: source.0,
                        to_warehouse_id: deficit.0,
                        quantity,
                        same_region,
                    });
                }
            }
        }
    }
    suggestions
}

pub struct OptimizationService {
    db_pool: Arc<DbPool>,
    analytics: Arc<AnalyticsEngine>,
}

impl OptimizationService {
    pub fn new(db_pool: Arc<DbPool>, analytics: Arc<AnalyticsEngine>) -> Self {
        Self { db_pool, analytics }
    }

    async fn scoped_items(
        &self,
        actor: &AuthUser,
        scope: &AnalyticsScope,
    ) -> Result<Vec<(warehouse_inventory::Model, Region)>, ServiceError> {
        actor.require(ANALYTICS_READ, scope.region)?;
        let mut query = Warehouse::find();
        if let Some(warehouse_id) = scope.warehouse_id {
            query = query.filter(warehouse::Column::Id.eq(warehouse_id));
        }
        if let Some(region) = scope.region {
            query = query.filter(warehouse::Column::Region.eq(region.as_str()));
        }
        if let Some(regions) = actor.region_scope() {
            query = query.filter(
                warehouse::Column::Region.is_in(regions.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        let warehouses = query
            .find_with_related(WarehouseInventory)
            .all(self.db_pool.as_ref())
            .await?;

        let mut items = Vec::new();
        for (warehouse, stock) in warehouses {
            let region = warehouse.region()?;
            items.extend(stock.into_iter().map(|item| (item, region)));
        }
        Ok(items)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn reorder_recommendations(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
    ) -> Result<Vec<ReorderRecommendation>, ServiceError> {
        let items: Vec<warehouse_inventory::Model> = self
            .scoped_items(actor, &scope)
            .await?
            .into_iter()
            .map(|(item, _)| item)
            .collect();
        let forecasts = self
            .analytics
            .demand_forecast(actor, scope, FORECAST_HORIZON_DAYS)
            .await?;
        Ok(plan_reorders(&items, &forecasts))
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn rebalancing_suggestions(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
    ) -> Result<Vec<RebalanceSuggestion>, ServiceError> {
        let items = self.scoped_items(actor, &scope).await?;
        Ok(plan_rebalancing(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(warehouse_id: Uuid, quantity: i32, reserved: i32) -> warehouse_inventory::Model {
        let now = Utc::now();
        warehouse_inventory::Model {
            id: Uuid::new_v4(),
            warehouse_id,
            product_id: "FV-60V-6AH".to_string(),
            product_name: "FlexVolt 60V 6Ah".to_string(),
            product_type: "LITHIUM_ION".to_string(),
            quantity,
            reserved_quantity: reserved,
            min_stock_level: 50,
            max_stock_level: 500,
            reorder_point: 100,
            unit_cost: dec!(80.00),
            location: None,
            last_movement_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn reorders_items_at_reorder_point() {
        let w = Uuid::new_v4();
        let items = vec![item(w, 120, 30), item(w, 400, 0)];
        let forecasts = vec![DemandForecast {
            warehouse_id: w,
            product_id: "FV-60V-6AH".to_string(),
            product_name: String::new(),
            window_days: 30,
            horizon_days: 14,
            average_daily_demand: 15.0,
            forecast_units: 210,
            available: 90,
            days_of_cover: Some(6.0),
        }];
        let plan = plan_reorders(&items, &forecasts);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].available, 90);
        assert_eq!(plan[0].recommended_quantity, 410);
        assert_eq!(plan[0].estimated_cost, dec!(32800.00));
        assert_eq!(plan[0].priority, Severity::High);
    }

    #[test]
    fn priority_follows_cover() {
        assert_eq!(reorder_priority(0, None), Severity::Critical);
        assert_eq!(reorder_priority(10, Some(3.0)), Severity::High);
        assert_eq!(reorder_priority(10, Some(10.0)), Severity::Medium);
        assert_eq!(reorder_priority(10, Some(40.0)), Severity::Low);
        assert_eq!(reorder_priority(10, None), Severity::Low);
    }

    #[test]
    fn rebalances_surplus_into_shortfalls_same_region_first() {
        let full = Uuid::new_v4();
        let short_local = Uuid::new_v4();
        let short_remote = Uuid::new_v4();
        let items = vec![
            (item(full, 600, 0), Region::Japan),
            (item(short_local, 20, 0), Region::Japan),
            (item(short_remote, 10, 0), Region::Australia),
        ];
        let plan = plan_rebalancing(&items);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].to_warehouse_id, short_local);
        assert_eq!(plan[0].quantity, 30);
        assert!(plan[0].same_region);
        assert_eq!(plan[1].to_warehouse_id, short_remote);
        assert_eq!(plan[1].quantity, 40);
        assert!(!plan[1].same_region);
    }

    #[test]
    fn nothing_to_rebalance_without_surplus() {
        let items = vec![
            (item(Uuid::new_v4(), 20, 0), Region::UsWest),
            (item(Uuid::new_v4(), 200, 0), Region::UsWest),
        ];
        assert!(plan_rebalancing(&items).is_empty());
    }
}
