//! Operational analytics computed from live rows.
//!
//! Results are cached per query key for a fixed TTL. A polling stream can
//! publish snapshots on a broadcast channel until it is stopped.

use crate::{
    auth::{AuthUser, ANALYTICS_READ},
    db::DbPool,
    entities::{
        inventory_alert::{self, Entity as InventoryAlert},
        inventory_movement::{self, Entity as InventoryMovement},
        order::{self, Entity as Order},
        types::{AlertStatus, MovementType, OrderStatus, Region, StockStatus},
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
    },
    errors::ServiceError,
    services::warehouses::utilization,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Restricts a query to one region and/or warehouse.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AnalyticsScope {
    pub region: Option<Region>,
    pub warehouse_id: Option<Uuid>,
    /// Look-back window for flow metrics, defaults to 30 days
    pub days: Option<i64>,
}

impl AnalyticsScope {
    fn days(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 365)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryMetrics {
    pub total_skus: usize,
    pub total_units: i64,
    pub reserved_units: i64,
    pub available_units: i64,
    pub inventory_value: Decimal,
    pub in_stock_items: usize,
    pub low_stock_items: usize,
    pub out_of_stock_items: usize,
    pub overstock_items: usize,
    /// Percent of SKUs with nothing available
    pub stock_out_rate: f64,
    /// Units shipped in the window over units on hand
    pub turnover_ratio: f64,
    pub units_shipped: i64,
    pub active_alerts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderMetrics {
    pub total_orders: usize,
    pub orders_by_status: BTreeMap<String, usize>,
    /// Totals of orders that were not cancelled
    pub revenue: Decimal,
    pub average_order_value: Decimal,
    pub average_discount_percent: Decimal,
    pub deposit_orders: usize,
    /// Balance still owed on open deposit orders
    pub outstanding_balance: Decimal,
    /// Hours from creation to delivery, delivered orders only
    pub average_fulfilment_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehousePerformance {
    pub warehouse_id: Uuid,
    pub code: String,
    pub region: Region,
    pub utilization: Decimal,
    pub orders: usize,
    pub revenue: Decimal,
    pub units_shipped: i64,
    /// Percent of non-cancelled orders that were delivered
    pub fulfilment_rate: f64,
    pub open_alerts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandForecast {
    pub warehouse_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub window_days: i64,
    pub horizon_days: i64,
    pub average_daily_demand: f64,
    pub forecast_units: i64,
    pub available: i32,
    /// `None` when there was no demand in the window
    pub days_of_cover: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    pub inventory: InventoryMetrics,
    pub orders: OrderMetrics,
    pub generated_at: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Average of the daily series and the units expected over `horizon_days`.
pub fn moving_average_forecast(daily_demand: &[i64], horizon_days: i64) -> (f64, i64) {
    if daily_demand.is_empty() {
        return (0.0, 0);
    }
    let average = daily_demand.iter().sum::<i64>() as f64 / daily_demand.len() as f64;
    (round2(average), (average * horizon_days as f64).ceil() as i64)
}

/// Days the available stock lasts at the given daily demand.
pub fn days_of_cover(available: i32, average_daily_demand: f64) -> Option<f64> {
    if average_daily_demand <= 0.0 {
        return None;
    }
    Some(round2(f64::from(available.max(0)) / average_daily_demand))
}

/// Bucket outbound movements into one demand figure per day, oldest first.
pub fn daily_demand(
    movements: &[inventory_movement::Model],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<i64> {
    let mut buckets = vec![0i64; days.max(0) as usize];
    for movement in movements {
        let age = (now - movement.created_at).num_days();
        if age < 0 || age >= days {
            continue;
        }
        let index = (days - 1 - age) as usize;
        buckets[index] += i64::from(-movement.quantity_delta.min(0));
    }
    buckets
}

pub fn inventory_metrics(
    items: &[warehouse_inventory::Model],
    outbound: &[inventory_movement::Model],
    active_alerts: usize,
) -> InventoryMetrics {
    let mut by_status: HashMap<StockStatus, usize> = HashMap::new();
    for item in items {
        *by_status.entry(item.stock_status()).or_default() += 1;
    }
    let count = |status: StockStatus| by_status.get(&status).copied().unwrap_or(0);

    let total_units: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();
    let reserved_units: i64 = items.iter().map(|i| i64::from(i.reserved_quantity)).sum();
    let units_shipped: i64 = outbound
        .iter()
        .map(|m| i64::from(-m.quantity_delta.min(0)))
        .sum();
    let out_of_stock_items = count(StockStatus::OutOfStock);

    InventoryMetrics {
        total_skus: items.len(),
        total_units,
        reserved_units,
        available_units: total_units - reserved_units,
        inventory_value: money(items.iter().map(|i| i.stock_value()).sum()),
        in_stock_items: count(StockStatus::InStock),
        low_stock_items: count(StockStatus::LowStock),
        out_of_stock_items,
        overstock_items: count(StockStatus::Overstock),
        stock_out_rate: if items.is_empty() {
            0.0
        } else {
            round2(out_of_stock_items as f64 / items.len() as f64 * 100.0)
        },
        turnover_ratio: if total_units == 0 {
            0.0
        } else {
            round2(units_shipped as f64 / total_units as f64)
        },
        units_shipped,
        active_alerts,
    }
}

pub fn order_metrics(orders: &[order::Model]) -> OrderMetrics {
    let mut orders_by_status: BTreeMap<String, usize> =
        OrderStatus::iter().map(|s| (s.to_string(), 0)).collect();
    for order in orders {
        *orders_by_status.entry(order.status.clone()).or_default() += 1;
    }

    let cancelled = OrderStatus::Cancelled.as_str();
    let live: Vec<&order::Model> = orders.iter().filter(|o| o.status != cancelled).collect();
    let revenue: Decimal = live.iter().map(|o| o.total).sum();
    let live_count = Decimal::from(live.len() as u64);

    let fulfilment_hours: Vec<f64> = orders
        .iter()
        .filter_map(|o| o.delivered_at.map(|d| (d - o.created_at).num_minutes() as f64 / 60.0))
        .collect();

    OrderMetrics {
        total_orders: orders.len(),
        orders_by_status,
        revenue: money(revenue),
        average_order_value: if live.is_empty() {
            Decimal::ZERO
        } else {
            money(revenue / live_count)
        },
        average_discount_percent: if live.is_empty() {
            Decimal::ZERO
        } else {
            money(live.iter().map(|o| o.discount_percent).sum::<Decimal>() / live_count)
        },
        deposit_orders: live.iter().filter(|o| o.payment_model == "DEPOSIT").count(),
        outstanding_balance: money(
            live.iter()
                .filter(|o| o.status != OrderStatus::Delivered.as_str())
                .map(|o| o.balance_due)
                .sum(),
        ),
        average_fulfilment_hours: if fulfilment_hours.is_empty() {
            None
        } else {
            Some(round2(
                fulfilment_hours.iter().sum::<f64>() / fulfilment_hours.len() as f64,
            ))
        },
    }
}

struct CacheEntry {
    stored_at: Instant,
    value: serde_json::Value,
}

/// Time-boxed cache of serialized query results.
pub struct AnalyticsCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl AnalyticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.stored_at.elapsed() >= self.ttl {
                None
            } else {
                serde_json::from_value(entry.value.clone()).ok()
            }
        };
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    pub fn insert<T: Serialize>(&self, key: String, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        stored_at: Instant::now(),
                        value,
                    },
                );
            }
            Err(e) => warn!(error = %e, "analytics result not cacheable"),
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to a running metrics stream.
pub struct MetricsStream {
    stop: Arc<AtomicBool>,
    sender: broadcast::Sender<AnalyticsSnapshot>,
    handle: JoinHandle<()>,
}

impl MetricsStream {
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsSnapshot> {
        self.sender.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Ask the loop to exit and wait for it.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "metrics stream task failed");
        }
    }
}

pub struct AnalyticsEngine {
    db_pool: Arc<DbPool>,
    cache: AnalyticsCache,
}

impl AnalyticsEngine {
    pub fn new(db_pool: Arc<DbPool>, cache_ttl: Duration) -> Self {
        Self {
            db_pool,
            cache: AnalyticsCache::new(cache_ttl),
        }
    }

    pub fn cache(&self) -> &AnalyticsCache {
        &self.cache
    }

    /// Serve `compute` from the cache when a fresh entry exists. The key
    /// includes the caller's region scope so results never cross scopes.
    async fn cached<T, F, Fut>(
        &self,
        kind: &str,
        actor: &AuthUser,
        scope: &AnalyticsScope,
        compute: F,
    ) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let key = format!(
            "{}:{}:{:?}:{:?}:{}",
            kind,
            serde_json::to_string(&actor.region_scope())?,
            scope.region,
            scope.warehouse_id,
            scope.days()
        );
        if let Some(hit) = self.cache.get::<T>(&key) {
            counter!("flexvolt_analytics.cache", 1, "result" => "hit");
            return Ok(hit);
        }
        counter!("flexvolt_analytics.cache", 1, "result" => "miss");
        let value = compute().await?;
        self.cache.insert(key, &value);
        Ok(value)
    }

    async fn scoped_warehouses(
        &self,
        actor: &AuthUser,
        scope: &AnalyticsScope,
    ) -> Result<Vec<warehouse::Model>, ServiceError> {
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
        let warehouses = query.all(self.db_pool.as_ref()).await?;
        if let (Some(warehouse_id), true) = (scope.warehouse_id, warehouses.is_empty()) {
            return Err(ServiceError::NotFound(format!("warehouse {} not found", warehouse_id)));
        }
        Ok(warehouses)
    }

    async fn outbound_movements(
        &self,
        warehouse_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        Ok(InventoryMovement::find()
            .filter(inventory_movement::Column::WarehouseId.is_in(warehouse_ids.to_vec()))
            .filter(inventory_movement::Column::MovementType.is_in([
                MovementType::OrderShipment.as_str(),
                MovementType::TransferOut.as_str(),
            ]))
            .filter(inventory_movement::Column::CreatedAt.gte(since))
            .all(self.db_pool.as_ref())
            .await?)
    }

    async fn compute_inventory(
        &self,
        warehouse_ids: Vec<Uuid>,
        days: i64,
    ) -> Result<InventoryMetrics, ServiceError> {
        let db = self.db_pool.as_ref();
        let items = WarehouseInventory::find()
            .filter(warehouse_inventory::Column::WarehouseId.is_in(warehouse_ids.clone()))
            .all(db)
            .await?;
        let outbound = self
            .outbound_movements(&warehouse_ids, Utc::now() - ChronoDuration::days(days))
            .await?;
        let active_alerts = InventoryAlert::find()
            .filter(inventory_alert::Column::WarehouseId.is_in(warehouse_ids))
            .filter(inventory_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .all(db)
            .await?
            .len();
        Ok(inventory_metrics(&items, &outbound, active_alerts))
    }

    async fn compute_orders(
        &self,
        warehouse_ids: Vec<Uuid>,
        days: i64,
    ) -> Result<OrderMetrics, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::WarehouseId.is_in(warehouse_ids))
            .filter(order::Column::CreatedAt.gte(Utc::now() - ChronoDuration::days(days)))
            .all(self.db_pool.as_ref())
            .await?;
        Ok(order_metrics(&orders))
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn inventory_metrics(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
    ) -> Result<InventoryMetrics, ServiceError> {
        let warehouses = self.scoped_warehouses(actor, &scope).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let days = scope.days();
        self.cached("inventory", actor, &scope, || self.compute_inventory(ids, days))
            .await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn order_metrics(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
    ) -> Result<OrderMetrics, ServiceError> {
        let warehouses = self.scoped_warehouses(actor, &scope).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let days = scope.days();
        self.cached("orders", actor, &scope, || self.compute_orders(ids, days))
            .await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn warehouse_performance(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
    ) -> Result<Vec<WarehousePerformance>, ServiceError> {
        let warehouses = self.scoped_warehouses(actor, &scope).await?;
        let days = scope.days();
        self.cached("performance", actor, &scope, || async move {
            let db = self.db_pool.as_ref();
            let since = Utc::now() - ChronoDuration::days(days);
            let mut rows = Vec::with_capacity(warehouses.len());
            for warehouse in warehouses {
                let items = WarehouseInventory::find()
                    .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse.id))
                    .all(db)
                    .await?;
                let orders = Order::find()
                    .filter(order::Column::WarehouseId.eq(warehouse.id))
                    .filter(order::Column::CreatedAt.gte(since))
                    .all(db)
                    .await?;
                let outbound = self.outbound_movements(&[warehouse.id], since).await?;
                let open_alerts = InventoryAlert::find()
                    .filter(inventory_alert::Column::WarehouseId.eq(warehouse.id))
                    .filter(inventory_alert::Column::Status.ne(AlertStatus::Resolved.as_str()))
                    .all(db)
                    .await?
                    .len();

                let units: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();
                let metrics = order_metrics(&orders);
                let live = orders.len()
                    - metrics
                        .orders_by_status
                        .get(OrderStatus::Cancelled.as_str())
                        .copied()
                        .unwrap_or(0);
                let delivered = metrics
                    .orders_by_status
                    .get(OrderStatus::Delivered.as_str())
                    .copied()
                    .unwrap_or(0);

                rows.push(WarehousePerformance {
                    warehouse_id: warehouse.id,
                    region: warehouse.region()?,
                    utilization: utilization(units, i64::from(warehouse.capacity)),
                    orders: orders.len(),
                    revenue: metrics.revenue,
                    units_shipped: outbound
                        .iter()
                        .filter(|m| m.movement_type == MovementType::OrderShipment.as_str())
                        .map(|m| i64::from(-m.quantity_delta))
                        .sum(),
                    fulfilment_rate: if live == 0 {
                        0.0
                    } else {
                        round2(delivered as f64 / live as f64 * 100.0)
                    },
                    open_alerts,
                    code: warehouse.code,
                });
            }
            rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.code.cmp(&b.code)));
            Ok::<_, ServiceError>(rows)
        })
        .await
    }

    /// Moving-average demand per stocked product over the scope window,
    /// projected over `horizon_days`.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn demand_forecast(
        &self,
        actor: &AuthUser,
        scope: AnalyticsScope,
        horizon_days: i64,
    ) -> Result<Vec<DemandForecast>, ServiceError> {
        if horizon_days <= 0 {
            return Err(ServiceError::ValidationError(
                "forecast horizon must be positive".to_string(),
            ));
        }
        let warehouses = self.scoped_warehouses(actor, &scope).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let days = scope.days();
        let kind = format!("forecast:{}", horizon_days);
        self.cached(&kind, actor, &scope, || async move {
            let now = Utc::now();
            let items = WarehouseInventory::find()
                .filter(warehouse_inventory::Column::WarehouseId.is_in(ids.clone()))
                .all(self.db_pool.as_ref())
                .await?;
            let outbound = self
                .outbound_movements(&ids, now - ChronoDuration::days(days))
                .await?;

            let mut per_item: HashMap<(Uuid, &str), Vec<inventory_movement::Model>> = HashMap::new();
            for movement in &outbound {
                per_item
                    .entry((movement.warehouse_id, movement.product_id.as_str()))
                    .or_default()
                    .push(movement.clone());
            }

            let mut forecasts: Vec<DemandForecast> = items
                .iter()
                .map(|item| {
                    let history = per_item
                        .get(&(item.warehouse_id, item.product_id.as_str()))
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    let series = daily_demand(history, now, days);
                    let (average, forecast_units) = moving_average_forecast(&series, horizon_days);
                    let available = item.available_quantity();
                    DemandForecast {
                        warehouse_id: item.warehouse_id,
                        product_id: item.product_id.clone(),
                        product_name: item.product_name.clone(),
                        window_days: days,
                        horizon_days,
                        average_daily_demand: average,
                        forecast_units,
                        available,
                        days_of_cover: days_of_cover(available, average),
                    }
                })
                .collect();
            forecasts.sort_by(|a, b| {
                let cover = |f: &DemandForecast| f.days_of_cover.unwrap_or(f64::MAX);
                cover(a)
                    .total_cmp(&cover(b))
                    .then_with(|| a.product_id.cmp(&b.product_id))
            });
            Ok::<_, ServiceError>(forecasts)
        })
        .await
    }

    /// Inventory and order metrics together, bypassing the cache.
    pub async fn snapshot(
        &self,
        actor: &AuthUser,
        scope: &AnalyticsScope,
    ) -> Result<AnalyticsSnapshot, ServiceError> {
        let warehouses = self.scoped_warehouses(actor, scope).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        Ok(AnalyticsSnapshot {
            inventory: self.compute_inventory(ids.clone(), scope.days()).await?,
            orders: self.compute_orders(ids, scope.days()).await?,
            generated_at: Utc::now(),
        })
    }

    /// Publish a snapshot every `interval` until the returned handle is
    /// stopped. The stop flag is checked before each tick.
    pub fn start_stream(
        self: &Arc<Self>,
        actor: AuthUser,
        scope: AnalyticsScope,
        interval: Duration,
    ) -> Result<MetricsStream, ServiceError> {
        actor.require(ANALYTICS_READ, scope.region)?;
        let (sender, _) = broadcast::channel(16);
        let stop = Arc::new(AtomicBool::new(false));

        let engine = Arc::clone(self);
        let loop_sender = sender.clone();
        let loop_stop = Arc::clone(&stop);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                if loop_stop.load(Ordering::SeqCst) {
                    break;
                }
                ticker.tick().await;
                if loop_stop.load(Ordering::SeqCst) {
                    break;
                }
                match engine.snapshot(&actor, &scope).await {
                    Ok(snapshot) => {
                        // No subscribers is not an error
                        let receivers = loop_sender.send(snapshot).unwrap_or(0);
                        debug!(receivers, "metrics snapshot published");
                    }
                    Err(e) => warn!(error = %e, "metrics snapshot failed"),
                }
            }
            debug!("metrics stream stopped");
        });

        Ok(MetricsStream {
            stop,
            sender,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn outbound(delta: i32, days_ago: i64, now: DateTime<Utc>) -> inventory_movement::Model {
        inventory_movement::Model {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::nil(),
            product_id: "FV-60V".to_string(),
            movement_type: MovementType::OrderShipment.as_str().to_string(),
            adjustment_type: None,
            quantity_delta: delta,
            previous_quantity: 100,
            new_quantity: 100 + delta,
            reason: None,
            reference_id: None,
            performed_by: None,
            created_at: now - ChronoDuration::days(days_ago) - ChronoDuration::hours(1),
        }
    }

    #[test]
    fn demand_is_bucketed_per_day() {
        let now = Utc::now();
        let movements = vec![
            outbound(-4, 0, now),
            outbound(-6, 0, now),
            outbound(-3, 2, now),
            outbound(-9, 40, now),
        ];
        assert_eq!(daily_demand(&movements, now, 3), vec![3, 0, 10]);
    }

    #[test]
    fn forecast_uses_window_average() {
        let (average, units) = moving_average_forecast(&[3, 0, 10, 7], 7);
        assert_eq!(average, 5.0);
        assert_eq!(units, 35);
        assert_eq!(moving_average_forecast(&[], 7), (0.0, 0));
        assert_eq!(moving_average_forecast(&[1, 0, 0], 10), (0.33, 4));
    }

    #[test]
    fn cover_needs_demand() {
        assert_eq!(days_of_cover(50, 5.0), Some(10.0));
        assert_eq!(days_of_cover(50, 0.0), None);
        assert_eq!(days_of_cover(-2, 1.0), Some(0.0));
    }

    #[test]
    fn order_metrics_skip_cancelled_revenue() {
        let now = Utc::now();
        let make = |status: OrderStatus, total: Decimal, delivered_after: Option<i64>| order::Model {
            id: Uuid::new_v4(),
            order_number: "FV-1".to_string(),
            customer_id: Uuid::nil(),
            warehouse_id: Uuid::nil(),
            region: Region::Japan.as_str().to_string(),
            status: status.as_str().to_string(),
            currency: "JPY".to_string(),
            subtotal: total,
            discount_percent: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            total,
            payment_model: "FULL".to_string(),
            deposit_amount: total,
            balance_due: Decimal::ZERO,
            balance_due_date: None,
            shipping_address: None,
            notes: None,
            tracking_number: None,
            created_by: Uuid::nil(),
            created_at: now - ChronoDuration::hours(48),
            updated_at: now,
            delivered_at: delivered_after.map(|h| now - ChronoDuration::hours(48 - h)),
        };
        let orders = vec![
            make(OrderStatus::Delivered, dec!(100), Some(24)),
            make(OrderStatus::Pending, dec!(50), None),
            make(OrderStatus::Cancelled, dec!(999), None),
        ];
        let metrics = order_metrics(&orders);

        assert_eq!(metrics.total_orders, 3);
        assert_eq!(metrics.revenue, dec!(150));
        assert_eq!(metrics.average_order_value, dec!(75));
        assert_eq!(metrics.orders_by_status["CANCELLED"], 1);
        assert_eq!(metrics.orders_by_status["SHIPPED"], 0);
        assert_eq!(metrics.average_fulfilment_hours, Some(24.0));
    }

    #[test]
    fn cache_entries_expire() {
        let cache = AnalyticsCache::new(Duration::from_millis(0));
        cache.insert("k".to_string(), &42u32);
        assert_eq!(cache.get::<u32>("k"), None);
        assert!(cache.is_empty());

        let cache = AnalyticsCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), &42u32);
        assert_eq!(cache.get::<u32>("k"), Some(42));
        cache.invalidate_all();
        assert_eq!(cache.len(), 0);
    }
}
