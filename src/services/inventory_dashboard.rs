use crate::{
    auth::{AuthUser, INVENTORY_READ, INVENTORY_TRANSFER, INVENTORY_UPDATE},
    db::DbPool,
    entities::{
        inventory_alert::{self, Entity as InventoryAlert},
        inventory_movement::{self, Entity as InventoryMovement},
        inventory_transfer::{self, Entity as InventoryTransfer},
        types::{
            AdjustmentType, AlertStatus, MovementType, ProductType, Region, StockStatus,
            TransferStatus, WarehouseStatus,
        },
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        audit::{AuditEntry, AuditLogger},
        pricing::MAX_UNIT_PRICE,
        stock::{self, MovementContext},
    },
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Absolute quantity update for one warehouse row
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInventoryRequest {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    pub quantity: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub adjustment_type: AdjustmentType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInventoryItem {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    pub product_type: ProductType,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub min_stock_level: i32,
    #[validate(range(min = 0))]
    pub max_stock_level: i32,
    #[validate(range(min = 0))]
    pub reorder_point: i32,
    pub unit_cost: Decimal,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferRequest {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    pub quantity: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    pub warehouse_id: Option<Uuid>,
    pub region: Option<Region>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub warehouse_id: Option<Uuid>,
    pub status: Option<AlertStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferFilter {
    pub warehouse_id: Option<Uuid>,
    pub status: Option<TransferStatus>,
}

/// Inventory row with its derived figures
#[derive(Debug, Clone, Serialize)]
pub struct InventoryItemView {
    #[serde(flatten)]
    pub item: warehouse_inventory::Model,
    pub warehouse_code: String,
    pub region: Region,
    pub available_quantity: i32,
    pub stock_status: StockStatus,
    pub stock_value: Decimal,
}

impl InventoryItemView {
    fn new(item: warehouse_inventory::Model, warehouse: &warehouse::Model) -> Result<Self, ServiceError> {
        Ok(Self {
            warehouse_code: warehouse.code.clone(),
            region: warehouse.region()?,
            available_quantity: item.available_quantity(),
            stock_status: item.stock_status(),
            stock_value: item.stock_value(),
            item,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InventorySummary {
    pub total_items: usize,
    pub in_stock: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    pub overstock: usize,
    pub total_units: i64,
    pub reserved_units: i64,
    pub total_value: Decimal,
}

impl InventorySummary {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a warehouse_inventory::Model>) -> Self {
        let mut summary = Self::default();
        for item in items {
            summary.total_items += 1;
            match item.stock_status() {
                StockStatus::InStock => summary.in_stock += 1,
                StockStatus::LowStock => summary.low_stock += 1,
                StockStatus::OutOfStock => summary.out_of_stock += 1,
                StockStatus::Overstock => summary.overstock += 1,
            }
            summary.total_units += i64::from(item.quantity);
            summary.reserved_units += i64::from(item.reserved_quantity);
            summary.total_value += item.stock_value();
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryDashboard {
    pub items: Vec<InventoryItemView>,
    pub summary: InventorySummary,
    pub alerts: Vec<inventory_alert::Model>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryUpdateResult {
    pub item: InventoryItemView,
    pub movement: inventory_movement::Model,
    pub alerts: Vec<inventory_alert::Model>,
}

type AdjustOutcome = (
    i32,
    warehouse_inventory::Model,
    inventory_movement::Model,
    Vec<inventory_alert::Model>,
);

/// Per-warehouse stock, thresholds, alerts and transfers
#[derive(Clone)]
pub struct InventoryDashboardService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    audit: Arc<AuditLogger>,
}

impl InventoryDashboardService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, audit: Arc<AuditLogger>) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
        }
    }

    async fn warehouse(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        Warehouse::find_by_id(warehouse_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {} not found", warehouse_id)))
    }

    /// Stock a new product in a warehouse.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn add_inventory_item(
        &self,
        actor: &AuthUser,
        request: NewInventoryItem,
    ) -> Result<InventoryItemView, ServiceError> {
        request.validate()?;
        if request.min_stock_level > request.max_stock_level {
            return Err(ServiceError::ValidationError(
                "min_stock_level must not exceed max_stock_level".to_string(),
            ));
        }
        if request.unit_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_cost must not be negative".to_string(),
            ));
        }
        if request.unit_cost > MAX_UNIT_PRICE {
            return Err(ServiceError::ValidationError(format!(
                "unit_cost must not exceed {}",
                MAX_UNIT_PRICE
            )));
        }

        let warehouse = self.warehouse(request.warehouse_id).await?;
        actor.require(INVENTORY_UPDATE, Some(warehouse.region()?))?;

        let db = self.db_pool.as_ref();
        if stock::find_item(db, request.warehouse_id, &request.product_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "product {} already stocked in warehouse {}",
                request.product_id, warehouse.code
            )));
        }

        let now = Utc::now();
        let item = warehouse_inventory::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(request.warehouse_id),
            product_id: Set(request.product_id),
            product_name: Set(request.product_name),
            product_type: Set(request.product_type.as_str().to_string()),
            quantity: Set(request.quantity),
            reserved_quantity: Set(0),
            min_stock_level: Set(request.min_stock_level),
            max_stock_level: Set(request.max_stock_level),
            reorder_point: Set(request.reorder_point),
            unit_cost: Set(request.unit_cost),
            location: Set(request.location),
            last_movement_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        self.audit
            .log(
                AuditEntry::new("inventory.create", "inventory")
                    .actor(actor.supplier_id)
                    .resource(item.id)
                    .region(warehouse.region()?),
            )
            .await;
        InventoryItemView::new(item, &warehouse)
    }

    /// Set the on-hand quantity of one row.
    ///
    /// Checks run before any write: non-negative quantity, permission in the
    /// warehouse region, row existence, then quantity not below reservations.
    /// In one transaction the row is updated, a movement appended and
    /// threshold alerts raised.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id, warehouse_id = %request.warehouse_id, product_id = %request.product_id))]
    pub async fn update_inventory(
        &self,
        actor: &AuthUser,
        request: UpdateInventoryRequest,
    ) -> Result<InventoryUpdateResult, ServiceError> {
        if request.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        request.validate()?;

        let warehouse = self.warehouse(request.warehouse_id).await?;
        let region = warehouse.region()?;
        actor.require(INVENTORY_UPDATE, Some(region))?;

        let context = MovementContext {
            adjustment_type: Some(request.adjustment_type),
            reason: Some(request.reason.clone()),
            reference_id: None,
            performed_by: Some(actor.supplier_id),
        };
        let warehouse_id = request.warehouse_id;
        let product_id = request.product_id.clone();
        let quantity = request.quantity;

        let (previous, item, movement, alerts) = self
            .db_pool
            .transaction::<_, AdjustOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let item = stock::require_item(txn, warehouse_id, &product_id).await?;
                    if quantity < item.reserved_quantity {
                        return Err(ServiceError::ValidationError(format!(
                            "quantity {} is below reserved quantity {}",
                            quantity, item.reserved_quantity
                        )));
                    }
                    let previous = item.quantity;
                    let (item, movement) = stock::adjust(txn, item, quantity, &context).await?;
                    let alerts = stock::apply_stock_alerts(txn, &item).await?;
                    Ok((previous, item, movement, alerts))
                })
            })
            .await?;

        counter!("flexvolt_inventory.adjustments", 1);
        info!(
            previous,
            new_quantity = item.quantity,
            alerts = alerts.len(),
            "inventory updated"
        );

        self.event_sender
            .send_or_log(Event::InventoryAdjusted {
                warehouse_id: item.warehouse_id,
                product_id: item.product_id.clone(),
                old_quantity: previous,
                new_quantity: item.quantity,
                adjustment_type: request.adjustment_type.to_string(),
                movement_id: movement.id,
            })
            .await;
        self.publish_alerts(&alerts).await;
        self.audit
            .log(
                AuditEntry::new("inventory.update", "inventory")
                    .actor(actor.supplier_id)
                    .resource(item.id)
                    .region(region)
                    .details(serde_json::json!({
                        "product_id": item.product_id,
                        "previous_quantity": previous,
                        "new_quantity": item.quantity,
                        "adjustment_type": request.adjustment_type,
                        "reason": request.reason,
                    })),
            )
            .await;

        Ok(InventoryUpdateResult {
            item: InventoryItemView::new(item, &warehouse)?,
            movement,
            alerts,
        })
    }

    async fn publish_alerts(&self, alerts: &[inventory_alert::Model]) {
        for alert in alerts {
            counter!("flexvolt_inventory.alerts_raised", 1, "type" => alert.alert_type.clone());
            self.event_sender
                .send_or_log(Event::InventoryAlertRaised {
                    alert_id: alert.id,
                    warehouse_id: alert.warehouse_id,
                    product_id: alert.product_id.clone(),
                    alert_type: alert.alert_type.clone(),
                })
                .await;
        }
    }

    /// Reserve stock at the source and open a `PENDING` transfer.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn transfer_inventory(
        &self,
        actor: &AuthUser,
        request: TransferRequest,
    ) -> Result<inventory_transfer::Model, ServiceError> {
        request.validate()?;
        if request.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "transfer quantity must be positive".to_string(),
            ));
        }
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "source and destination warehouses must differ".to_string(),
            ));
        }

        let source = self.warehouse(request.from_warehouse_id).await?;
        let destination = self.warehouse(request.to_warehouse_id).await?;
        actor.require(INVENTORY_TRANSFER, Some(source.region()?))?;
        actor.require(INVENTORY_TRANSFER, Some(destination.region()?))?;
        if destination.status()? != WarehouseStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "destination warehouse {} is {}",
                destination.code, destination.status
            )));
        }

        let actor_id = actor.supplier_id;
        let req = request.clone();
        let transfer = self
            .db_pool
            .transaction::<_, inventory_transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let item =
                        stock::require_item(txn, req.from_warehouse_id, &req.product_id).await?;
                    let now = Utc::now();
                    let transfer = inventory_transfer::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        from_warehouse_id: Set(req.from_warehouse_id),
                        to_warehouse_id: Set(req.to_warehouse_id),
                        product_id: Set(req.product_id.clone()),
                        quantity: Set(req.quantity),
                        status: Set(TransferStatus::Pending.as_str().to_string()),
                        reason: Set(req.reason.clone()),
                        requested_by: Set(actor_id),
                        created_at: Set(now),
                        updated_at: Set(now),
                        completed_at: Set(None),
                    }
                    .insert(txn)
                    .await?;

                    let context = MovementContext::new(actor_id)
                        .reason(format!("transfer to {}", req.to_warehouse_id))
                        .reference(transfer.id);
                    stock::reserve(txn, item, req.quantity, &context).await?;
                    Ok(transfer)
                })
            })
            .await?;

        counter!("flexvolt_inventory.transfers_requested", 1);
        self.event_sender
            .send_or_log(Event::TransferRequested {
                transfer_id: transfer.id,
                from_warehouse_id: transfer.from_warehouse_id,
                to_warehouse_id: transfer.to_warehouse_id,
                quantity: transfer.quantity,
            })
            .await;
        self.audit
            .log(
                AuditEntry::new("inventory.transfer", "transfer")
                    .actor(actor.supplier_id)
                    .resource(transfer.id)
                    .region(source.region()?)
                    .details(serde_json::json!({
                        "from": source.code,
                        "to": destination.code,
                        "product_id": transfer.product_id,
                        "quantity": transfer.quantity,
                    })),
            )
            .await;
        Ok(transfer)
    }

    async fn pending_transfer(
        &self,
        actor: &AuthUser,
        transfer_id: Uuid,
    ) -> Result<(inventory_transfer::Model, Region), ServiceError> {
        let transfer = InventoryTransfer::find_by_id(transfer_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {} not found", transfer_id)))?;
        if transfer.status != TransferStatus::Pending.as_str() {
            return Err(ServiceError::InvalidOperation(format!(
                "transfer {} is {}",
                transfer_id, transfer.status
            )));
        }
        let source_region = self.warehouse(transfer.from_warehouse_id).await?.region()?;
        let destination_region = self.warehouse(transfer.to_warehouse_id).await?.region()?;
        actor.require(INVENTORY_TRANSFER, Some(source_region))?;
        actor.require(INVENTORY_TRANSFER, Some(destination_region))?;
        Ok((transfer, source_region))
    }

    /// Move reserved units from the source into the destination.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn complete_transfer(
        &self,
        actor: &AuthUser,
        transfer_id: Uuid,
    ) -> Result<inventory_transfer::Model, ServiceError> {
        let (transfer, region) = self.pending_transfer(actor, transfer_id).await?;
        let actor_id = actor.supplier_id;

        let (transfer, alerts) = self
            .db_pool
            .transaction::<_, (inventory_transfer::Model, Vec<inventory_alert::Model>), ServiceError>(
                move |txn| {
                Box::pin(async move {
                    claim_pending(txn, transfer.id, TransferStatus::Completed).await?;
                    let context = MovementContext::new(actor_id).reference(transfer.id);
                    let source =
                        stock::require_item(txn, transfer.from_warehouse_id, &transfer.product_id)
                            .await?;
                    let template = source.clone();
                    let source = stock::consume(
                        txn,
                        source,
                        transfer.quantity,
                        MovementType::TransferOut,
                        &context.clone().reason(format!("transfer to {}", transfer.to_warehouse_id)),
                    )
                    .await?;
                    stock::receive(
                        txn,
                        &template,
                        transfer.to_warehouse_id,
                        transfer.quantity,
                        &context.reason(format!("transfer from {}", transfer.from_warehouse_id)),
                    )
                    .await?;
                    let alerts = stock::apply_stock_alerts(txn, &source).await?;

                    let now = Utc::now();
                    let mut active: inventory_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Completed.as_str().to_string());
                    active.completed_at = Set(Some(now));
                    active.updated_at = Set(now);
                    Ok((active.update(txn).await?, alerts))
                })
                },
            )
            .await?;

        counter!("flexvolt_inventory.transfers_completed", 1);
        self.event_sender
            .send_or_log(Event::TransferCompleted(transfer.id))
            .await;
        self.publish_alerts(&alerts).await;
        self.audit
            .log(
                AuditEntry::new("inventory.transfer_complete", "transfer")
                    .actor(actor.supplier_id)
                    .resource(transfer.id)
                    .region(region),
            )
            .await;
        Ok(transfer)
    }

    /// Release the reservation of a pending transfer.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn cancel_transfer(
        &self,
        actor: &AuthUser,
        transfer_id: Uuid,
    ) -> Result<inventory_transfer::Model, ServiceError> {
        let (transfer, region) = self.pending_transfer(actor, transfer_id).await?;
        let actor_id = actor.supplier_id;

        let transfer = self
            .db_pool
            .transaction::<_, inventory_transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    claim_pending(txn, transfer.id, TransferStatus::Cancelled).await?;
                    let source =
                        stock::require_item(txn, transfer.from_warehouse_id, &transfer.product_id)
                            .await?;
                    let context = MovementContext::new(actor_id)
                        .reason("transfer cancelled")
                        .reference(transfer.id);
                    stock::release(txn, source, transfer.quantity, &context).await?;

                    let mut active: inventory_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Cancelled.as_str().to_string());
                    active.updated_at = Set(Utc::now());
                    Ok(active.update(txn).await?)
                })
            })
            .await?;

        self.event_sender
            .send_or_log(Event::TransferCancelled(transfer.id))
            .await;
        self.audit
            .log(
                AuditEntry::new("inventory.transfer_cancel", "transfer")
                    .actor(actor.supplier_id)
                    .resource(transfer.id)
                    .region(region),
            )
            .await;
        Ok(transfer)
    }

    pub async fn list_transfers(
        &self,
        actor: &AuthUser,
        filter: TransferFilter,
    ) -> Result<Vec<inventory_transfer::Model>, ServiceError> {
        actor.require(INVENTORY_READ, None)?;
        let visible = self.visible_warehouses(actor, None).await?;

        let mut query = InventoryTransfer::find();
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(
                inventory_transfer::Column::FromWarehouseId
                    .eq(warehouse_id)
                    .or(inventory_transfer::Column::ToWarehouseId.eq(warehouse_id)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(inventory_transfer::Column::Status.eq(status.as_str()));
        }
        let transfers = query
            .order_by_desc(inventory_transfer::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?;

        Ok(transfers
            .into_iter()
            .filter(|t| {
                visible.contains_key(&t.from_warehouse_id) || visible.contains_key(&t.to_warehouse_id)
            })
            .collect())
    }

    /// Warehouses the actor may read, optionally narrowed to one region.
    async fn visible_warehouses(
        &self,
        actor: &AuthUser,
        region: Option<Region>,
    ) -> Result<HashMap<Uuid, warehouse::Model>, ServiceError> {
        let mut query = Warehouse::find();
        if let Some(region) = region {
            query = query.filter(warehouse::Column::Region.eq(region.as_str()));
        } else if let Some(scope) = actor.region_scope() {
            query = query.filter(
                warehouse::Column::Region.is_in(scope.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        Ok(query
            .all(self.db_pool.as_ref())
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect())
    }

    /// Stock rows with derived status, summary counts and open alerts.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn get_dashboard(
        &self,
        actor: &AuthUser,
        filter: DashboardFilter,
    ) -> Result<InventoryDashboard, ServiceError> {
        let warehouses = match filter.warehouse_id {
            Some(warehouse_id) => {
                let warehouse = self.warehouse(warehouse_id).await?;
                actor.require(INVENTORY_READ, Some(warehouse.region()?))?;
                if filter.region.map_or(false, |r| warehouse.region != r.as_str()) {
                    HashMap::new()
                } else {
                    HashMap::from([(warehouse.id, warehouse)])
                }
            }
            None => {
                actor.require(INVENTORY_READ, filter.region)?;
                self.visible_warehouses(actor, filter.region).await?
            }
        };

        let ids: Vec<Uuid> = warehouses.keys().copied().collect();
        let db = self.db_pool.as_ref();
        let rows = WarehouseInventory::find()
            .filter(warehouse_inventory::Column::WarehouseId.is_in(ids.clone()))
            .order_by_asc(warehouse_inventory::Column::ProductId)
            .all(db)
            .await?;
        let alerts = InventoryAlert::find()
            .filter(inventory_alert::Column::WarehouseId.is_in(ids))
            .filter(inventory_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .order_by_desc(inventory_alert::Column::CreatedAt)
            .all(db)
            .await?;

        let summary = InventorySummary::from_items(&rows);
        let items = rows
            .into_iter()
            .filter_map(|row| {
                warehouses
                    .get(&row.warehouse_id)
                    .map(|w| InventoryItemView::new(row, w))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InventoryDashboard {
            items,
            summary,
            alerts,
            generated_at: Utc::now(),
        })
    }

    pub async fn list_alerts(
        &self,
        actor: &AuthUser,
        filter: AlertFilter,
    ) -> Result<Vec<inventory_alert::Model>, ServiceError> {
        actor.require(INVENTORY_READ, None)?;
        let ids: Vec<Uuid> = match filter.warehouse_id {
            Some(warehouse_id) => {
                let warehouse = self.warehouse(warehouse_id).await?;
                actor.require(INVENTORY_READ, Some(warehouse.region()?))?;
                vec![warehouse_id]
            }
            None => self.visible_warehouses(actor, None).await?.into_keys().collect(),
        };

        let mut query =
            InventoryAlert::find().filter(inventory_alert::Column::WarehouseId.is_in(ids));
        if let Some(status) = filter.status {
            query = query.filter(inventory_alert::Column::Status.eq(status.as_str()));
        }
        Ok(query
            .order_by_desc(inventory_alert::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn acknowledge_alert(
        &self,
        actor: &AuthUser,
        alert_id: Uuid,
    ) -> Result<inventory_alert::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let alert = InventoryAlert::find_by_id(alert_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("alert {} not found", alert_id)))?;
        let region = self.warehouse(alert.warehouse_id).await?.region()?;
        actor.require(INVENTORY_UPDATE, Some(region))?;
        if alert.status != AlertStatus::Active.as_str() {
            return Err(ServiceError::InvalidOperation(format!(
                "alert {} is {}",
                alert_id, alert.status
            )));
        }

        let now = Utc::now();
        let mut active: inventory_alert::ActiveModel = alert.into();
        active.status = Set(AlertStatus::Acknowledged.as_str().to_string());
        active.acknowledged_by = Set(Some(actor.supplier_id));
        active.acknowledged_at = Set(Some(now));
        let alert = active.update(db).await?;

        self.audit
            .log(
                AuditEntry::new("inventory.alert_acknowledge", "inventory_alert")
                    .actor(actor.supplier_id)
                    .resource(alert.id)
                    .region(region),
            )
            .await;
        Ok(alert)
    }

    /// Ledger rows for a warehouse, newest first.
    pub async fn list_movements(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        product_id: Option<String>,
        limit: Option<u64>,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        let warehouse = self.warehouse(warehouse_id).await?;
        actor.require(INVENTORY_READ, Some(warehouse.region()?))?;

        let mut query = InventoryMovement::find()
            .filter(inventory_movement::Column::WarehouseId.eq(warehouse_id));
        if let Some(product_id) = product_id {
            query = query.filter(inventory_movement::Column::ProductId.eq(product_id));
        }
        Ok(query
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .limit(limit.unwrap_or(100).min(1000))
            .all(self.db_pool.as_ref())
            .await?)
    }
}

/// Move a transfer out of `PENDING`, failing if another caller already has.
async fn claim_pending<C: ConnectionTrait>(
    txn: &C,
    transfer_id: Uuid,
    next: TransferStatus,
) -> Result<(), ServiceError> {
    let claimed = InventoryTransfer::update_many()
        .col_expr(inventory_transfer::Column::Status, Expr::value(next.as_str()))
        .filter(inventory_transfer::Column::Id.eq(transfer_id))
        .filter(inventory_transfer::Column::Status.eq(TransferStatus::Pending.as_str()))
        .exec(txn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(ServiceError::InvalidOperation(format!(
            "transfer {} is no longer pending",
            transfer_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(quantity: i32, reserved: i32, min: i32, max: i32) -> warehouse_inventory::Model {
        let now = Utc::now();
        warehouse_inventory::Model {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            product_id: "FV-9AH".to_string(),
            product_name: "FlexVolt 9Ah".to_string(),
            product_type: "LITHIUM_ION".to_string(),
            quantity,
            reserved_quantity: reserved,
            min_stock_level: min,
            max_stock_level: max,
            reorder_point: min,
            unit_cost: dec!(125.00),
            location: None,
            last_movement_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_counts_each_status() {
        let rows = vec![
            row(100, 0, 50, 500),
            row(60, 20, 50, 500),
            row(10, 10, 5, 500),
            row(900, 0, 50, 500),
        ];
        let summary = InventorySummary::from_items(&rows);
        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.in_stock, 1);
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.overstock, 1);
        assert_eq!(summary.total_units, 1070);
        assert_eq!(summary.reserved_units, 30);
        assert_eq!(summary.total_value, dec!(133750.00));
    }
}
