//! Stock ledger primitives shared by inventory, transfer and order flows.
//!
//! Every function takes a connection so callers can compose them inside one
//! transaction. Each quantity or reservation change appends a movement row.

use crate::{
    entities::{
        inventory_alert::{self, Entity as InventoryAlert},
        inventory_movement,
        types::{AdjustmentType, AlertStatus, AlertType, MovementType, Severity},
        warehouse_inventory::{self, Entity as WarehouseInventory},
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set,
};
use uuid::Uuid;

/// Details of a ledger entry beyond the quantities themselves
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub adjustment_type: Option<AdjustmentType>,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub performed_by: Option<Uuid>,
}

impl MovementContext {
    pub fn new(performed_by: Uuid) -> Self {
        Self {
            performed_by: Some(performed_by),
            ..Default::default()
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

pub async fn find_item<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: &str,
) -> Result<Option<warehouse_inventory::Model>, ServiceError> {
    Ok(WarehouseInventory::find()
        .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_inventory::Column::ProductId.eq(product_id))
        .one(conn)
        .await?)
}

pub async fn require_item<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: &str,
) -> Result<warehouse_inventory::Model, ServiceError> {
    find_item(conn, warehouse_id, product_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "product {} not stocked in warehouse {}",
                product_id, warehouse_id
            ))
        })
}

async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    item: &warehouse_inventory::Model,
    movement_type: MovementType,
    previous_quantity: i32,
    new_quantity: i32,
    context: &MovementContext,
) -> Result<inventory_movement::Model, ServiceError> {
    Ok(inventory_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(item.warehouse_id),
        product_id: Set(item.product_id.clone()),
        movement_type: Set(movement_type.as_str().to_string()),
        adjustment_type: Set(context.adjustment_type.map(|t| t.as_str().to_string())),
        quantity_delta: Set(new_quantity - previous_quantity),
        previous_quantity: Set(previous_quantity),
        new_quantity: Set(new_quantity),
        reason: Set(context.reason.clone()),
        reference_id: Set(context.reference_id),
        performed_by: Set(context.performed_by),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?)
}

async fn save_levels<C: ConnectionTrait>(
    conn: &C,
    item: warehouse_inventory::Model,
    quantity: i32,
    reserved_quantity: i32,
) -> Result<warehouse_inventory::Model, ServiceError> {
    if quantity < 0 || reserved_quantity < 0 || quantity < reserved_quantity {
        return Err(ServiceError::InvalidOperation(format!(
            "stock levels for {} would become inconsistent (quantity {}, reserved {})",
            item.product_id, quantity, reserved_quantity
        )));
    }
    let now = Utc::now();
    let mut active: warehouse_inventory::ActiveModel = item.into();
    active.quantity = Set(quantity);
    active.reserved_quantity = Set(reserved_quantity);
    active.last_movement_at = Set(Some(now));
    active.updated_at = Set(now);
    Ok(active.update(conn).await?)
}

/// Set an absolute on-hand quantity.
pub async fn adjust<C: ConnectionTrait>(
    conn: &C,
    item: warehouse_inventory::Model,
    new_quantity: i32,
    context: &MovementContext,
) -> Result<(warehouse_inventory::Model, inventory_movement::Model), ServiceError> {
    let previous = item.quantity;
    let reserved = item.reserved_quantity;
    let updated = save_levels(conn, item, new_quantity, reserved).await?;
    let movement = record_movement(
        conn,
        &updated,
        MovementType::Adjustment,
        previous,
        new_quantity,
        context,
    )
    .await?;
    Ok((updated, movement))
}

/// Hold `quantity` units for a transfer or order. Fails with
/// `InsufficientStock` when fewer units are available. The movement row
/// records reserved quantities before and after.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    item: warehouse_inventory::Model,
    quantity: i32,
    context: &MovementContext,
) -> Result<warehouse_inventory::Model, ServiceError> {
    let available = item.available_quantity();
    if available < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "product {} has {} available, {} requested",
            item.product_id, available, quantity
        )));
    }
    let previous_reserved = item.reserved_quantity;
    let on_hand = item.quantity;
    let updated = save_levels(conn, item, on_hand, previous_reserved + quantity).await?;
    record_movement(
        conn,
        &updated,
        MovementType::Reservation,
        previous_reserved,
        updated.reserved_quantity,
        context,
    )
    .await?;
    Ok(updated)
}

/// Return reserved units to available stock.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    item: warehouse_inventory::Model,
    quantity: i32,
    context: &MovementContext,
) -> Result<warehouse_inventory::Model, ServiceError> {
    let previous_reserved = item.reserved_quantity;
    let on_hand = item.quantity;
    let updated = save_levels(conn, item, on_hand, previous_reserved - quantity).await?;
    record_movement(
        conn,
        &updated,
        MovementType::ReservationRelease,
        previous_reserved,
        updated.reserved_quantity,
        context,
    )
    .await?;
    Ok(updated)
}

/// Remove reserved units from the warehouse entirely.
pub async fn consume<C: ConnectionTrait>(
    conn: &C,
    item: warehouse_inventory::Model,
    quantity: i32,
    movement_type: MovementType,
    context: &MovementContext,
) -> Result<warehouse_inventory::Model, ServiceError> {
    let previous = item.quantity;
    let reserved = item.reserved_quantity;
    let updated = save_levels(conn, item, previous - quantity, reserved - quantity).await?;
    record_movement(
        conn,
        &updated,
        movement_type,
        previous,
        updated.quantity,
        context,
    )
    .await?;
    Ok(updated)
}

/// Add units to `warehouse_id`, creating the row from `template` (thresholds,
/// product details and cost) when the product is not stocked there yet.
pub async fn receive<C: ConnectionTrait>(
    conn: &C,
    template: &warehouse_inventory::Model,
    warehouse_id: Uuid,
    quantity: i32,
    context: &MovementContext,
) -> Result<warehouse_inventory::Model, ServiceError> {
    let item = match find_item(conn, warehouse_id, &template.product_id).await? {
        Some(item) => item,
        None => {
            let now = Utc::now();
            warehouse_inventory::ActiveModel {
                id: Set(Uuid::new_v4()),
                warehouse_id: Set(warehouse_id),
                product_id: Set(template.product_id.clone()),
                product_name: Set(template.product_name.clone()),
                product_type: Set(template.product_type.clone()),
                quantity: Set(0),
                reserved_quantity: Set(0),
                min_stock_level: Set(template.min_stock_level),
                max_stock_level: Set(template.max_stock_level),
                reorder_point: Set(template.reorder_point),
                unit_cost: Set(template.unit_cost),
                location: Set(None),
                last_movement_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?
        }
    };

    let previous = item.quantity;
    let reserved = item.reserved_quantity;
    let updated = save_levels(conn, item, previous + quantity, reserved).await?;
    record_movement(
        conn,
        &updated,
        MovementType::TransferIn,
        previous,
        updated.quantity,
        context,
    )
    .await?;
    Ok(updated)
}

/// Raise alerts for thresholds the row's quantity now breaches and resolve
/// open alerts it has recovered from. Returns the alerts created.
pub async fn apply_stock_alerts<C: ConnectionTrait>(
    conn: &C,
    item: &warehouse_inventory::Model,
) -> Result<Vec<inventory_alert::Model>, ServiceError> {
    let quantity = item.quantity;
    let mut raised = Vec::new();

    if quantity < item.min_stock_level {
        raised.push((
            AlertType::LowStock,
            Severity::High,
            item.min_stock_level,
            format!(
                "{} at {} units, below minimum stock level {}",
                item.product_name, quantity, item.min_stock_level
            ),
        ));
    }
    if quantity == 0 {
        raised.push((
            AlertType::OutOfStock,
            Severity::Critical,
            0,
            format!("{} is out of stock", item.product_name),
        ));
    }
    if quantity > item.max_stock_level {
        raised.push((
            AlertType::Overstock,
            Severity::Medium,
            item.max_stock_level,
            format!(
                "{} at {} units, above maximum stock level {}",
                item.product_name, quantity, item.max_stock_level
            ),
        ));
    }

    let mut recovered = Vec::new();
    if quantity >= item.min_stock_level {
        recovered.push(AlertType::LowStock.as_str());
    }
    if quantity > 0 {
        recovered.push(AlertType::OutOfStock.as_str());
    }
    if quantity <= item.max_stock_level {
        recovered.push(AlertType::Overstock.as_str());
    }
    if !recovered.is_empty() {
        InventoryAlert::update_many()
            .col_expr(
                inventory_alert::Column::Status,
                Expr::value(AlertStatus::Resolved.as_str()),
            )
            .filter(inventory_alert::Column::WarehouseId.eq(item.warehouse_id))
            .filter(inventory_alert::Column::ProductId.eq(item.product_id.clone()))
            .filter(inventory_alert::Column::AlertType.is_in(recovered))
            .filter(inventory_alert::Column::Status.ne(AlertStatus::Resolved.as_str()))
            .exec(conn)
            .await?;
    }

    let mut created = Vec::with_capacity(raised.len());
    for (alert_type, severity, threshold, message) in raised {
        let alert = inventory_alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(item.warehouse_id),
            product_id: Set(item.product_id.clone()),
            alert_type: Set(alert_type.as_str().to_string()),
            severity: Set(severity.as_str().to_string()),
            message: Set(message),
            current_quantity: Set(quantity),
            threshold: Set(threshold),
            status: Set(AlertStatus::Active.as_str().to_string()),
            acknowledged_by: Set(None),
            acknowledged_at: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
        created.push(alert);
    }
    Ok(created)
}
