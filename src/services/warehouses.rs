use crate::{
    auth::{AuthUser, WAREHOUSES_MANAGE, WAREHOUSES_READ},
    db::DbPool,
    entities::{
        types::{
            parse_column, OperationStatus, OperationType, Region, StaffRole, StockStatus,
            WarehouseStatus,
        },
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
        warehouse_operation::{self, Entity as WarehouseOperation},
        warehouse_staff::{self, Entity as WarehouseStaff},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::{AuditEntry, AuditLogger},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWarehouseRequest {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub region: Region,
    pub address: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: i32,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWarehouseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseFilter {
    pub region: Option<Region>,
    pub status: Option<WarehouseStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewStaffMember {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: StaffRole,
    pub shift: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleOperationRequest {
    pub operation_type: OperationType,
    pub scheduled_at: DateTime<Utc>,
    pub assigned_staff_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WarehouseMetrics {
    pub warehouse_id: Uuid,
    pub code: String,
    pub region: Region,
    pub status: WarehouseStatus,
    pub capacity: i32,
    pub sku_count: usize,
    pub total_units: i64,
    pub reserved_units: i64,
    /// Units on hand over capacity, 4 decimal places
    pub utilization: Decimal,
    pub low_stock_items: usize,
    pub out_of_stock_items: usize,
    pub inventory_value: Decimal,
    pub active_staff: usize,
    pub staff_by_role: BTreeMap<String, usize>,
    pub operations_by_status: BTreeMap<String, usize>,
    pub items_processed: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionOverview {
    pub region: Region,
    pub warehouses: usize,
    pub active_warehouses: usize,
    pub capacity: i64,
    pub total_units: i64,
    pub utilization: Decimal,
    pub inventory_value: Decimal,
    pub active_staff: usize,
}

/// Ratio of `units` to `capacity`, zero when capacity is not positive.
pub fn utilization(units: i64, capacity: i64) -> Decimal {
    if capacity <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(units) / Decimal::from(capacity)).round_dp(4)
}

#[derive(Clone)]
pub struct WarehouseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    audit: Arc<AuditLogger>,
}

impl WarehouseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, audit: Arc<AuditLogger>) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
        }
    }

    async fn find(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        Warehouse::find_by_id(warehouse_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {} not found", warehouse_id)))
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id, code = %request.code))]
    pub async fn create_warehouse(
        &self,
        actor: &AuthUser,
        request: CreateWarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        request.validate()?;
        actor.require(WAREHOUSES_MANAGE, Some(request.region))?;

        let code = request.code.trim().to_uppercase();
        let db = self.db_pool.as_ref();
        if Warehouse::find()
            .filter(warehouse::Column::Code.eq(code.clone()))
            .one(db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!("warehouse code {} already exists", code)));
        }

        let now = Utc::now();
        let warehouse = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(request.name),
            region: Set(request.region.as_str().to_string()),
            address: Set(request.address),
            capacity: Set(request.capacity),
            status: Set(WarehouseStatus::Active.as_str().to_string()),
            timezone: Set(request
                .timezone
                .unwrap_or_else(|| request.region.default_timezone().to_string())),
            currency: Set(request.region.currency().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(warehouse_id = %warehouse.id, "warehouse created");
        self.event_sender
            .send_or_log(Event::WarehouseCreated(warehouse.id))
            .await;
        self.audit
            .log(
                AuditEntry::new("warehouse.create", "warehouse")
                    .actor(actor.supplier_id)
                    .resource(warehouse.id)
                    .region(request.region),
            )
            .await;
        Ok(warehouse)
    }

    pub async fn get_warehouse(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
    ) -> Result<warehouse::Model, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_READ, Some(warehouse.region()?))?;
        Ok(warehouse)
    }

    pub async fn list_warehouses(
        &self,
        actor: &AuthUser,
        filter: WarehouseFilter,
    ) -> Result<Vec<warehouse::Model>, ServiceError> {
        actor.require(WAREHOUSES_READ, filter.region)?;
        let mut query = Warehouse::find();
        if let Some(region) = filter.region {
            query = query.filter(warehouse::Column::Region.eq(region.as_str()));
        } else if let Some(scope) = actor.region_scope() {
            query = query.filter(
                warehouse::Column::Region.is_in(scope.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(warehouse::Column::Status.eq(status.as_str()));
        }
        Ok(query
            .order_by_asc(warehouse::Column::Code)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn update_warehouse(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        request: UpdateWarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        request.validate()?;
        let warehouse = self.find(warehouse_id).await?;
        let region = warehouse.region()?;
        actor.require(WAREHOUSES_MANAGE, Some(region))?;

        let mut active: warehouse::ActiveModel = warehouse.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(capacity) = request.capacity {
            active.capacity = Set(capacity);
        }
        if let Some(timezone) = request.timezone {
            active.timezone = Set(timezone);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(self.db_pool.as_ref()).await?;

        self.audit
            .log(
                AuditEntry::new("warehouse.update", "warehouse")
                    .actor(actor.supplier_id)
                    .resource(warehouse_id)
                    .region(region),
            )
            .await;
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn set_status(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        status: WarehouseStatus,
    ) -> Result<warehouse::Model, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        let region = warehouse.region()?;
        actor.require(WAREHOUSES_MANAGE, Some(region))?;

        let old_status = warehouse.status.clone();
        if old_status == status.as_str() {
            return Ok(warehouse);
        }
        let mut active: warehouse::ActiveModel = warehouse.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(self.db_pool.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::WarehouseStatusChanged {
                warehouse_id,
                old_status: old_status.clone(),
                new_status: updated.status.clone(),
            })
            .await;
        self.audit
            .log(
                AuditEntry::new("warehouse.status", "warehouse")
                    .actor(actor.supplier_id)
                    .resource(warehouse_id)
                    .region(region)
                    .details(serde_json::json!({ "from": old_status, "to": updated.status })),
            )
            .await;
        Ok(updated)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn add_staff(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        request: NewStaffMember,
    ) -> Result<warehouse_staff::Model, ServiceError> {
        request.validate()?;
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_MANAGE, Some(warehouse.region()?))?;

        let now = Utc::now();
        let staff = warehouse_staff::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            name: Set(request.name),
            email: Set(request.email.trim().to_lowercase()),
            role: Set(request.role.as_str().to_string()),
            shift: Set(request.shift),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        self.audit
            .log(
                AuditEntry::new("warehouse.staff_add", "warehouse_staff")
                    .actor(actor.supplier_id)
                    .resource(staff.id)
                    .region(warehouse.region()?),
            )
            .await;
        Ok(staff)
    }

    pub async fn list_staff(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<warehouse_staff::Model>, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_READ, Some(warehouse.region()?))?;
        let mut query =
            WarehouseStaff::find().filter(warehouse_staff::Column::WarehouseId.eq(warehouse_id));
        if !include_inactive {
            query = query.filter(warehouse_staff::Column::Active.eq(true));
        }
        Ok(query
            .order_by_asc(warehouse_staff::Column::Name)
            .all(self.db_pool.as_ref())
            .await?)
    }

    pub async fn deactivate_staff(
        &self,
        actor: &AuthUser,
        staff_id: Uuid,
    ) -> Result<warehouse_staff::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let staff = WarehouseStaff::find_by_id(staff_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("staff member {} not found", staff_id)))?;
        let region = self.find(staff.warehouse_id).await?.region()?;
        actor.require(WAREHOUSES_MANAGE, Some(region))?;

        let mut active: warehouse_staff::ActiveModel = staff.into();
        active.active = Set(false);
        active.updated_at = Set(Utc::now());
        let staff = active.update(db).await?;

        self.audit
            .log(
                AuditEntry::new("warehouse.staff_deactivate", "warehouse_staff")
                    .actor(actor.supplier_id)
                    .resource(staff_id)
                    .region(region),
            )
            .await;
        Ok(staff)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn schedule_operation(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        request: ScheduleOperationRequest,
    ) -> Result<warehouse_operation::Model, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_MANAGE, Some(warehouse.region()?))?;
        if warehouse.status()? != WarehouseStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is {}",
                warehouse.code, warehouse.status
            )));
        }

        let db = self.db_pool.as_ref();
        if let Some(staff_id) = request.assigned_staff_id {
            let staff = WarehouseStaff::find_by_id(staff_id).one(db).await?;
            match staff {
                Some(s) if s.warehouse_id == warehouse_id && s.active => {}
                _ => {
                    return Err(ServiceError::ValidationError(format!(
                        "staff member {} is not active in warehouse {}",
                        staff_id, warehouse.code
                    )))
                }
            }
        }

        let operation = warehouse_operation::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            operation_type: Set(request.operation_type.as_str().to_string()),
            status: Set(OperationStatus::Scheduled.as_str().to_string()),
            assigned_staff_id: Set(request.assigned_staff_id),
            scheduled_at: Set(request.scheduled_at),
            started_at: Set(None),
            completed_at: Set(None),
            items_processed: Set(0),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;
        Ok(operation)
    }

    async fn transition_operation(
        &self,
        actor: &AuthUser,
        operation_id: Uuid,
        next: OperationStatus,
        items_processed: Option<i32>,
    ) -> Result<warehouse_operation::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let operation = WarehouseOperation::find_by_id(operation_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("operation {} not found", operation_id)))?;
        let region = self.find(operation.warehouse_id).await?.region()?;
        actor.require(WAREHOUSES_MANAGE, Some(region))?;

        let current: OperationStatus =
            parse_column(&operation.status, "warehouse_operations.status")?;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidOperation(format!(
                "operation cannot move from {} to {}",
                current, next
            )));
        }
        if items_processed.map_or(false, |n| n < 0) {
            return Err(ServiceError::ValidationError(
                "items_processed must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let mut active: warehouse_operation::ActiveModel = operation.into();
        active.status = Set(next.as_str().to_string());
        match next {
            OperationStatus::InProgress => active.started_at = Set(Some(now)),
            OperationStatus::Completed | OperationStatus::Cancelled => {
                active.completed_at = Set(Some(now))
            }
            OperationStatus::Scheduled => {}
        }
        if let Some(items) = items_processed {
            active.items_processed = Set(items);
        }
        Ok(active.update(db).await?)
    }

    pub async fn start_operation(
        &self,
        actor: &AuthUser,
        operation_id: Uuid,
    ) -> Result<warehouse_operation::Model, ServiceError> {
        self.transition_operation(actor, operation_id, OperationStatus::InProgress, None)
            .await
    }

    pub async fn complete_operation(
        &self,
        actor: &AuthUser,
        operation_id: Uuid,
        items_processed: i32,
    ) -> Result<warehouse_operation::Model, ServiceError> {
        self.transition_operation(
            actor,
            operation_id,
            OperationStatus::Completed,
            Some(items_processed),
        )
        .await
    }

    pub async fn cancel_operation(
        &self,
        actor: &AuthUser,
        operation_id: Uuid,
    ) -> Result<warehouse_operation::Model, ServiceError> {
        self.transition_operation(actor, operation_id, OperationStatus::Cancelled, None)
            .await
    }

    pub async fn list_operations(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        status: Option<OperationStatus>,
    ) -> Result<Vec<warehouse_operation::Model>, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_READ, Some(warehouse.region()?))?;
        let mut query = WarehouseOperation::find()
            .filter(warehouse_operation::Column::WarehouseId.eq(warehouse_id));
        if let Some(status) = status {
            query = query.filter(warehouse_operation::Column::Status.eq(status.as_str()));
        }
        Ok(query
            .order_by_asc(warehouse_operation::Column::ScheduledAt)
            .all(self.db_pool.as_ref())
            .await?)
    }

    /// Stock, staffing and throughput figures for one warehouse.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn warehouse_metrics(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
    ) -> Result<WarehouseMetrics, ServiceError> {
        let warehouse = self.find(warehouse_id).await?;
        actor.require(WAREHOUSES_READ, Some(warehouse.region()?))?;
        self.metrics_for(warehouse).await
    }

    async fn metrics_for(&self, warehouse: warehouse::Model) -> Result<WarehouseMetrics, ServiceError> {
        let db = self.db_pool.as_ref();
        let items = WarehouseInventory::find()
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse.id))
            .all(db)
            .await?;
        let staff = WarehouseStaff::find()
            .filter(warehouse_staff::Column::WarehouseId.eq(warehouse.id))
            .filter(warehouse_staff::Column::Active.eq(true))
            .all(db)
            .await?;
        let operations = WarehouseOperation::find()
            .filter(warehouse_operation::Column::WarehouseId.eq(warehouse.id))
            .all(db)
            .await?;

        let total_units: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();
        let mut staff_by_role: BTreeMap<String, usize> =
            StaffRole::iter().map(|r| (r.to_string(), 0)).collect();
        for member in &staff {
            *staff_by_role.entry(member.role.clone()).or_default() += 1;
        }
        let mut operations_by_status: BTreeMap<String, usize> =
            OperationStatus::iter().map(|s| (s.to_string(), 0)).collect();
        for operation in &operations {
            *operations_by_status.entry(operation.status.clone()).or_default() += 1;
        }

        Ok(WarehouseMetrics {
            warehouse_id: warehouse.id,
            region: warehouse.region()?,
            status: warehouse.status()?,
            capacity: warehouse.capacity,
            sku_count: items.len(),
            total_units,
            reserved_units: items.iter().map(|i| i64::from(i.reserved_quantity)).sum(),
            utilization: utilization(total_units, i64::from(warehouse.capacity)),
            low_stock_items: items
                .iter()
                .filter(|i| i.stock_status() == StockStatus::LowStock)
                .count(),
            out_of_stock_items: items
                .iter()
                .filter(|i| i.stock_status() == StockStatus::OutOfStock)
                .count(),
            inventory_value: items.iter().map(|i| i.stock_value()).sum(),
            active_staff: staff.len(),
            staff_by_role,
            operations_by_status,
            items_processed: operations
                .iter()
                .filter(|o| o.status == OperationStatus::Completed.as_str())
                .map(|o| i64::from(o.items_processed))
                .sum(),
            code: warehouse.code,
        })
    }

    /// Metrics rolled up per region the actor can see.
    pub async fn network_overview(&self, actor: &AuthUser) -> Result<Vec<RegionOverview>, ServiceError> {
        let warehouses = self.list_warehouses(actor, WarehouseFilter::default()).await?;
        let mut overview: BTreeMap<&'static str, RegionOverview> = BTreeMap::new();

        for warehouse in warehouses {
            let region = warehouse.region()?;
            let is_active = warehouse.status()? == WarehouseStatus::Active;
            let metrics = self.metrics_for(warehouse).await?;
            let entry = overview.entry(region.as_str()).or_insert_with(|| RegionOverview {
                region,
                warehouses: 0,
                active_warehouses: 0,
                capacity: 0,
                total_units: 0,
                utilization: Decimal::ZERO,
                inventory_value: Decimal::ZERO,
                active_staff: 0,
            });
            entry.warehouses += 1;
            if is_active {
                entry.active_warehouses += 1;
            }
            entry.capacity += i64::from(metrics.capacity);
            entry.total_units += metrics.total_units;
            entry.inventory_value += metrics.inventory_value;
            entry.active_staff += metrics.active_staff;
        }

        Ok(overview
            .into_values()
            .map(|mut region| {
                region.utilization = utilization(region.total_units, region.capacity);
                region
            })
            .collect())
    }
}
