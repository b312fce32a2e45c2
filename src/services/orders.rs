use crate::{
    auth::{AuthUser, ORDERS_CANCEL, ORDERS_CREATE, ORDERS_READ, ORDERS_UPDATE},
    config::PricingConfig,
    db::DbPool,
    entities::{
        inventory_alert,
        order::{self, Entity as Order},
        order_item::{self, Entity as OrderItem},
        order_tracking_event::{self, Entity as OrderTrackingEvent},
        types::{MovementType, OrderStatus, PaymentModel, Region, WarehouseStatus},
        warehouse::{self, Entity as Warehouse},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        audit::{AuditEntry, AuditLogger},
        pricing::{self, calculate_pricing, PriceBreakdown, PriceLine},
        stock::{self, MovementContext},
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderItemInput {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Defaults to the caller
    pub customer_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    #[validate]
    pub items: Vec<OrderItemInput>,
    pub payment_model: PaymentModel,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    /// Tracking event text for a status change
    pub description: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TrackingEventRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub warehouse_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub tracking: Vec<order_tracking_event::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn order_number(id: Uuid) -> String {
    let short = id.simple().to_string()[..8].to_uppercase();
    format!("FV-{}-{}", Utc::now().format("%Y%m%d"), short)
}

/// Staff with update rights see every order in their regions; other callers
/// only their own.
fn can_view(actor: &AuthUser, order: &order::Model) -> bool {
    actor.has_permission(ORDERS_UPDATE)
        || order.customer_id == actor.supplier_id
        || order.created_by == actor.supplier_id
}

async fn append_tracking<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    status: &str,
    description: String,
    location: Option<String>,
    created_by: Option<Uuid>,
) -> Result<order_tracking_event::Model, ServiceError> {
    Ok(order_tracking_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status.to_string()),
        description: Set(description),
        location: Set(location),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?)
}

/// Order lifecycle with pricing, stock reservation and tracking
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    audit: Arc<AuditLogger>,
    pricing: PricingConfig,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        audit: Arc<AuditLogger>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
            pricing,
        }
    }

    /// Price a prospective order without writing anything.
    pub fn calculate_pricing(
        &self,
        items: &[OrderItemInput],
        region: Region,
        payment_model: PaymentModel,
    ) -> Result<PriceBreakdown, ServiceError> {
        let lines: Vec<PriceLine> = items
            .iter()
            .map(|i| PriceLine {
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect();
        calculate_pricing(
            &lines,
            region,
            payment_model,
            &self.pricing,
            Utc::now().date_naive(),
        )
    }

    async fn warehouse(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        Warehouse::find_by_id(warehouse_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {} not found", warehouse_id)))
    }

    async fn find(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))
    }

    /// Price the order, reserve stock for every line and write the order with
    /// an initial `PENDING` tracking event. Nothing is written when any line
    /// cannot be reserved.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id, warehouse_id = %request.warehouse_id))]
    pub async fn create_order(
        &self,
        actor: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;
        let mut seen = HashSet::new();
        if let Some(dup) = request.items.iter().find(|i| !seen.insert(i.product_id.as_str())) {
            return Err(ServiceError::ValidationError(format!(
                "product {} listed more than once",
                dup.product_id
            )));
        }

        let warehouse = self.warehouse(request.warehouse_id).await?;
        let region = warehouse.region()?;
        let price = self.calculate_pricing(&request.items, region, request.payment_model)?;
        actor.require(ORDERS_CREATE, Some(region))?;
        if warehouse.status()? != WarehouseStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is {}",
                warehouse.code, warehouse.status
            )));
        }

        let order_id = Uuid::new_v4();
        let actor_id = actor.supplier_id;
        let customer_id = request.customer_id.unwrap_or(actor_id);
        if customer_id != actor_id && !actor.has_permission(ORDERS_UPDATE) {
            return Err(ServiceError::Forbidden(
                "cannot place orders for another customer".to_string(),
            ));
        }

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number(order_id)),
            customer_id: Set(customer_id),
            warehouse_id: Set(warehouse.id),
            region: Set(region.as_str().to_string()),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            currency: Set(price.currency.clone()),
            subtotal: Set(price.subtotal),
            discount_percent: Set(price.discount_percent),
            discount_amount: Set(price.discount_amount),
            tax_amount: Set(price.tax_amount),
            shipping_amount: Set(price.shipping_amount),
            total: Set(price.total),
            payment_model: Set(price.payment_model.as_str().to_string()),
            deposit_amount: Set(price.deposit_amount),
            balance_due: Set(price.balance_due),
            balance_due_date: Set(price.balance_due_date),
            shipping_address: Set(request.shipping_address),
            notes: Set(request.notes),
            tracking_number: Set(None),
            created_by: Set(actor_id),
            created_at: Set(now),
            updated_at: Set(now),
            delivered_at: Set(None),
        };
        let items = request.items;

        let details = self
            .db_pool
            .transaction::<_, OrderDetails, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = order.insert(txn).await?;
                    let context = MovementContext::new(actor_id)
                        .reason(format!("order {}", order.order_number))
                        .reference(order.id);

                    let mut saved_items = Vec::with_capacity(items.len());
                    for input in items {
                        let row = stock::require_item(txn, order.warehouse_id, &input.product_id)
                            .await?;
                        let product_name = row.product_name.clone();
                        stock::reserve(txn, row, input.quantity, &context).await?;

                        let item = order_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order.id),
                            product_id: Set(input.product_id),
                            product_name: Set(product_name),
                            quantity: Set(input.quantity),
                            unit_price: Set(input.unit_price),
                            line_total: Set(pricing::line_total(input.quantity, input.unit_price)?),
                        }
                        .insert(txn)
                        .await?;
                        saved_items.push(item);
                    }

                    let event = append_tracking(
                        txn,
                        order.id,
                        OrderStatus::Pending.as_str(),
                        "Order created".to_string(),
                        None,
                        Some(actor_id),
                    )
                    .await?;

                    Ok(OrderDetails {
                        order,
                        items: saved_items,
                        tracking: vec![event],
                    })
                })
            })
            .await?;

        counter!("flexvolt_orders.created", 1, "region" => region.as_str());
        info!(order_id = %details.order.id, total = %details.order.total, "order created");
        self.event_sender
            .send_or_log(Event::OrderCreated(details.order.id))
            .await;
        self.audit
            .log(
                AuditEntry::new("order.create", "order")
                    .actor(actor.supplier_id)
                    .resource(details.order.id)
                    .region(region)
                    .details(serde_json::json!({
                        "order_number": details.order.order_number,
                        "total": details.order.total,
                        "payment_model": details.order.payment_model,
                    })),
            )
            .await;
        Ok(details)
    }

    /// Edit an order. Delivered and cancelled orders are rejected. A status
    /// change must follow the lifecycle and writes a tracking event; shipping
    /// consumes the reserved stock and cancelling releases it.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id))]
    pub async fn update_order(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find(order_id).await?;
        let region: Region = order.region.parse().map_err(|_| {
            ServiceError::InternalError(format!("unexpected region on order {}", order_id))
        })?;
        actor.require(ORDERS_UPDATE, Some(region))?;
        self.apply_update(actor, order, region, request).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn cancel_order(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find(order_id).await?;
        let region: Region = order.region.parse().map_err(|_| {
            ServiceError::InternalError(format!("unexpected region on order {}", order_id))
        })?;
        actor.require(ORDERS_CANCEL, Some(region))?;
        if !can_view(actor, &order) {
            return Err(ServiceError::Forbidden(
                "cannot cancel another customer's order".to_string(),
            ));
        }

        let request = UpdateOrderRequest {
            status: Some(OrderStatus::Cancelled),
            description: Some(reason.unwrap_or_else(|| "Order cancelled".to_string())),
            ..Default::default()
        };
        self.apply_update(actor, order, region, request).await
    }

    async fn apply_update(
        &self,
        actor: &AuthUser,
        order: order::Model,
        region: Region,
        request: UpdateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        let current = order.status()?;
        if current.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {} and can no longer be modified",
                order.order_number, current
            )));
        }
        let next = request.status.filter(|s| *s != current);
        if let Some(next) = next {
            if !current.can_transition_to(next) {
                return Err(ServiceError::InvalidOperation(format!(
                    "order cannot move from {} to {}",
                    current, next
                )));
            }
        }

        let actor_id = actor.supplier_id;
        let order_id = order.id;
        let (details, alerts) = self
            .db_pool
            .transaction::<_, (OrderDetails, Vec<inventory_alert::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        // the order must still be in the status it was validated against
                        let claimed = Order::update_many()
                            .col_expr(
                                order::Column::Status,
                                Expr::value(next.unwrap_or(current).as_str()),
                            )
                            .col_expr(order::Column::UpdatedAt, Expr::value(now))
                            .filter(order::Column::Id.eq(order.id))
                            .filter(order::Column::Status.eq(current.as_str()))
                            .exec(txn)
                            .await?;
                        if claimed.rows_affected == 0 {
                            return Err(ServiceError::InvalidOperation(format!(
                                "order {} was modified concurrently",
                                order.order_number
                            )));
                        }

                        let items = OrderItem::find()
                            .filter(order_item::Column::OrderId.eq(order.id))
                            .all(txn)
                            .await?;
                        let mut alerts = Vec::new();

                        if let Some(next) = next {
                            let context = MovementContext::new(actor_id)
                                .reason(format!("order {} {}", order.order_number, next))
                                .reference(order.id);
                            for item in &items {
                                let row =
                                    stock::require_item(txn, order.warehouse_id, &item.product_id)
                                        .await?;
                                match next {
                                    OrderStatus::Shipped => {
                                        let row = stock::consume(
                                            txn,
                                            row,
                                            item.quantity,
                                            MovementType::OrderShipment,
                                            &context,
                                        )
                                        .await?;
                                        alerts.extend(stock::apply_stock_alerts(txn, &row).await?);
                                    }
                                    OrderStatus::Cancelled => {
                                        stock::release(txn, row, item.quantity, &context).await?;
                                    }
                                    _ => {}
                                }
                            }
                        }

                        let mut active: order::ActiveModel = order.clone().into();
                        if let Some(address) = request.shipping_address {
                            active.shipping_address = Set(Some(address));
                        }
                        if let Some(notes) = request.notes {
                            active.notes = Set(Some(notes));
                        }
                        if let Some(tracking_number) = request.tracking_number {
                            active.tracking_number = Set(Some(tracking_number));
                        }
                        if let Some(next) = next {
                            active.status = Set(next.as_str().to_string());
                            if next == OrderStatus::Delivered {
                                active.delivered_at = Set(Some(now));
                            }
                        }
                        active.updated_at = Set(now);
                        let order = active.update(txn).await?;

                        if let Some(next) = next {
                            let description = request
                                .description
                                .unwrap_or_else(|| format!("Order {}", next.to_string().to_lowercase()));
                            append_tracking(
                                txn,
                                order.id,
                                next.as_str(),
                                description,
                                request.location,
                                Some(actor_id),
                            )
                            .await?;
                        }

                        let tracking = OrderTrackingEvent::find()
                            .filter(order_tracking_event::Column::OrderId.eq(order.id))
                            .order_by_asc(order_tracking_event::Column::CreatedAt)
                            .all(txn)
                            .await?;
                        Ok((
                            OrderDetails {
                                order,
                                items,
                                tracking,
                            },
                            alerts,
                        ))
                    })
                },
            )
            .await?;

        if let Some(next) = next {
            counter!("flexvolt_orders.status_changes", 1, "status" => next.as_str());
            let event = if next == OrderStatus::Cancelled {
                Event::OrderCancelled(order_id)
            } else {
                Event::OrderStatusChanged {
                    order_id,
                    old_status: current.to_string(),
                    new_status: next.to_string(),
                }
            };
            self.event_sender.send_or_log(event).await;
        }
        for alert in &alerts {
            self.event_sender
                .send_or_log(Event::InventoryAlertRaised {
                    alert_id: alert.id,
                    warehouse_id: alert.warehouse_id,
                    product_id: alert.product_id.clone(),
                    alert_type: alert.alert_type.clone(),
                })
                .await;
        }
        self.audit
            .log(
                AuditEntry::new(
                    if next == Some(OrderStatus::Cancelled) {
                        "order.cancel"
                    } else {
                        "order.update"
                    },
                    "order",
                )
                .actor(actor.supplier_id)
                .resource(order_id)
                .region(region)
                .details(serde_json::json!({
                    "from": current,
                    "to": details.order.status,
                })),
            )
            .await;
        Ok(details)
    }

    pub async fn get_order(&self, actor: &AuthUser, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = self.find(order_id).await?;
        let region: Region = order.region.parse().map_err(|_| {
            ServiceError::InternalError(format!("unexpected region on order {}", order_id))
        })?;
        actor.require(ORDERS_READ, Some(region))?;
        if !can_view(actor, &order) {
            return Err(ServiceError::NotFound(format!("order {} not found", order_id)));
        }

        let db = self.db_pool.as_ref();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        let tracking = OrderTrackingEvent::find()
            .filter(order_tracking_event::Column::OrderId.eq(order_id))
            .order_by_asc(order_tracking_event::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(OrderDetails {
            order,
            items,
            tracking,
        })
    }

    pub async fn list_orders(&self, actor: &AuthUser, filter: OrderFilter) -> Result<OrderPage, ServiceError> {
        actor.require(ORDERS_READ, None)?;
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(20).clamp(1, 100);

        let mut query = Order::find();
        if let Some(scope) = actor.region_scope() {
            query = query.filter(
                order::Column::Region.is_in(scope.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        if !actor.has_permission(ORDERS_UPDATE) {
            query = query.filter(
                order::Column::CustomerId
                    .eq(actor.supplier_id)
                    .or(order::Column::CreatedBy.eq(actor.supplier_id)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.as_str()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(order::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Append a free-form tracking event without changing status.
    pub async fn add_tracking_event(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        request: TrackingEventRequest,
    ) -> Result<order_tracking_event::Model, ServiceError> {
        request.validate()?;
        let order = self.find(order_id).await?;
        let region: Region = order.region.parse().map_err(|_| {
            ServiceError::InternalError(format!("unexpected region on order {}", order_id))
        })?;
        actor.require(ORDERS_UPDATE, Some(region))?;
        if order.status()? == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is cancelled",
                order.order_number
            )));
        }

        append_tracking(
            self.db_pool.as_ref(),
            order_id,
            &order.status,
            request.description,
            request.location,
            Some(actor.supplier_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_are_dated_and_unique() {
        let a = order_number(Uuid::new_v4());
        let b = order_number(Uuid::new_v4());
        assert!(a.starts_with("FV-"));
        assert_eq!(a.len(), "FV-20250101-ABCDEF12".len());
        assert_ne!(a, b);
    }
}
