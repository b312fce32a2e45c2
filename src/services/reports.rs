use crate::{
    auth::{AuthUser, AUDIT_READ, REPORTS_GENERATE},
    db::DbPool,
    entities::{
        compliance_check::{self, Entity as ComplianceCheck},
        compliance_violation::{self, Entity as ComplianceViolation},
        inventory_alert::{self, Entity as InventoryAlert},
        inventory_movement::{self, Entity as InventoryMovement},
        order::{self, Entity as Order},
        types::{
            AlertStatus, MovementType, OrderStatus, Region, ReportFormat, ReportType, Severity,
            ViolationStatus,
        },
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
    },
    errors::ServiceError,
    services::{
        analytics::{inventory_metrics, order_metrics},
        audit::{AuditEntry, AuditLogger, AuditQuery},
    },
};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub report_type: ReportType,
    #[serde(default = "default_format")]
    pub format: ReportFormat,
    pub region: Option<Region>,
    pub warehouse_id: Option<Uuid>,
    /// Look-back window for order, compliance and audit reports
    pub days: Option<i64>,
}

fn default_format() -> ReportFormat {
    ReportFormat::Json
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub id: Uuid,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub region: Option<Region>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Uuid,
    pub period_start: DateTime<Utc>,
    pub summary: Value,
    pub insights: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<Value>,
}

impl GeneratedReport {
    /// Body and content type for the requested format.
    pub fn render(&self) -> Result<(String, &'static str), ServiceError> {
        match self.format {
            ReportFormat::Json => Ok((serde_json::to_string_pretty(self)?, "application/json")),
            ReportFormat::Csv => Ok((rows_to_csv(&self.rows), "text/csv")),
        }
    }
}

fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flat JSON objects to CSV. Columns are the union of keys in sorted order.
pub fn rows_to_csv(rows: &[Value]) -> String {
    let headers: Vec<String> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|map| map.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if headers.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let line: Vec<String> = headers
            .iter()
            .map(|h| escape_field(&value_to_string(row.get(h).unwrap_or(&Value::Null))))
            .collect();
        lines.push(line.join(","));
    }
    lines.join("\n")
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 10000.0).round() / 100.0
    }
}

/// The most frequent key and its count, ties broken alphabetically.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
}

pub struct ReportGenerator {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditLogger>,
}

struct ReportBody {
    summary: Value,
    insights: Vec<String>,
    rows: Vec<Value>,
}

impl ReportGenerator {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditLogger>) -> Self {
        Self { db_pool, audit }
    }

    async fn warehouses(
        &self,
        actor: &AuthUser,
        request: &ReportRequest,
    ) -> Result<Vec<warehouse::Model>, ServiceError> {
        let mut query = Warehouse::find();
        if let Some(warehouse_id) = request.warehouse_id {
            query = query.filter(warehouse::Column::Id.eq(warehouse_id));
        }
        if let Some(region) = request.region {
            query = query.filter(warehouse::Column::Region.eq(region.as_str()));
        }
        if let Some(regions) = actor.region_scope() {
            query = query.filter(
                warehouse::Column::Region.is_in(regions.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        Ok(query
            .order_by_asc(warehouse::Column::Code)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id, report_type = %request.report_type))]
    pub async fn generate(
        &self,
        actor: &AuthUser,
        request: ReportRequest,
    ) -> Result<GeneratedReport, ServiceError> {
        actor.require(REPORTS_GENERATE, request.region)?;
        let days = request.days.unwrap_or(30).clamp(1, 365);
        let now = Utc::now();
        let since = now - Duration::days(days);

        let body = match request.report_type {
            ReportType::Inventory => self.inventory_report(actor, &request, since).await?,
            ReportType::Orders => self.orders_report(actor, &request, since).await?,
            ReportType::Compliance => self.compliance_report(actor, &request, since).await?,
            ReportType::Audit => {
                actor.require(AUDIT_READ, request.region)?;
                self.audit_report(since).await?
            }
        };

        let report = GeneratedReport {
            id: Uuid::new_v4(),
            report_type: request.report_type,
            format: request.format,
            region: request.region,
            generated_at: now,
            generated_by: actor.supplier_id,
            period_start: since,
            summary: body.summary,
            insights: body.insights,
            row_count: body.rows.len(),
            rows: body.rows,
        };

        counter!("flexvolt_reports.generated", 1, "type" => report.report_type.as_str());
        info!(report_id = %report.id, rows = report.row_count, "report generated");
        let mut entry = AuditEntry::new("report.generate", "report")
            .actor(actor.supplier_id)
            .resource(report.id)
            .details(json!({
                "report_type": report.report_type,
                "format": report.format,
                "rows": report.row_count,
            }));
        if let Some(region) = request.region {
            entry = entry.region(region);
        }
        self.audit.log(entry).await;
        Ok(report)
    }

    async fn inventory_report(
        &self,
        actor: &AuthUser,
        request: &ReportRequest,
        since: DateTime<Utc>,
    ) -> Result<ReportBody, ServiceError> {
        let db = self.db_pool.as_ref();
        let warehouses = self.warehouses(actor, request).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let codes: HashMap<Uuid, &warehouse::Model> = warehouses.iter().map(|w| (w.id, w)).collect();

        let items = WarehouseInventory::find()
            .filter(warehouse_inventory::Column::WarehouseId.is_in(ids.clone()))
            .order_by_asc(warehouse_inventory::Column::ProductId)
            .all(db)
            .await?;
        let outbound = InventoryMovement::find()
            .filter(inventory_movement::Column::WarehouseId.is_in(ids.clone()))
            .filter(inventory_movement::Column::MovementType.is_in([
                MovementType::OrderShipment.as_str(),
                MovementType::TransferOut.as_str(),
            ]))
            .filter(inventory_movement::Column::CreatedAt.gte(since))
            .all(db)
            .await?;
        let active_alerts = InventoryAlert::find()
            .filter(inventory_alert::Column::WarehouseId.is_in(ids))
            .filter(inventory_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .all(db)
            .await?;
        let metrics = inventory_metrics(&items, &outbound, active_alerts.len());

        let rows: Vec<Value> = items
            .iter()
            .map(|item| {
                let warehouse = codes.get(&item.warehouse_id);
                json!({
                    "warehouse": warehouse.map(|w| w.code.as_str()),
                    "region": warehouse.map(|w| w.region.as_str()),
                    "product_id": item.product_id,
                    "product_name": item.product_name,
                    "quantity": item.quantity,
                    "reserved": item.reserved_quantity,
                    "available": item.available_quantity(),
                    "min_stock_level": item.min_stock_level,
                    "max_stock_level": item.max_stock_level,
                    "status": item.stock_status(),
                    "value": item.stock_value(),
                })
            })
            .collect();

        let mut insights = Vec::new();
        if metrics.total_skus == 0 {
            insights.push("No stock recorded in scope".to_string());
        } else {
            insights.push(format!(
                "{} of {} SKUs need attention ({} low, {} out of stock, {} overstocked)",
                metrics.low_stock_items + metrics.out_of_stock_items + metrics.overstock_items,
                metrics.total_skus,
                metrics.low_stock_items,
                metrics.out_of_stock_items,
                metrics.overstock_items
            ));
            insights.push(format!("Stock-out rate is {:.2}%", metrics.stock_out_rate));
            if let Some(top) = items.iter().max_by_key(|i| i.stock_value()) {
                insights.push(format!(
                    "{} holds the most value at {}",
                    top.product_name,
                    top.stock_value().round_dp(2)
                ));
            }
        }
        let critical = active_alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical.as_str())
            .count();
        if critical > 0 {
            insights.push(format!("{} critical stock alerts are open", critical));
        }

        Ok(ReportBody {
            summary: serde_json::to_value(&metrics)?,
            insights,
            rows,
        })
    }

    async fn orders_report(
        &self,
        actor: &AuthUser,
        request: &ReportRequest,
        since: DateTime<Utc>,
    ) -> Result<ReportBody, ServiceError> {
        let warehouses = self.warehouses(actor, request).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let orders = Order::find()
            .filter(order::Column::WarehouseId.is_in(ids))
            .filter(order::Column::CreatedAt.gte(since))
            .order_by_asc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?;
        let metrics = order_metrics(&orders);

        let rows: Vec<Value> = orders
            .iter()
            .map(|o| {
                json!({
                    "order_number": o.order_number,
                    "status": o.status,
                    "region": o.region,
                    "currency": o.currency,
                    "subtotal": o.subtotal,
                    "discount_percent": o.discount_percent,
                    "tax": o.tax_amount,
                    "shipping": o.shipping_amount,
                    "total": o.total,
                    "payment_model": o.payment_model,
                    "balance_due": o.balance_due,
                    "created_at": o.created_at,
                })
            })
            .collect();

        let mut insights = Vec::new();
        if orders.is_empty() {
            insights.push("No orders in the period".to_string());
        } else {
            insights.push(format!(
                "{} orders, revenue {} and average order value {}",
                metrics.total_orders, metrics.revenue, metrics.average_order_value
            ));
            let cancelled = metrics
                .orders_by_status
                .get(OrderStatus::Cancelled.as_str())
                .copied()
                .unwrap_or(0);
            insights.push(format!(
                "Cancellation rate is {:.2}%",
                percent(cancelled, orders.len())
            ));
            let discounted = orders.iter().filter(|o| o.discount_percent > Decimal::ZERO).count();
            insights.push(format!(
                "{:.2}% of orders qualified for a volume discount",
                percent(discounted, orders.len())
            ));
            if metrics.outstanding_balance > Decimal::ZERO {
                insights.push(format!(
                    "{} deposit orders carry {} in outstanding balances",
                    metrics.deposit_orders, metrics.outstanding_balance
                ));
            }
            if let Some(hours) = metrics.average_fulfilment_hours {
                insights.push(format!("Orders are delivered in {:.1} hours on average", hours));
            }
        }

        Ok(ReportBody {
            summary: serde_json::to_value(&metrics)?,
            insights,
            rows,
        })
    }

    async fn compliance_report(
        &self,
        actor: &AuthUser,
        request: &ReportRequest,
        since: DateTime<Utc>,
    ) -> Result<ReportBody, ServiceError> {
        let db = self.db_pool.as_ref();
        let warehouses = self.warehouses(actor, request).await?;
        let ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
        let checks = ComplianceCheck::find()
            .filter(compliance_check::Column::WarehouseId.is_in(ids.clone()))
            .filter(compliance_check::Column::CreatedAt.gte(since))
            .order_by_asc(compliance_check::Column::CreatedAt)
            .all(db)
            .await?;
        let open = ComplianceViolation::find()
            .filter(compliance_violation::Column::WarehouseId.is_in(ids))
            .filter(compliance_violation::Column::Status.eq(ViolationStatus::Open.as_str()))
            .all(db)
            .await?;

        let passed = checks.iter().filter(|c| c.compliant).count();
        let now = Utc::now();
        let overdue = checks.iter().filter(|c| c.next_review_at < now).count();
        let rows: Vec<Value> = checks
            .iter()
            .map(|c| {
                json!({
                    "checked_at": c.created_at,
                    "warehouse_id": c.warehouse_id,
                    "region": c.region,
                    "operation": c.operation,
                    "product_type": c.product_type,
                    "compliant": c.compliant,
                    "risk_level": c.risk_level,
                    "violations": c.violation_count,
                    "next_review_at": c.next_review_at,
                })
            })
            .collect();

        let mut insights = vec![format!(
            "{} of {} checks passed ({:.2}%)",
            passed,
            checks.len(),
            percent(passed, checks.len())
        )];
        if let Some((rule, count)) = most_common(open.iter().map(|v| v.rule_code.as_str())) {
            insights.push(format!("{} is the most frequent open violation ({})", rule, count));
        }
        let critical = open
            .iter()
            .filter(|v| v.severity == Severity::Critical.as_str())
            .count();
        if critical > 0 {
            insights.push(format!("{} critical violations remain open", critical));
        }

        Ok(ReportBody {
            summary: json!({
                "total_checks": checks.len(),
                "compliant_checks": passed,
                "compliance_rate": percent(passed, checks.len()),
                "open_violations": open.len(),
                "critical_open_violations": critical,
                "checks_past_review_date": overdue,
            }),
            insights,
            rows,
        })
    }

    async fn audit_report(&self, since: DateTime<Utc>) -> Result<ReportBody, ServiceError> {
        // Entries still buffered would otherwise be missing from the report.
        self.audit.flush().await?;
        let entries = self
            .audit
            .query(AuditQuery {
                from: Some(since),
                limit: Some(1000),
                ..Default::default()
            })
            .await?;

        let failures = entries.iter().filter(|e| e.outcome == "FAILURE").count();
        let rows: Vec<Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "at": e.created_at,
                    "actor_id": e.actor_id,
                    "action": e.action,
                    "resource_type": e.resource_type,
                    "resource_id": e.resource_id,
                    "region": e.region,
                    "outcome": e.outcome,
                    "request_id": e.request_id,
                })
            })
            .collect();

        let mut insights = vec![format!(
            "{} audited actions, {} failed ({:.2}%)",
            entries.len(),
            failures,
            percent(failures, entries.len())
        )];
        if let Some((action, count)) = most_common(entries.iter().map(|e| e.action.as_str())) {
            insights.push(format!("Most frequent action: {} ({})", action, count));
        }
        let actors: BTreeSet<Uuid> = entries.iter().filter_map(|e| e.actor_id).collect();
        insights.push(format!("{} distinct actors", actors.len()));

        Ok(ReportBody {
            summary: json!({
                "entries": entries.len(),
                "failures": failures,
                "distinct_actors": actors.len(),
            }),
            insights,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_unions_columns_and_escapes() {
        let rows = vec![
            json!({"name": "FlexVolt 60V, 6Ah", "qty": 3}),
            json!({"name": "Charger \"fast\"", "bin": "A-1"}),
        ];
        assert_eq!(
            rows_to_csv(&rows),
            "bin,name,qty\n,\"FlexVolt 60V, 6Ah\",3\nA-1,\"Charger \"\"fast\"\"\","
        );
        assert_eq!(rows_to_csv(&[]), "");
    }

    #[test]
    fn most_common_prefers_count_then_name() {
        let values = ["b", "a", "b", "a", "c"];
        assert_eq!(most_common(values.iter().copied()), Some(("a", 2)));
        assert_eq!(most_common(std::iter::empty()), None);
    }

    #[test]
    fn percent_handles_empty() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 3), 33.33);
    }
}
