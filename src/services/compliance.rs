//! Regional compliance checks.
//!
//! [`RegulationChecker`] evaluates a static regulation table against a
//! warehouse operation. [`ComplianceService`] gathers the inputs, persists the
//! check with its violations and serves history and summaries.

use crate::{
    auth::{AuthUser, COMPLIANCE_CHECK, COMPLIANCE_READ, COMPLIANCE_RESOLVE},
    db::DbPool,
    entities::{
        compliance_check::{self, Entity as ComplianceCheck},
        compliance_violation::{self, Entity as ComplianceViolation},
        supplier::Entity as Supplier,
        types::{
            parse_column, ComplianceOperation, ProductType, Region, RiskLevel, Severity,
            StaffRole, ViolationStatus, WarehouseStatus,
        },
        warehouse::{self, Entity as Warehouse},
        warehouse_inventory::{self, Entity as WarehouseInventory},
        warehouse_staff::{self, Entity as WarehouseStaff},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::{AuditEntry, AuditLogger},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::types::ComplianceOperation::{Receiving, Shipping, Storage, Transfer};
use crate::entities::types::ProductType::{Accessory, Charger, LithiumIon, NickelMetalHydride};

const ALL_OPERATIONS: &[ComplianceOperation] = &[Storage, Receiving, Shipping, Transfer];
const ALL_PRODUCTS: &[ProductType] = &[LithiumIon, NickelMetalHydride, Charger, Accessory];
const CELLS: &[ProductType] = &[LithiumIon, NickelMetalHydride];

/// What a regulation inspects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requirement {
    /// The supplier must hold this certification
    Certification(&'static str),
    /// A single operation may not move or store more units than this
    MaxQuantity(i32),
    /// Units on hand plus the operation must fit the warehouse capacity
    WithinCapacity,
    /// The warehouse must be `ACTIVE`
    OperationalWarehouse,
    /// A manager or supervisor must be on the warehouse roster
    SupervisorOnSite,
}

#[derive(Debug, Clone, Copy)]
pub struct Regulation {
    pub code: &'static str,
    pub name: &'static str,
    /// `None` applies everywhere
    pub region: Option<Region>,
    pub operations: &'static [ComplianceOperation],
    pub products: &'static [ProductType],
    pub requirement: Requirement,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

impl Regulation {
    fn applies_to(&self, region: Region, operation: ComplianceOperation, product: ProductType) -> bool {
        self.region.map_or(true, |r| r == region)
            && self.operations.contains(&operation)
            && self.products.contains(&product)
    }
}

pub static REGULATIONS: &[Regulation] = &[
    Regulation {
        code: "GEN-OPS-01",
        name: "Operational warehouse",
        region: None,
        operations: ALL_OPERATIONS,
        products: ALL_PRODUCTS,
        requirement: Requirement::OperationalWarehouse,
        severity: Severity::High,
        description: "Stock operations require an active warehouse",
        remediation: "Reactivate the warehouse or route the operation elsewhere",
    },
    Regulation {
        code: "GEN-CAP-01",
        name: "Storage capacity",
        region: None,
        operations: &[Storage, Receiving],
        products: ALL_PRODUCTS,
        requirement: Requirement::WithinCapacity,
        severity: Severity::Medium,
        description: "Stored units would exceed warehouse capacity",
        remediation: "Transfer stock out or reduce the inbound quantity",
    },
    Regulation {
        code: "US-DOT-173.185",
        name: "49 CFR 173.185 Lithium cells and batteries",
        region: Some(Region::UsWest),
        operations: &[Shipping, Transfer],
        products: &[LithiumIon],
        requirement: Requirement::Certification("HAZMAT"),
        severity: Severity::Critical,
        description: "Lithium battery shipments need hazmat-trained shippers",
        remediation: "Complete DOT hazmat training and register the certificate",
    },
    Regulation {
        code: "US-CFC-320",
        name: "California Fire Code ch. 320 lithium-ion storage",
        region: Some(Region::UsWest),
        operations: &[Storage, Receiving],
        products: &[LithiumIon],
        requirement: Requirement::MaxQuantity(5000),
        severity: Severity::High,
        description: "Lithium-ion storage lot exceeds the permitted quantity",
        remediation: "Split the lot across fire areas or warehouses",
    },
    Regulation {
        code: "US-OSHA-1910",
        name: "OSHA 1910 supervision",
        region: Some(Region::UsWest),
        operations: &[Receiving, Shipping],
        products: CELLS,
        requirement: Requirement::SupervisorOnSite,
        severity: Severity::Medium,
        description: "Battery handling requires a supervisor on the roster",
        remediation: "Assign a manager or supervisor to the warehouse",
    },
    Regulation {
        code: "JP-PSE",
        name: "Electrical Appliance and Material Safety Act (PSE)",
        region: Some(Region::Japan),
        operations: &[Storage, Receiving, Shipping],
        products: &[LithiumIon, Charger],
        requirement: Requirement::Certification("PSE"),
        severity: Severity::High,
        description: "Products sold in Japan must carry the PSE mark",
        remediation: "Obtain PSE conformity certification for the product line",
    },
    Regulation {
        code: "JP-FSA-LI",
        name: "Fire Service Act designated hazardous materials",
        region: Some(Region::Japan),
        operations: &[Storage, Receiving],
        products: &[LithiumIon],
        requirement: Requirement::MaxQuantity(2000),
        severity: Severity::High,
        description: "Lithium-ion storage lot exceeds the designated quantity",
        remediation: "Reduce the lot or file a hazardous storage notification",
    },
    Regulation {
        code: "EU-2023-1542",
        name: "EU Battery Regulation 2023/1542",
        region: Some(Region::EuGermany),
        operations: ALL_OPERATIONS,
        products: CELLS,
        requirement: Requirement::Certification("EU_BATTERY_PASSPORT"),
        severity: Severity::High,
        description: "Batteries placed on the EU market need a battery passport",
        remediation: "Register the battery passport for the product line",
    },
    Regulation {
        code: "EU-ADR-SP188",
        name: "ADR special provision 188",
        region: Some(Region::EuGermany),
        operations: &[Shipping, Transfer],
        products: &[LithiumIon],
        requirement: Requirement::Certification("ADR"),
        severity: Severity::Critical,
        description: "Road transport of lithium batteries requires ADR training",
        remediation: "Complete ADR dangerous goods training",
    },
    Regulation {
        code: "DE-BATTG",
        name: "Batteriegesetz take-back registration",
        region: Some(Region::EuGermany),
        operations: &[Receiving, Shipping],
        products: CELLS,
        requirement: Requirement::Certification("BATTG"),
        severity: Severity::Medium,
        description: "Producers must be registered for battery take-back",
        remediation: "Register with the stiftung ear battery register",
    },
    Regulation {
        code: "EU-WEEE",
        name: "WEEE Directive 2012/19/EU",
        region: Some(Region::EuGermany),
        operations: &[Shipping],
        products: &[Charger],
        requirement: Requirement::Certification("WEEE"),
        severity: Severity::Low,
        description: "Electrical equipment shipped in the EU needs WEEE registration",
        remediation: "Register the charger line under WEEE",
    },
    Regulation {
        code: "AU-ADG-7.8",
        name: "Australian Dangerous Goods Code 7.8",
        region: Some(Region::Australia),
        operations: &[Shipping, Transfer],
        products: &[LithiumIon],
        requirement: Requirement::Certification("ADG"),
        severity: Severity::Critical,
        description: "Class 9 lithium battery transport requires ADG accreditation",
        remediation: "Obtain ADG dangerous goods accreditation",
    },
    Regulation {
        code: "AU-ASNZS-5139",
        name: "AS/NZS 5139 battery storage",
        region: Some(Region::Australia),
        operations: &[Storage, Receiving],
        products: CELLS,
        requirement: Requirement::MaxQuantity(3000),
        severity: Severity::High,
        description: "Battery storage lot exceeds the AS/NZS 5139 limit",
        remediation: "Split storage across separated battery areas",
    },
    Regulation {
        code: "AU-WHS-2011",
        name: "WHS Regulations 2011 supervision",
        region: Some(Region::Australia),
        operations: &[Receiving, Storage],
        products: CELLS,
        requirement: Requirement::SupervisorOnSite,
        severity: Severity::Medium,
        description: "Battery handling requires a supervisor on the roster",
        remediation: "Assign a manager or supervisor to the warehouse",
    },
];

/// Facts a check is evaluated against.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub region: Region,
    pub operation: ComplianceOperation,
    pub product_type: ProductType,
    pub quantity: Option<i32>,
    /// Upper case certification codes
    pub certifications: Vec<String>,
    pub warehouse_status: WarehouseStatus,
    pub capacity: i32,
    pub units_on_hand: i64,
    pub supervisors_on_site: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub code: &'static str,
    pub regulation: &'static str,
    pub severity: Severity,
    pub compliant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub outcomes: Vec<RuleOutcome>,
    pub compliant: bool,
    pub risk_level: RiskLevel,
    pub next_review_at: DateTime<Utc>,
}

/// Stateless evaluator over [`REGULATIONS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegulationChecker;

impl RegulationChecker {
    pub fn applicable(
        &self,
        region: Region,
        operation: ComplianceOperation,
        product: ProductType,
    ) -> impl Iterator<Item = &'static Regulation> {
        REGULATIONS
            .iter()
            .filter(move |r| r.applies_to(region, operation, product))
    }

    fn satisfied(&self, requirement: Requirement, ctx: &CheckContext) -> bool {
        let quantity = ctx.quantity.unwrap_or(0);
        match requirement {
            Requirement::Certification(code) => ctx
                .certifications
                .iter()
                .any(|c| c.eq_ignore_ascii_case(code)),
            Requirement::MaxQuantity(limit) => quantity <= limit,
            Requirement::WithinCapacity => {
                let incoming = if ctx.operation == Receiving { i64::from(quantity) } else { 0 };
                ctx.units_on_hand + incoming <= i64::from(ctx.capacity)
            }
            Requirement::OperationalWarehouse => ctx.warehouse_status == WarehouseStatus::Active,
            Requirement::SupervisorOnSite => ctx.supervisors_on_site > 0,
        }
    }

    /// Evaluate every applicable rule. Risk is the highest violated severity,
    /// `LOW` when nothing is violated.
    pub fn assess(&self, ctx: &CheckContext, now: DateTime<Utc>) -> Assessment {
        let outcomes: Vec<RuleOutcome> = self
            .applicable(ctx.region, ctx.operation, ctx.product_type)
            .map(|rule| RuleOutcome {
                code: rule.code,
                regulation: rule.name,
                severity: rule.severity,
                compliant: self.satisfied(rule.requirement, ctx),
            })
            .collect();
        let risk_level = outcomes
            .iter()
            .filter(|o| !o.compliant)
            .map(|o| o.severity)
            .max()
            .unwrap_or(Severity::Low);
        Assessment {
            compliant: outcomes.iter().all(|o| o.compliant),
            outcomes,
            risk_level,
            next_review_at: now + risk_level.review_interval(),
        }
    }
}

fn rule_by_code(code: &str) -> Option<&'static Regulation> {
    REGULATIONS.iter().find(|r| r.code == code)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceCheckRequest {
    pub warehouse_id: Uuid,
    pub operation: ComplianceOperation,
    pub product_type: ProductType,
    /// Defaults to the caller
    pub supplier_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplianceHistoryFilter {
    pub warehouse_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub region: Option<Region>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViolationFilter {
    pub warehouse_id: Option<Uuid>,
    pub status: Option<ViolationStatus>,
    pub region: Option<Region>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceResult {
    #[serde(flatten)]
    pub check: compliance_check::Model,
    pub rules: Vec<RuleOutcome>,
    pub violations: Vec<compliance_violation::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceCheckDetails {
    #[serde(flatten)]
    pub check: compliance_check::Model,
    pub violations: Vec<compliance_violation::Model>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionComplianceSummary {
    pub region: Region,
    pub total_checks: usize,
    pub compliant_checks: usize,
    /// Percent of checks that passed, two decimal places
    pub compliance_rate: f64,
    pub open_violations: usize,
    pub open_by_severity: BTreeMap<String, usize>,
    pub overdue_reviews: usize,
    pub last_check_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ComplianceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    audit: Arc<AuditLogger>,
    checker: RegulationChecker,
}

impl ComplianceService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, audit: Arc<AuditLogger>) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
            checker: RegulationChecker,
        }
    }

    async fn warehouse(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        Warehouse::find_by_id(warehouse_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {} not found", warehouse_id)))
    }

    /// Evaluate the regulations for an operation at a warehouse and persist
    /// the check together with one violation row per failed rule.
    #[instrument(skip(self, actor, request), fields(actor = %actor.supplier_id, warehouse_id = %request.warehouse_id))]
    pub async fn run_check(
        &self,
        actor: &AuthUser,
        request: ComplianceCheckRequest,
    ) -> Result<ComplianceResult, ServiceError> {
        if matches!(request.quantity, Some(q) if q < 0) {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        let warehouse = self.warehouse(request.warehouse_id).await?;
        let region = warehouse.region()?;
        actor.require(COMPLIANCE_CHECK, Some(region))?;

        let db = self.db_pool.as_ref();
        let supplier_id = request.supplier_id.unwrap_or(actor.supplier_id);
        let supplier = Supplier::find_by_id(supplier_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supplier {} not found", supplier_id)))?;

        let units_on_hand: i64 = WarehouseInventory::find()
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse.id))
            .all(db)
            .await?
            .iter()
            .map(|i| i64::from(i.quantity))
            .sum();
        let supervisors_on_site = WarehouseStaff::find()
            .filter(warehouse_staff::Column::WarehouseId.eq(warehouse.id))
            .filter(warehouse_staff::Column::Active.eq(true))
            .filter(warehouse_staff::Column::Role.is_in([
                StaffRole::Manager.as_str(),
                StaffRole::Supervisor.as_str(),
            ]))
            .all(db)
            .await?
            .len();

        let context = CheckContext {
            region,
            operation: request.operation,
            product_type: request.product_type,
            quantity: request.quantity,
            certifications: supplier.certification_list(),
            warehouse_status: warehouse.status()?,
            capacity: warehouse.capacity,
            units_on_hand,
            supervisors_on_site,
        };
        let now = Utc::now();
        let assessment = self.checker.assess(&context, now);

        let check = compliance_check::ActiveModel {
            id: Set(Uuid::new_v4()),
            supplier_id: Set(supplier.id),
            warehouse_id: Set(warehouse.id),
            region: Set(region.as_str().to_string()),
            operation: Set(request.operation.as_str().to_string()),
            product_type: Set(request.product_type.as_str().to_string()),
            quantity: Set(request.quantity),
            compliant: Set(assessment.compliant),
            risk_level: Set(assessment.risk_level.as_str().to_string()),
            violation_count: Set(assessment.outcomes.iter().filter(|o| !o.compliant).count() as i32),
            next_review_at: Set(assessment.next_review_at),
            checked_by: Set(Some(actor.supplier_id)),
            created_at: Set(now),
        };
        let failed: Vec<&'static Regulation> = assessment
            .outcomes
            .iter()
            .filter(|o| !o.compliant)
            .filter_map(|o| rule_by_code(o.code))
            .collect();

        let txn = self.db_pool.begin().await?;
        let check = check.insert(&txn).await?;
        let mut violations = Vec::with_capacity(failed.len());
        for rule in failed {
            let violation = compliance_violation::ActiveModel {
                id: Set(Uuid::new_v4()),
                check_id: Set(check.id),
                supplier_id: Set(check.supplier_id),
                warehouse_id: Set(check.warehouse_id),
                region: Set(check.region.clone()),
                rule_code: Set(rule.code.to_string()),
                regulation: Set(rule.name.to_string()),
                severity: Set(rule.severity.as_str().to_string()),
                description: Set(rule.description.to_string()),
                remediation: Set(rule.remediation.to_string()),
                status: Set(ViolationStatus::Open.as_str().to_string()),
                resolved_by: Set(None),
                resolved_at: Set(None),
                resolution_notes: Set(None),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            violations.push(violation);
        }
        txn.commit().await?;

        counter!("flexvolt_compliance.checks", 1, "region" => region.as_str(), "risk" => assessment.risk_level.as_str());
        info!(
            check_id = %check.id,
            compliant = check.compliant,
            risk_level = %check.risk_level,
            violations = violations.len(),
            "compliance check recorded"
        );
        self.event_sender
            .send_or_log(Event::ComplianceChecked {
                check_id: check.id,
                warehouse_id: check.warehouse_id,
                compliant: check.compliant,
                risk_level: check.risk_level.clone(),
            })
            .await;
        let mut entry = AuditEntry::new("compliance.check", "compliance_check")
            .actor(actor.supplier_id)
            .resource(check.id)
            .region(region)
            .details(serde_json::json!({
                "operation": check.operation,
                "product_type": check.product_type,
                "risk_level": check.risk_level,
                "violations": violations.iter().map(|v| v.rule_code.as_str()).collect::<Vec<_>>(),
            }));
        if !check.compliant {
            entry = entry.failure();
        }
        self.audit.log(entry).await;

        Ok(ComplianceResult {
            check,
            rules: assessment.outcomes,
            violations,
        })
    }

    pub async fn get_check(
        &self,
        actor: &AuthUser,
        check_id: Uuid,
    ) -> Result<ComplianceCheckDetails, ServiceError> {
        let db = self.db_pool.as_ref();
        let check = ComplianceCheck::find_by_id(check_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("compliance check {} not found", check_id)))?;
        actor.require(
            COMPLIANCE_READ,
            Some(parse_column(&check.region, "compliance_checks.region")?),
        )?;
        let violations = ComplianceViolation::find()
            .filter(compliance_violation::Column::CheckId.eq(check_id))
            .all(db)
            .await?;
        Ok(ComplianceCheckDetails { check, violations })
    }

    /// Most recent checks first.
    pub async fn history(
        &self,
        actor: &AuthUser,
        filter: ComplianceHistoryFilter,
    ) -> Result<Vec<compliance_check::Model>, ServiceError> {
        actor.require(COMPLIANCE_READ, filter.region)?;
        let mut query = ComplianceCheck::find();
        if let Some(region) = filter.region {
            query = query.filter(compliance_check::Column::Region.eq(region.as_str()));
        } else if let Some(scope) = actor.region_scope() {
            query = query.filter(
                compliance_check::Column::Region
                    .is_in(scope.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(compliance_check::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(compliance_check::Column::SupplierId.eq(supplier_id));
        }
        Ok(query
            .order_by_desc(compliance_check::Column::CreatedAt)
            .limit(filter.limit.unwrap_or(50).min(500))
            .all(self.db_pool.as_ref())
            .await?)
    }

    pub async fn list_violations(
        &self,
        actor: &AuthUser,
        filter: ViolationFilter,
    ) -> Result<Vec<compliance_violation::Model>, ServiceError> {
        actor.require(COMPLIANCE_READ, filter.region)?;
        let mut query = ComplianceViolation::find();
        if let Some(region) = filter.region {
            query = query.filter(compliance_violation::Column::Region.eq(region.as_str()));
        } else if let Some(scope) = actor.region_scope() {
            query = query.filter(
                compliance_violation::Column::Region
                    .is_in(scope.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            );
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(compliance_violation::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(compliance_violation::Column::Status.eq(status.as_str()));
        }
        Ok(query
            .order_by_desc(compliance_violation::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self, actor, notes), fields(actor = %actor.supplier_id))]
    pub async fn resolve_violation(
        &self,
        actor: &AuthUser,
        violation_id: Uuid,
        notes: Option<String>,
    ) -> Result<compliance_violation::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let violation = ComplianceViolation::find_by_id(violation_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("violation {} not found", violation_id)))?;
        let region: Region = parse_column(&violation.region, "compliance_violations.region")?;
        actor.require(COMPLIANCE_RESOLVE, Some(region))?;
        if violation.status == ViolationStatus::Resolved.as_str() {
            return Err(ServiceError::Conflict(format!(
                "violation {} is already resolved",
                violation_id
            )));
        }

        let mut active: compliance_violation::ActiveModel = violation.into();
        active.status = Set(ViolationStatus::Resolved.as_str().to_string());
        active.resolved_by = Set(Some(actor.supplier_id));
        active.resolved_at = Set(Some(Utc::now()));
        active.resolution_notes = Set(notes);
        let violation = active.update(db).await?;

        self.audit
            .log(
                AuditEntry::new("compliance.resolve", "compliance_violation")
                    .actor(actor.supplier_id)
                    .resource(violation.id)
                    .region(region)
                    .details(serde_json::json!({ "rule_code": violation.rule_code })),
            )
            .await;
        Ok(violation)
    }

    /// Pass rate, open violations and overdue reviews for one region.
    pub async fn region_summary(
        &self,
        actor: &AuthUser,
        region: Region,
    ) -> Result<RegionComplianceSummary, ServiceError> {
        actor.require(COMPLIANCE_READ, Some(region))?;
        let db = self.db_pool.as_ref();
        let checks = ComplianceCheck::find()
            .filter(compliance_check::Column::Region.eq(region.as_str()))
            .order_by_desc(compliance_check::Column::CreatedAt)
            .all(db)
            .await?;
        let open = ComplianceViolation::find()
            .filter(compliance_violation::Column::Region.eq(region.as_str()))
            .filter(compliance_violation::Column::Status.eq(ViolationStatus::Open.as_str()))
            .all(db)
            .await?;

        let now = Utc::now();
        // Only the latest check per warehouse, operation and product is due for review.
        let mut latest: BTreeMap<(Uuid, &str, &str), &compliance_check::Model> = BTreeMap::new();
        for check in &checks {
            latest
                .entry((check.warehouse_id, check.operation.as_str(), check.product_type.as_str()))
                .or_insert(check);
        }
        let compliant_checks = checks.iter().filter(|c| c.compliant).count();
        let mut open_by_severity: BTreeMap<String, usize> =
            Severity::iter().map(|s| (s.to_string(), 0)).collect();
        for violation in &open {
            *open_by_severity.entry(violation.severity.clone()).or_default() += 1;
        }

        Ok(RegionComplianceSummary {
            region,
            total_checks: checks.len(),
            compliant_checks,
            compliance_rate: if checks.is_empty() {
                100.0
            } else {
                (compliant_checks as f64 / checks.len() as f64 * 10000.0).round() / 100.0
            },
            open_violations: open.len(),
            open_by_severity,
            overdue_reviews: latest.values().filter(|c| c.next_review_at < now).count(),
            last_check_at: checks.first().map(|c| c.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn context(region: Region, operation: ComplianceOperation, product: ProductType) -> CheckContext {
        CheckContext {
            region,
            operation,
            product_type: product,
            quantity: Some(100),
            certifications: vec![],
            warehouse_status: WarehouseStatus::Active,
            capacity: 10_000,
            units_on_hand: 1_000,
            supervisors_on_site: 1,
        }
    }

    #[test]
    fn rule_codes_are_unique() {
        let mut codes: Vec<_> = REGULATIONS.iter().map(|r| r.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), REGULATIONS.len());
    }

    #[test]
    fn every_region_has_its_own_rules() {
        for region in Region::iter() {
            assert!(
                REGULATIONS.iter().any(|r| r.region == Some(region)),
                "no rules for {}",
                region
            );
        }
    }

    #[test]
    fn uncertified_lithium_shipment_is_critical() {
        let now = Utc::now();
        let ctx = context(Region::UsWest, Shipping, LithiumIon);
        let assessment = RegulationChecker.assess(&ctx, now);

        assert!(!assessment.compliant);
        assert_eq!(assessment.risk_level, Severity::Critical);
        assert_eq!(assessment.next_review_at, now + Duration::days(1));
        assert!(assessment
            .outcomes
            .iter()
            .any(|o| o.code == "US-DOT-173.185" && !o.compliant));
    }

    #[test]
    fn certified_shipment_passes() {
        let now = Utc::now();
        let mut ctx = context(Region::UsWest, Shipping, LithiumIon);
        ctx.certifications = vec!["HAZMAT".to_string()];
        let assessment = RegulationChecker.assess(&ctx, now);

        assert!(assessment.compliant);
        assert_eq!(assessment.risk_level, Severity::Low);
        assert_eq!(assessment.next_review_at, now + Duration::days(90));
    }

    #[test]
    fn risk_is_highest_violated_severity() {
        let mut ctx = context(Region::Australia, Receiving, LithiumIon);
        ctx.quantity = Some(3_500);
        ctx.supervisors_on_site = 0;
        let assessment = RegulationChecker.assess(&ctx, Utc::now());

        let failed: Vec<_> = assessment.outcomes.iter().filter(|o| !o.compliant).collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(assessment.risk_level, Severity::High);
    }

    #[test]
    fn receiving_beyond_capacity_is_flagged() {
        let mut ctx = context(Region::Japan, Receiving, Accessory);
        ctx.quantity = Some(9_500);
        let assessment = RegulationChecker.assess(&ctx, Utc::now());
        assert!(assessment
            .outcomes
            .iter()
            .any(|o| o.code == "GEN-CAP-01" && !o.compliant));
        assert_eq!(assessment.risk_level, Severity::Medium);
    }

    #[test]
    fn inactive_warehouse_fails_every_operation() {
        let mut ctx = context(Region::EuGermany, Storage, Accessory);
        ctx.warehouse_status = WarehouseStatus::Maintenance;
        let assessment = RegulationChecker.assess(&ctx, Utc::now());
        assert_eq!(assessment.risk_level, Severity::High);
    }

    #[rstest]
    #[case(Severity::Low, 90)]
    #[case(Severity::Medium, 30)]
    #[case(Severity::High, 7)]
    #[case(Severity::Critical, 1)]
    fn review_offsets(#[case] risk: Severity, #[case] days: i64) {
        assert_eq!(risk.review_interval(), Duration::days(days));
    }
}
