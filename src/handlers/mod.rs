pub mod analytics;
pub mod audit;
pub mod auth;
pub mod common;
pub mod compliance;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod reports;
pub mod warehouses;

use crate::{
    auth::{AuthConfig, AuthRateLimitConfig, AuthRateLimiter, AuthService},
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        analytics::AnalyticsEngine, audit::AuditLogger, compliance::ComplianceService,
        inventory_dashboard::InventoryDashboardService, optimization::OptimizationService,
        orders::OrderService, reports::ReportGenerator, warehouses::WarehouseService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<AuthRateLimiter>,
    pub audit: Arc<AuditLogger>,
    pub inventory: Arc<InventoryDashboardService>,
    pub warehouses: Arc<WarehouseService>,
    pub orders: Arc<OrderService>,
    pub compliance: Arc<ComplianceService>,
    pub analytics: Arc<AnalyticsEngine>,
    pub optimization: Arc<OptimizationService>,
    pub reports: Arc<ReportGenerator>,
}

impl AppServices {
    /// Wire every service against one pool, event channel and audit logger.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let audit = Arc::new(AuditLogger::new(
            db_pool.clone(),
            config.audit_batch_size,
            config.audit_flush_interval(),
        ));
        let rate_limiter = Arc::new(AuthRateLimiter::new(AuthRateLimitConfig::from(config)));
        let auth = Arc::new(AuthService::new(
            AuthConfig::from(config),
            db_pool.clone(),
            event_sender.clone(),
            audit.clone(),
            rate_limiter.clone(),
        ));
        let analytics = Arc::new(AnalyticsEngine::new(
            db_pool.clone(),
            config.analytics_cache_ttl(),
        ));

        Self {
            auth,
            rate_limiter,
            inventory: Arc::new(InventoryDashboardService::new(
                db_pool.clone(),
                event_sender.clone(),
                audit.clone(),
            )),
            warehouses: Arc::new(WarehouseService::new(
                db_pool.clone(),
                event_sender.clone(),
                audit.clone(),
            )),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                audit.clone(),
                config.pricing.clone(),
            )),
            compliance: Arc::new(ComplianceService::new(
                db_pool.clone(),
                event_sender,
                audit.clone(),
            )),
            optimization: Arc::new(OptimizationService::new(db_pool.clone(), analytics.clone())),
            reports: Arc::new(ReportGenerator::new(db_pool, audit.clone())),
            analytics,
            audit,
        }
    }
}
