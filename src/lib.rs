//! FlexVolt operations backend
//!
//! Warehouse inventory, transfers, orders, supplier accounts, regional
//! compliance, analytics and audit logging behind one HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::{Extension, State},
    http::{HeaderValue, Method},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::permissions::consts as perm;
use crate::auth::AuthRouterExt;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig, event_sender: Arc<EventSender>) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config: Arc::new(config),
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn response_outside_a_request_has_no_request_id() {
        let response = ApiResponse::success(1);
        assert_eq!(response.meta.and_then(|m| m.request_id), None);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{analytics, audit, auth, compliance, inventory, orders, reports, warehouses};

    // Public account endpoints
    let auth_public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let auth_session = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/mfa/setup", post(auth::setup_mfa))
        .route("/auth/mfa/confirm", post(auth::confirm_mfa))
        .route("/auth/mfa/disable", post(auth::disable_mfa))
        .with_auth();

    let suppliers_admin = Router::new()
        .route("/suppliers", get(auth::list_suppliers))
        .route("/suppliers/:id/activate", post(auth::activate_supplier))
        .route("/suppliers/:id/suspend", post(auth::suspend_supplier))
        .with_permission(perm::SUPPLIERS_MANAGE);

    // Inventory routes with permission gating
    let inventory_read = Router::new()
        .route("/inventory/dashboard", get(inventory::get_dashboard))
        .route("/inventory/alerts", get(inventory::list_alerts))
        .route("/inventory/transfers", get(inventory::list_transfers))
        .route(
            "/warehouses/:id/movements",
            get(inventory::list_movements),
        )
        .with_permission(perm::INVENTORY_READ);

    let inventory_update = Router::new()
        .route("/inventory", put(inventory::update_inventory))
        .route("/inventory/items", post(inventory::add_item))
        .route(
            "/inventory/alerts/:id/acknowledge",
            post(inventory::acknowledge_alert),
        )
        .with_permission(perm::INVENTORY_UPDATE);

    let inventory_transfer = Router::new()
        .route("/inventory/transfers", post(inventory::create_transfer))
        .route(
            "/inventory/transfers/:id/complete",
            post(inventory::complete_transfer),
        )
        .route(
            "/inventory/transfers/:id/cancel",
            post(inventory::cancel_transfer),
        )
        .with_permission(perm::INVENTORY_TRANSFER);

    // Warehouse routes
    let warehouses_read = Router::new()
        .route("/warehouses", get(warehouses::list_warehouses))
        .route("/warehouses/:id", get(warehouses::get_warehouse))
        .route("/warehouses/:id/metrics", get(warehouses::warehouse_metrics))
        .route("/warehouses/:id/staff", get(warehouses::list_staff))
        .route("/warehouses/:id/operations", get(warehouses::list_operations))
        .route("/network/overview", get(warehouses::network_overview))
        .with_permission(perm::WAREHOUSES_READ);

    let warehouses_manage = Router::new()
        .route("/warehouses", post(warehouses::create_warehouse))
        .route("/warehouses/:id", put(warehouses::update_warehouse))
        .route("/warehouses/:id/status", put(warehouses::set_status))
        .route("/warehouses/:id/staff", post(warehouses::add_staff))
        .route(
            "/warehouses/:id/operations",
            post(warehouses::schedule_operation),
        )
        .route("/staff/:id/deactivate", post(warehouses::deactivate_staff))
        .route("/operations/:id/start", post(warehouses::start_operation))
        .route(
            "/operations/:id/complete",
            post(warehouses::complete_operation),
        )
        .route("/operations/:id/cancel", post(warehouses::cancel_operation))
        .with_permission(perm::WAREHOUSES_MANAGE);

    // Orders routes with permission gating
    let orders_read = Router::new()
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .with_permission(perm::ORDERS_READ);

    let orders_create = Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/quote", post(orders::quote))
        .with_permission(perm::ORDERS_CREATE);

    let orders_update = Router::new()
        .route("/orders/:id", put(orders::update_order))
        .route("/orders/:id/tracking", post(orders::add_tracking_event))
        .with_permission(perm::ORDERS_UPDATE);

    let orders_cancel = Router::new()
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .with_permission(perm::ORDERS_CANCEL);

    // Compliance
    let compliance_read = Router::new()
        .route("/compliance/checks", get(compliance::history))
        .route("/compliance/checks/:id", get(compliance::get_check))
        .route("/compliance/violations", get(compliance::list_violations))
        .route(
            "/compliance/regions/:region",
            get(compliance::region_summary),
        )
        .with_permission(perm::COMPLIANCE_READ);

    let compliance_check = Router::new()
        .route("/compliance/checks", post(compliance::run_check))
        .with_permission(perm::COMPLIANCE_CHECK);

    let compliance_resolve = Router::new()
        .route(
            "/compliance/violations/:id/resolve",
            post(compliance::resolve_violation),
        )
        .with_permission(perm::COMPLIANCE_RESOLVE);

    let analytics_routes = Router::new()
        .route("/analytics/inventory", get(analytics::inventory_metrics))
        .route("/analytics/orders", get(analytics::order_metrics))
        .route(
            "/analytics/performance",
            get(analytics::warehouse_performance),
        )
        .route("/analytics/forecast", get(analytics::demand_forecast))
        .route("/analytics/snapshot", get(analytics::snapshot))
        .route(
            "/analytics/reorder",
            get(analytics::reorder_recommendations),
        )
        .route(
            "/analytics/rebalance",
            get(analytics::rebalancing_suggestions),
        )
        .with_permission(perm::ANALYTICS_READ);

    let reports_routes = Router::new()
        .route("/reports", post(reports::generate_report))
        .with_permission(perm::REPORTS_GENERATE);

    let audit_routes = Router::new()
        .route("/audit", get(audit::query_audit_log))
        .with_permission(perm::AUDIT_READ);

    Router::new()
        .route("/status", get(api_status))
        .merge(auth_public)
        .merge(auth_session)
        .merge(suppliers_admin)
        .merge(inventory_read)
        .merge(inventory_update)
        .merge(inventory_transfer)
        .merge(warehouses_read)
        .merge(warehouses_manage)
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_cancel)
        .merge(compliance_read)
        .merge(compliance_check)
        .merge(compliance_resolve)
        .merge(analytics_routes)
        .merge(reports_routes)
        .merge(audit_routes)
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}

/// Full application router with the middleware stack installed.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/health", handlers::health::health_routes())
        .layer(Extension(state.services.auth.clone()))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(crate::tracing::RequestSpanMaker))
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flexvolt-ops",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!("flexvolt_http_requests_total", 1, "status" => status.as_u16().to_string());
    ::tracing::info!(
        method = %method,
        uri = %uri,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
