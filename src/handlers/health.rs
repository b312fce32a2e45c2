use crate::handlers::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    Degraded,
}

/// Individual component health details
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub audit_log: ComponentHealth,
    pub analytics_cache: ComponentHealth,
}

/// Full health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub details: HealthDetails,
    pub response_time_ms: u128,
}

/// Audit entries waiting for a flush before the logger counts as degraded
const AUDIT_BACKLOG_WARN: usize = 1_000;

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Record the process start for uptime reporting
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Critical components decide Up/Down; the rest can only degrade.
pub fn overall_status(database: ComponentStatus, optional: &[ComponentStatus]) -> ComponentStatus {
    if database == ComponentStatus::Down {
        ComponentStatus::Down
    } else if optional.iter().any(|s| *s != ComponentStatus::Up) {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Up
    }
}

async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let db_latency = start.elapsed().as_millis() as u64;

    match db_result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "database": { "status": "up", "latency_ms": db_latency } },
                "response_time_ms": start.elapsed().as_millis()
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { "database": { "status": "down", "error": e.to_string() } },
                "response_time_ms": start.elapsed().as_millis()
            })),
        ),
    }
}

async fn detailed_health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let db_result = crate::db::check_connection(&state.db).await;
    let database = ComponentHealth {
        status: if db_result.is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        message: db_result.map_or_else(
            |e| format!("Connection failed: {}", e),
            |_| "Connection successful".to_string(),
        ),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let pending = state.services.audit.pending().await;
    let audit_log = ComponentHealth {
        status: if pending < AUDIT_BACKLOG_WARN {
            ComponentStatus::Up
        } else {
            ComponentStatus::Degraded
        },
        message: format!("{} entries buffered", pending),
        latency_ms: None,
    };

    let analytics_cache = ComponentHealth {
        status: ComponentStatus::Up,
        message: format!("{} cached results", state.services.analytics.cache().len()),
        latency_ms: None,
    };

    let status = overall_status(database.status, &[audit_log.status, analytics_cache.status]);
    let code = if status == ComponentStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        details: HealthDetails {
            database,
            audit_log,
            analytics_cache,
        },
        response_time_ms: start.elapsed().as_millis(),
    };

    (code, Json(response))
}

/// Endpoints:
/// - GET /health          - Liveness probe
/// - GET /health/ready    - Readiness probe (database connectivity)
/// - GET /health/detailed - Component statuses
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check))
        .route("/detailed", get(detailed_health_check))
}
