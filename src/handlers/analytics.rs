use super::common::success_response;
use crate::{
    auth::AuthUser,
    entities::types::Region,
    services::{
        analytics::{
            AnalyticsScope, AnalyticsSnapshot, DemandForecast, InventoryMetrics, OrderMetrics,
            WarehousePerformance,
        },
        optimization::{RebalanceSuggestion, ReorderRecommendation},
    },
    ApiResult, AppState,
};
use axum::extract::{Query, State};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_HORIZON_DAYS: i64 = 14;

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub region: Option<Region>,
    pub warehouse_id: Option<Uuid>,
    pub days: Option<i64>,
    pub horizon_days: Option<i64>,
}

impl ForecastQuery {
    fn split(self) -> (AnalyticsScope, i64) {
        let horizon = self.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS).clamp(1, 90);
        (
            AnalyticsScope {
                region: self.region,
                warehouse_id: self.warehouse_id,
                days: self.days,
            },
            horizon,
        )
    }
}

pub async fn inventory_metrics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<InventoryMetrics> {
    let metrics = state.services.analytics.inventory_metrics(&user, scope).await?;
    Ok(success_response(metrics))
}

pub async fn order_metrics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<OrderMetrics> {
    let metrics = state.services.analytics.order_metrics(&user, scope).await?;
    Ok(success_response(metrics))
}

pub async fn warehouse_performance(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<Vec<WarehousePerformance>> {
    let performance = state
        .services
        .analytics
        .warehouse_performance(&user, scope)
        .await?;
    Ok(success_response(performance))
}

pub async fn demand_forecast(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Vec<DemandForecast>> {
    let (scope, horizon) = query.split();
    let forecast = state
        .services
        .analytics
        .demand_forecast(&user, scope, horizon)
        .await?;
    Ok(success_response(forecast))
}

pub async fn snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<AnalyticsSnapshot> {
    let snapshot = state.services.analytics.snapshot(&user, &scope).await?;
    Ok(success_response(snapshot))
}

pub async fn reorder_recommendations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<Vec<ReorderRecommendation>> {
    let recommendations = state
        .services
        .optimization
        .reorder_recommendations(&user, scope)
        .await?;
    Ok(success_response(recommendations))
}

pub async fn rebalancing_suggestions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(scope): Query<AnalyticsScope>,
) -> ApiResult<Vec<RebalanceSuggestion>> {
    let suggestions = state
        .services
        .optimization
        .rebalancing_suggestions(&user, scope)
        .await?;
    Ok(success_response(suggestions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_horizon_defaults_and_clamps() {
        let (scope, horizon) = ForecastQuery::default().split();
        assert_eq!(horizon, DEFAULT_HORIZON_DAYS);
        assert_eq!(scope, AnalyticsScope::default());

        let (_, horizon) = ForecastQuery {
            horizon_days: Some(500),
            ..Default::default()
        }
        .split();
        assert_eq!(horizon, 90);
    }
}
