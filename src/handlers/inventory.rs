use super::common::{created_response, success_response, Created};
use crate::{
    auth::AuthUser,
    entities::{inventory_alert, inventory_movement, inventory_transfer},
    services::inventory_dashboard::{
        AlertFilter, DashboardFilter, InventoryDashboard, InventoryItemView,
        InventoryUpdateResult, NewInventoryItem, TransferFilter, TransferRequest,
        UpdateInventoryRequest,
    },
    ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    pub limit: Option<u64>,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<DashboardFilter>,
) -> ApiResult<InventoryDashboard> {
    let dashboard = state.services.inventory.get_dashboard(&user, filter).await?;
    Ok(success_response(dashboard))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewInventoryItem>,
) -> Created<InventoryItemView> {
    let item = state
        .services
        .inventory
        .add_inventory_item(&user, payload)
        .await?;
    Ok(created_response(item))
}

pub async fn update_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateInventoryRequest>,
) -> ApiResult<InventoryUpdateResult> {
    let result = state
        .services
        .inventory
        .update_inventory(&user, payload)
        .await?;
    Ok(success_response(result))
}

pub async fn list_movements(
    State(state): State<AppState>,
    user: AuthUser,
    Path(warehouse_id): Path<Uuid>,
    Query(query): Query<MovementQuery>,
) -> ApiResult<Vec<inventory_movement::Model>> {
    let movements = state
        .services
        .inventory
        .list_movements(&user, warehouse_id, query.product_id, query.limit)
        .await?;
    Ok(success_response(movements))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TransferRequest>,
) -> Created<inventory_transfer::Model> {
    let transfer = state
        .services
        .inventory
        .transfer_inventory(&user, payload)
        .await?;
    Ok(created_response(transfer))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<TransferFilter>,
) -> ApiResult<Vec<inventory_transfer::Model>> {
    let transfers = state.services.inventory.list_transfers(&user, filter).await?;
    Ok(success_response(transfers))
}

pub async fn complete_transfer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory_transfer::Model> {
    let transfer = state.services.inventory.complete_transfer(&user, id).await?;
    Ok(success_response(transfer))
}

pub async fn cancel_transfer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory_transfer::Model> {
    let transfer = state.services.inventory.cancel_transfer(&user, id).await?;
    Ok(success_response(transfer))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<AlertFilter>,
) -> ApiResult<Vec<inventory_alert::Model>> {
    let alerts = state.services.inventory.list_alerts(&user, filter).await?;
    Ok(success_response(alerts))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory_alert::Model> {
    let alert = state.services.inventory.acknowledge_alert(&user, id).await?;
    Ok(success_response(alert))
}

