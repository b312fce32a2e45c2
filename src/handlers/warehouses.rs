use super::common::{created_response, success_response, Created};
use crate::{
    auth::AuthUser,
    entities::{
        types::{OperationStatus, WarehouseStatus},
        warehouse, warehouse_operation, warehouse_staff,
    },
    services::warehouses::{
        CreateWarehouseRequest, NewStaffMember, RegionOverview, ScheduleOperationRequest,
        UpdateWarehouseRequest, WarehouseFilter, WarehouseMetrics,
    },
    ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: WarehouseStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OperationQuery {
    pub status: Option<OperationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteOperationRequest {
    pub items_processed: i32,
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<WarehouseFilter>,
) -> ApiResult<Vec<warehouse::Model>> {
    let warehouses = state.services.warehouses.list_warehouses(&user, filter).await?;
    Ok(success_response(warehouses))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<warehouse::Model> {
    let warehouse = state.services.warehouses.get_warehouse(&user, id).await?;
    Ok(success_response(warehouse))
}

pub async fn create_warehouse(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateWarehouseRequest>,
) -> Created<warehouse::Model> {
    let warehouse = state
        .services
        .warehouses
        .create_warehouse(&user, payload)
        .await?;
    Ok(created_response(warehouse))
}

pub async fn update_warehouse(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWarehouseRequest>,
) -> ApiResult<warehouse::Model> {
    let warehouse = state
        .services
        .warehouses
        .update_warehouse(&user, id, payload)
        .await?;
    Ok(success_response(warehouse))
}

pub async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> ApiResult<warehouse::Model> {
    let warehouse = state
        .services
        .warehouses
        .set_status(&user, id, payload.status)
        .await?;
    Ok(success_response(warehouse))
}

pub async fn warehouse_metrics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseMetrics> {
    let metrics = state.services.warehouses.warehouse_metrics(&user, id).await?;
    Ok(success_response(metrics))
}

pub async fn network_overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<RegionOverview>> {
    let overview = state.services.warehouses.network_overview(&user).await?;
    Ok(success_response(overview))
}

pub async fn list_staff(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<StaffQuery>,
) -> ApiResult<Vec<warehouse_staff::Model>> {
    let staff = state
        .services
        .warehouses
        .list_staff(&user, id, query.include_inactive)
        .await?;
    Ok(success_response(staff))
}

pub async fn add_staff(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewStaffMember>,
) -> Created<warehouse_staff::Model> {
    let member = state.services.warehouses.add_staff(&user, id, payload).await?;
    Ok(created_response(member))
}

pub async fn deactivate_staff(
    State(state): State<AppState>,
    user: AuthUser,
    Path(staff_id): Path<Uuid>,
) -> ApiResult<warehouse_staff::Model> {
    let member = state
        .services
        .warehouses
        .deactivate_staff(&user, staff_id)
        .await?;
    Ok(success_response(member))
}

pub async fn list_operations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<OperationQuery>,
) -> ApiResult<Vec<warehouse_operation::Model>> {
    let operations = state
        .services
        .warehouses
        .list_operations(&user, id, query.status)
        .await?;
    Ok(success_response(operations))
}

pub async fn schedule_operation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleOperationRequest>,
) -> Created<warehouse_operation::Model> {
    let operation = state
        .services
        .warehouses
        .schedule_operation(&user, id, payload)
        .await?;
    Ok(created_response(operation))
}

pub async fn start_operation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(operation_id): Path<Uuid>,
) -> ApiResult<warehouse_operation::Model> {
    let operation = state
        .services
        .warehouses
        .start_operation(&user, operation_id)
        .await?;
    Ok(success_response(operation))
}

pub async fn complete_operation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(operation_id): Path<Uuid>,
    Json(payload): Json<CompleteOperationRequest>,
) -> ApiResult<warehouse_operation::Model> {
    let operation = state
        .services
        .warehouses
        .complete_operation(&user, operation_id, payload.items_processed)
        .await?;
    Ok(success_response(operation))
}

pub async fn cancel_operation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(operation_id): Path<Uuid>,
) -> ApiResult<warehouse_operation::Model> {
    let operation = state
        .services
        .warehouses
        .cancel_operation(&user, operation_id)
        .await?;
    Ok(success_response(operation))
}
