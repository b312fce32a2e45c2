//! Account, session and MFA endpoints.

use super::common::{created_response, success_response, Created};
use crate::{
    auth::{
        AuthUser, ClientContext, LoginRequest, LoginResponse, MfaSetup, RegisterSupplierRequest,
        TokenPair,
    },
    entities::{
        supplier,
        types::{Region, SupplierRole, SupplierStatus},
    },
    ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct MfaCodeRequest {
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateSupplierRequest {
    pub role: Option<SupplierRole>,
    pub regions: Option<Vec<Region>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierListQuery {
    pub status: Option<SupplierStatus>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterSupplierRequest>,
) -> Created<supplier::Model> {
    let supplier = state.services.auth.register_supplier(payload).await?;
    Ok(created_response(supplier))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let context = ClientContext::from_headers(&headers);
    let response = state.services.auth.login(payload, context).await?;
    Ok(success_response(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let tokens = state.services.auth.refresh(&payload.refresh_token).await?;
    Ok(success_response(tokens))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    state.services.auth.logout(&user).await?;
    Ok(success_response(json!({ "session_id": user.session_id })))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    let supplier = state.services.auth.get_supplier(user.supplier_id).await?;
    Ok(success_response(json!({
        "supplier": supplier,
        "permissions": user.permissions,
        "session_id": user.session_id,
    })))
}

pub async fn setup_mfa(State(state): State<AppState>, user: AuthUser) -> ApiResult<MfaSetup> {
    let setup = state.services.auth.setup_mfa(&user).await?;
    Ok(success_response(setup))
}

pub async fn confirm_mfa(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MfaCodeRequest>,
) -> ApiResult<Value> {
    state.services.auth.confirm_mfa(&user, &payload.code).await?;
    Ok(success_response(json!({ "mfa_enabled": true })))
}

pub async fn disable_mfa(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MfaCodeRequest>,
) -> ApiResult<Value> {
    state.services.auth.disable_mfa(&user, &payload.code).await?;
    Ok(success_response(json!({ "mfa_enabled": false })))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SupplierListQuery>,
) -> ApiResult<Vec<supplier::Model>> {
    let suppliers = state.services.auth.list_suppliers(&user, query.status).await?;
    Ok(success_response(suppliers))
}

pub async fn activate_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivateSupplierRequest>,
) -> ApiResult<supplier::Model> {
    let supplier = state
        .services
        .auth
        .activate_supplier(&user, id, payload.role, payload.regions)
        .await?;
    Ok(success_response(supplier))
}

pub async fn suspend_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<supplier::Model> {
    let supplier = state.services.auth.suspend_supplier(&user, id).await?;
    Ok(success_response(supplier))
}
