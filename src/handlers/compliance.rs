use super::common::{created_response, success_response, Created};
use crate::{
    auth::AuthUser,
    entities::{compliance_check, compliance_violation, types::Region},
    services::compliance::{
        ComplianceCheckDetails, ComplianceCheckRequest, ComplianceHistoryFilter,
        ComplianceResult, RegionComplianceSummary, ViolationFilter,
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
pub struct ResolveViolationRequest {
    pub notes: Option<String>,
}

pub async fn run_check(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ComplianceCheckRequest>,
) -> Created<ComplianceResult> {
    let result = state.services.compliance.run_check(&user, payload).await?;
    Ok(created_response(result))
}

pub async fn get_check(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ComplianceCheckDetails> {
    let details = state.services.compliance.get_check(&user, id).await?;
    Ok(success_response(details))
}

pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<ComplianceHistoryFilter>,
) -> ApiResult<Vec<compliance_check::Model>> {
    let checks = state.services.compliance.history(&user, filter).await?;
    Ok(success_response(checks))
}

pub async fn list_violations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<ViolationFilter>,
) -> ApiResult<Vec<compliance_violation::Model>> {
    let violations = state.services.compliance.list_violations(&user, filter).await?;
    Ok(success_response(violations))
}

pub async fn resolve_violation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveViolationRequest>>,
) -> ApiResult<compliance_violation::Model> {
    let notes = body.and_then(|Json(body)| body.notes);
    let violation = state
        .services
        .compliance
        .resolve_violation(&user, id, notes)
        .await?;
    Ok(success_response(violation))
}

pub async fn region_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Path(region): Path<Region>,
) -> ApiResult<RegionComplianceSummary> {
    let summary = state.services.compliance.region_summary(&user, region).await?;
    Ok(success_response(summary))
}
