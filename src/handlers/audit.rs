use super::common::success_response;
use crate::{
    auth::{AuthUser, AUDIT_READ},
    entities::audit_log,
    services::audit::AuditQuery,
    ApiResult, AppState,
};
use axum::extract::{Query, State};

/// Pending entries are flushed first so the result includes them.
pub async fn query_audit_log(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<AuditQuery>,
) -> ApiResult<Vec<audit_log::Model>> {
    user.require(AUDIT_READ, None)?;
    state.services.audit.flush().await?;
    let entries = state.services.audit.query(filter).await?;
    Ok(success_response(entries))
}
