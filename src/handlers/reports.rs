use crate::{
    auth::AuthUser,
    entities::types::ReportFormat,
    errors::ServiceError,
    services::reports::ReportRequest,
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// JSON reports come back in the usual envelope; CSV reports as a download.
pub async fn generate_report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReportRequest>,
) -> Result<Response, ServiceError> {
    let report = state.services.reports.generate(&user, payload).await?;

    match report.format {
        ReportFormat::Json => Ok((StatusCode::OK, Json(ApiResponse::success(report))).into_response()),
        ReportFormat::Csv => {
            let (body, content_type) = report.render()?;
            let disposition = format!(
                "attachment; filename=\"{}-{}.csv\"",
                report.report_type.as_str().to_lowercase(),
                report.generated_at.format("%Y%m%d%H%M%S")
            );
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
    }
}
