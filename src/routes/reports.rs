use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::pipeline::ReportRequest;
use crate::render::ReportDocument;

pub const REPORT_ID_HEADER: HeaderName = HeaderName::from_static("x-report-id");
pub const REPORT_PAGES_HEADER: HeaderName = HeaderName::from_static("x-report-pages");

/// RFC 6266 `filename*` form, so non-ASCII names survive.
pub fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

pub async fn create_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let outcome = state.orchestrator.run(request).await;
    let id = outcome.id;
    let document = outcome
        .result
        .map_err(|source| AppError::Report { id, source })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, ReportDocument::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&document.file_name),
            ),
            (REPORT_ID_HEADER, id.to_string()),
            (REPORT_PAGES_HEADER, document.page_count.to_string()),
        ],
        document.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_encodes_unicode() {
        assert_eq!(
            content_disposition("Ayşe Yılmaz_Report.pdf"),
            "attachment; filename*=UTF-8''Ay%C5%9Fe%20Y%C4%B1lmaz_Report.pdf"
        );
    }

    #[test]
    fn test_request_body_deserialize() {
        let request: ReportRequest = serde_json::from_str(
            r#"{"subject": "Q3 sales", "parameters": {"region": "EMEA"}, "language": "German"}"#,
        )
        .unwrap();
        assert_eq!(request.subject, "Q3 sales");
        assert_eq!(request.parameters["region"], "EMEA");
        assert_eq!(request.language, "German");
    }
}
