use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::pipeline::{ErrorKind, ReportError};

#[derive(Error, Debug)]
pub enum AppError {
    /// Body rejected before a report run started.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{source}")]
    Report { id: Uuid, source: ReportError },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Report { source, .. } => source.kind(),
        }
    }
}

/// HTTP status and client-facing category per error kind.
pub fn status_and_category(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "fix_request"),
        ErrorKind::InvalidPrompt => (StatusCode::UNPROCESSABLE_ENTITY, "fix_request"),
        ErrorKind::RateLimit => (StatusCode::TOO_MANY_REQUESTS, "retry_later"),
        ErrorKind::Transient => (StatusCode::SERVICE_UNAVAILABLE, "retry_later"),
        ErrorKind::Auth | ErrorKind::MissingFont => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_misconfiguration",
        ),
        ErrorKind::Render => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        ErrorKind::Unknown => (StatusCode::BAD_GATEWAY, "upstream"),
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, category) = status_and_category(kind);

        // Server-side details stay in the logs.
        let message = match category {
            "server_misconfiguration" | "internal" => {
                tracing::error!(error.type = kind.as_str(), error = %self, "Report request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let mut body = json!({
            "error": message,
            "kind": kind.as_str(),
            "category": category,
            "status": status.as_u16(),
        });
        if let AppError::Report { id, .. } = &self {
            body["report_id"] = json!(id.to_string());
        }
        if let Some(trace_id) = get_trace_id() {
            body["trace_id"] = json!(trace_id);
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::Report { source, .. } = &self
            && let Some(retry_after) = source.retry_after()
        {
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
