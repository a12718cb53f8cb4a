use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{ApiError, GenerateRequest, LlmClient};
use crate::render::{DocumentRenderer, RenderError, ReportDocument};
use crate::telemetry::metrics::{
    REPORT_GENERATION_DURATION, REPORT_OUTCOMES, REPORT_PAGES, REPORT_RENDER_DURATION,
};

use super::compose::compose;
use super::content::parse_generated;
use super::prompt::build_prompt;
use super::request::ReportRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Received,
    Generating,
    Rendering,
    Completed,
    Failed,
}

impl ReportState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportState::Received => "received",
            ReportState::Generating => "generating",
            ReportState::Rendering => "rendering",
            ReportState::Completed => "completed",
            ReportState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReportState::Completed | ReportState::Failed)
    }

    pub fn can_transition_to(self, next: ReportState) -> bool {
        use ReportState::*;
        matches!(
            (self, next),
            (Received, Generating)
                | (Received, Failed)
                | (Generating, Rendering)
                | (Generating, Failed)
                | (Rendering, Completed)
                | (Rendering, Failed)
        )
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("report cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: ReportState,
    pub to: ReportState,
}

/// Lifecycle of one request. Local to the request, never shared.
#[derive(Debug, Clone)]
pub struct ReportRun {
    id: Uuid,
    state: ReportState,
    history: Vec<ReportState>,
}

impl Default for ReportRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ReportState::Received,
            history: vec![ReportState::Received],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn history(&self) -> &[ReportState] {
        &self.history
    }

    pub fn advance(&mut self, next: ReportState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        tracing::info!(
            report.id = %self.id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Report state changed"
        );
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidPrompt,
    Auth,
    RateLimit,
    Transient,
    Unknown,
    MissingFont,
    Render,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::InvalidPrompt => "invalid_prompt",
            ErrorKind::Auth => "auth_error",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Transient => "transient",
            ErrorKind::Unknown => "unknown_error",
            ErrorKind::MissingFont => "missing_font",
            ErrorKind::Render => "render_error",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Validation(_) => ErrorKind::Validation,
            ReportError::Api(err) => match err {
                ApiError::InvalidPrompt(_) => ErrorKind::InvalidPrompt,
                ApiError::Auth(_) => ErrorKind::Auth,
                ApiError::RateLimit { .. } => ErrorKind::RateLimit,
                ApiError::Transient(_) => ErrorKind::Transient,
                ApiError::Unknown(_) => ErrorKind::Unknown,
            },
            ReportError::Render(RenderError::MissingFont(_)) => ErrorKind::MissingFont,
            ReportError::Render(_) => ErrorKind::Render,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ReportError::Api(err) => err.retry_after(),
            _ => None,
        }
    }
}

/// Terminal result of a run together with the states it went through.
#[derive(Debug)]
pub struct ReportOutcome {
    pub id: Uuid,
    pub history: Vec<ReportState>,
    pub result: Result<ReportDocument, ReportError>,
}

impl ReportOutcome {
    pub fn state(&self) -> ReportState {
        self.history
            .last()
            .copied()
            .unwrap_or(ReportState::Received)
    }
}

/// Per-deployment generation settings.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub footer: Vec<String>,
    /// Wall-clock limit for one run, generation and rendering included.
    pub deadline: Duration,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.gemini_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            footer: config.footer_lines.clone(),
            deadline: config.http_request_timeout,
        }
    }
}

pub struct ReportOrchestrator {
    llm: LlmClient,
    renderer: Arc<DocumentRenderer>,
    settings: ReportSettings,
}

impl ReportOrchestrator {
    pub fn new(llm: LlmClient, renderer: Arc<DocumentRenderer>, settings: ReportSettings) -> Self {
        Self {
            llm,
            renderer,
            settings,
        }
    }

    /// Drives one request to a terminal state. The outcome is produced once,
    /// and a failed generation never reaches the renderer.
    pub async fn run(&self, request: ReportRequest) -> ReportOutcome {
        let mut run = ReportRun::new();
        let start = Instant::now();

        let span = tracing::info_span!(
            "pipeline report",
            report.id = %run.id(),
            report.audience = request.audience.as_str(),
            report.interview = request.interview.is_some(),
            report.pages = tracing::field::Empty,
            report.duration_ms = tracing::field::Empty,
            error.type = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        );

        let deadline = self.settings.deadline;
        let finished = tokio::time::timeout(
            deadline,
            self.execute(&mut run, request).instrument(span.clone()),
        )
        .await;
        let result = finished.unwrap_or_else(|_| {
            Err(ReportError::Api(ApiError::Transient(format!(
                "report not finished within {:.1}s",
                deadline.as_secs_f64()
            ))))
        });

        let terminal = match &result {
            Ok(_) => ReportState::Completed,
            Err(_) => ReportState::Failed,
        };
        if let Err(err) = run.advance(terminal) {
            tracing::error!(report.id = %run.id(), error = %err, "Report ended in an unexpected state");
        }

        let duration = start.elapsed();
        span.record("report.duration_ms", duration.as_millis() as u64);
        let outcome_kv = KeyValue::new("report.outcome", terminal.as_str());
        match &result {
            Ok(document) => {
                span.record("report.pages", document.page_count as u64);
                span.record("otel.status_code", "OK");
                REPORT_PAGES.record(document.page_count as f64, &[outcome_kv.clone()]);
                REPORT_OUTCOMES.add(1, &[outcome_kv.clone()]);
                tracing::info!(
                    parent: &span,
                    report.id = %run.id(),
                    pages = document.page_count,
                    bytes = document.bytes.len(),
                    duration_ms = duration.as_millis() as u64,
                    "Report completed"
                );
            }
            Err(err) => {
                let kind = err.kind().as_str();
                span.record("error.type", kind);
                span.record("otel.status_code", "ERROR");
                REPORT_OUTCOMES.add(1, &[outcome_kv.clone(), KeyValue::new("error.type", kind)]);
                tracing::warn!(
                    parent: &span,
                    report.id = %run.id(),
                    error.type = kind,
                    error = %err,
                    "Report failed"
                );
            }
        }
        REPORT_GENERATION_DURATION.record(duration.as_secs_f64(), &[outcome_kv]);

        ReportOutcome {
            id: run.id(),
            history: run.history().to_vec(),
            result,
        }
    }

    async fn execute(
        &self,
        run: &mut ReportRun,
        request: ReportRequest,
    ) -> Result<ReportDocument, ReportError> {
        let request = request.validate().map_err(ReportError::Validation)?;
        advance(run, ReportState::Generating);

        let prompt = build_prompt(&request);
        let response = self
            .llm
            .generate(&GenerateRequest {
                model: self.settings.model.clone(),
                system: prompt.system,
                prompt: prompt.user,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .await?;
        advance(run, ReportState::Rendering);

        let generated = parse_generated(&response.content);
        let content = compose(&request, &generated, &self.settings.footer);
        tracing::debug!(
            sections = generated.sections.len(),
            blocks = content.blocks.len(),
            "Document composed"
        );

        let render_start = Instant::now();
        let renderer = Arc::clone(&self.renderer);
        let document = tokio::task::spawn_blocking(move || renderer.render(&content))
            .await
            .map_err(|err| RenderError::Layout(format!("render task failed: {err}")))??;
        REPORT_RENDER_DURATION.record(render_start.elapsed().as_secs_f64(), &[]);

        Ok(document)
    }
}

fn advance(run: &mut ReportRun, next: ReportState) {
    if let Err(err) = run.advance(next) {
        tracing::error!(report.id = %run.id(), error = %err, "Rejected report state change");
    }
}
