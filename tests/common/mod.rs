#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use report_generator::config::RetryPolicy;
use report_generator::llm::{ApiError, GenerateRequest, GenerateResponse, LlmClient, Provider};
use report_generator::pipeline::{ReportOrchestrator, ReportSettings};
use report_generator::render::{DocumentRenderer, FontStore, Typography};
use tempfile::TempDir;

const SERIF: &[u8] = include_bytes!("../../fonts/DejaVuSerif.ttf");
const SANS_BOLD: &[u8] = include_bytes!("../../fonts/DejaVuSans-Bold.ttf");

/// Replays scripted replies in order; the last one repeats forever.
pub struct StubProvider {
    replies: Mutex<Vec<Result<GenerateResponse, ApiError>>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl StubProvider {
    pub fn script(replies: Vec<Result<GenerateResponse, ApiError>>) -> Arc<Self> {
        assert!(!replies.is_empty());
        Arc::new(Self {
            replies: Mutex::new(replies),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        })
    }

    /// Answers with `text` after sleeping for `delay` on every call.
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(vec![Ok(response(text))]),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn reply(text: &str) -> Arc<Self> {
        Self::script(vec![Ok(response(text))])
    }

    pub fn failing(err: ApiError) -> Arc<Self> {
        Self::script(vec![Err(err)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies[0].clone()
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub fn response(text: &str) -> GenerateResponse {
    GenerateResponse {
        content: text.to_string(),
        model: "gemini-test".to_string(),
        input_tokens: 12,
        output_tokens: 34,
        finish_reason: "stop".to_string(),
    }
}

/// Font directory with a serif body face and a bold sans heading face.
pub fn font_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_font(dir.path(), "Serif-Regular.ttf", SERIF);
    write_font(dir.path(), "Sans-Bold.ttf", SANS_BOLD);
    dir
}

fn write_font(dir: &Path, name: &str, data: &[u8]) {
    std::fs::write(dir.join(name), data).unwrap();
}

pub fn fonts() -> Arc<FontStore> {
    let dir = font_dir();
    Arc::new(FontStore::load_dir(dir.path()).unwrap())
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub fn orchestrator_with(
    provider: Arc<StubProvider>,
    fonts: Arc<FontStore>,
    body_font: &str,
    retry: RetryPolicy,
) -> ReportOrchestrator {
    orchestrator_with_deadline(provider, fonts, body_font, retry, Duration::from_secs(30))
}

pub fn orchestrator_with_deadline(
    provider: Arc<StubProvider>,
    fonts: Arc<FontStore>,
    body_font: &str,
    retry: RetryPolicy,
    deadline: Duration,
) -> ReportOrchestrator {
    let llm = LlmClient::new(provider, retry, Duration::from_secs(5), 200_000);
    let renderer = Arc::new(DocumentRenderer::new(
        fonts,
        Typography {
            body: body_font.to_string(),
            heading: "Sans-Bold".to_string(),
        },
    ));
    ReportOrchestrator::new(
        llm,
        renderer,
        ReportSettings {
            model: "gemini-test".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            footer: vec![
                "Acme Interview Analytics".to_string(),
                "info@acme.test".to_string(),
            ],
            deadline,
        },
    )
}

pub fn orchestrator(provider: Arc<StubProvider>) -> ReportOrchestrator {
    orchestrator_with(provider, fonts(), "Serif-Regular", fast_retry(3))
}
