use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub fonts_dir: PathBuf,
    pub body_font: String,
    pub heading_font: String,
    pub footer_lines: Vec<String>,
    pub logo_path: Option<PathBuf>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_prompt_bytes: usize,
    pub http_request_timeout: Duration,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

/// Bounds for retrying one logical generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following `attempt` (zero based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Longest a full retry sequence can take when every attempt runs
    /// into `attempt_timeout`.
    pub fn budget(&self, attempt_timeout: Duration) -> Duration {
        attempt_timeout
            .saturating_mul(self.max_attempts)
            .saturating_add(self.max_delay.saturating_mul(self.max_attempts.saturating_sub(1)))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let footer_lines = env::var("REPORT_FOOTER")
            .map(|raw| split_footer(&raw))
            .unwrap_or_default();

        let retry = RetryPolicy {
            max_attempts: parse_var("LLM_MAX_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(parse_var("LLM_RETRY_BASE_MS", 1_000)?),
            max_delay: Duration::from_millis(parse_var("LLM_RETRY_MAX_MS", 10_000)?),
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "LLM_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let request_timeout = Duration::from_secs(parse_var("LLM_REQUEST_TIMEOUT_SECS", 60)?);
        let http_request_timeout =
            Duration::from_secs(parse_var("HTTP_REQUEST_TIMEOUT_SECS", 300)?);
        check_deadline(http_request_timeout, request_timeout, &retry)?;

        Ok(Self {
            port: parse_var("APP_PORT", 8000)?,
            environment: env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
            fonts_dir: env::var("FONTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("fonts")),
            body_font: env::var("REPORT_BODY_FONT").unwrap_or_else(|_| "DejaVuSans".to_string()),
            heading_font: env::var("REPORT_HEADING_FONT")
                .unwrap_or_else(|_| "DejaVuSans-Bold".to_string()),
            footer_lines,
            logo_path: env::var("REPORT_LOGO_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            temperature: parse_var("LLM_TEMPERATURE", 0.7)?,
            max_output_tokens: parse_var("LLM_MAX_OUTPUT_TOKENS", 8192)?,
            retry,
            request_timeout,
            max_prompt_bytes: parse_var("LLM_MAX_PROMPT_BYTES", 200_000)?,
            http_request_timeout,
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "interview-report-generator".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// The report deadline must leave room for every generation attempt,
/// otherwise retries would be cut off by the deadline.
fn check_deadline(
    deadline: Duration,
    attempt_timeout: Duration,
    retry: &RetryPolicy,
) -> Result<(), ConfigError> {
    if deadline < retry.budget(attempt_timeout) {
        return Err(ConfigError::Invalid {
            name: "HTTP_REQUEST_TIMEOUT_SECS",
            value: format!(
                "{} (retries need up to {}s)",
                deadline.as_secs(),
                retry.budget(attempt_timeout).as_secs()
            ),
        });
    }
    Ok(())
}

/// Footer lines are separated by `|` so they fit in a single env var.
fn split_footer(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
