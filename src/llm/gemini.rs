use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use super::{ApiError, GenerateRequest, GenerateResponse, Provider};

/// Finish reasons that mean the model refused the prompt.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Upper bound on any server-supplied retry hint.
const MAX_RETRY_HINT: Duration = Duration::from_secs(3600);

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    host: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let host = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            host,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| ApiError::Auth(format!("invalid API key header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(req.prompt.clone()),
                }],
            }],
            system_instruction: (!req.system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(req.system.clone()),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: req.temperature,
                max_output_tokens: req.max_tokens,
            },
        };

        tracing::debug!(
            model = %req.model,
            prompt_len = req.prompt.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint(&req.model))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_status(status, &text, retry_after));
        }

        let resp: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Unknown(format!("malformed Gemini response: {e}")))?;

        parse_response(resp, &req.model)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn server_address(&self) -> &str {
        &self.host
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() {
        ApiError::Transient(err.to_string())
    } else if err.is_decode() {
        ApiError::Unknown(err.to_string())
    } else {
        ApiError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str, retry_after: Option<Duration>) -> ApiError {
    let detail = serde_json::from_str::<GeminiErrorBody>(body).ok();
    let message = match &detail {
        Some(d) if !d.error.message.is_empty() => {
            format!("Gemini API error ({status}): {}", d.error.message)
        }
        _ => format!("Gemini API error ({status}): {}", body.trim()),
    };

    match status.as_u16() {
        401 | 403 => ApiError::Auth(message),
        400 if mentions_invalid_key(body) => ApiError::Auth(message),
        400 | 404 | 413 | 422 => ApiError::InvalidPrompt(message),
        429 => ApiError::RateLimit {
            message,
            retry_after: retry_after.or_else(|| detail.as_ref().and_then(retry_delay_detail)),
        },
        408 | 500 | 502 | 503 | 504 => ApiError::Transient(message),
        _ => ApiError::Unknown(message),
    }
}

fn mentions_invalid_key(body: &str) -> bool {
    body.contains("API_KEY_INVALID") || body.contains("API key not valid")
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_HINT))
}

/// `google.rpc.RetryInfo` detail, e.g. `"retryDelay": "17s"`.
fn retry_delay_detail(body: &GeminiErrorBody) -> Option<Duration> {
    body.error.details.iter().find_map(|d| {
        let delay = d.get("retryDelay")?.as_str()?;
        let secs: f64 = delay.strip_suffix('s')?.parse().ok()?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(secs.min(MAX_RETRY_HINT.as_secs_f64())).ok()
    })
}

fn parse_response(resp: GeminiResponse, requested_model: &str) -> Result<GenerateResponse, ApiError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ApiError::InvalidPrompt(format!("prompt blocked: {reason}")));
    }

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Unknown("response has no candidates".to_string()))?;

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    if BLOCKED_FINISH_REASONS.contains(&finish_reason.as_str()) {
        return Err(ApiError::InvalidPrompt(format!(
            "response blocked: {finish_reason}"
        )));
    }
    if finish_reason == "MAX_TOKENS" {
        return Err(ApiError::Unknown(
            "response truncated at max output tokens".to_string(),
        ));
    }

    let content = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if content.trim().is_empty() {
        return Err(ApiError::Unknown("response text is empty".to_string()));
    }

    let usage = resp.usage_metadata.unwrap_or_default();

    Ok(GenerateResponse {
        content,
        model: resp
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        finish_reason: finish_reason.to_lowercase(),
    })
}
