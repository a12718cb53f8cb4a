use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{ApiError, GenerateRequest, GenerateResponse, Provider};
use crate::config::RetryPolicy;
use crate::telemetry::metrics::{
    GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_RETRY_COUNT, GEN_AI_TOKEN_USAGE,
};

pub struct LlmClient {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    request_timeout: Duration,
    max_prompt_bytes: usize,
}

impl LlmClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        retry: RetryPolicy,
        request_timeout: Duration,
        max_prompt_bytes: usize,
    ) -> Self {
        Self {
            provider,
            retry,
            request_timeout,
            max_prompt_bytes,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Rejects prompts the API would refuse, before anything goes on the wire.
    pub fn check_prompt(&self, req: &GenerateRequest) -> Result<(), ApiError> {
        if req.prompt.trim().is_empty() {
            return Err(ApiError::InvalidPrompt("prompt is empty".to_string()));
        }
        let len = req.payload_len();
        if len > self.max_prompt_bytes {
            return Err(ApiError::InvalidPrompt(format!(
                "prompt is {len} bytes, limit is {}",
                self.max_prompt_bytes
            )));
        }
        Ok(())
    }

    async fn generate_once(
        &self,
        req: &GenerateRequest,
        attempt: u32,
    ) -> Result<GenerateResponse, ApiError> {
        let provider_name = self.provider.name();
        let span_display_name = format!("gen_ai.chat {}", req.model);
        let start = Instant::now();

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %req.model,
            server.address = %self.provider.server_address(),
            gen_ai.request.temperature = req.temperature,
            gen_ai.request.max_tokens = req.max_tokens as i64,
            gen_ai.request.attempt = attempt + 1,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        {
            let mut user_event_attrs =
                vec![KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000))];
            if !req.system.is_empty() {
                user_event_attrs.push(KeyValue::new(
                    "gen_ai.system_instructions",
                    truncate(&req.system, 500),
                ));
            }
            span.add_event("gen_ai.user.message", user_event_attrs);
        }

        let call = self.provider.generate(req).instrument(span.clone());
        let result = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!(
                "deadline of {}s exceeded",
                self.request_timeout.as_secs_f64()
            ))),
        };

        let duration = start.elapsed().as_secs_f64();
        let op_kv = KeyValue::new("gen_ai.operation.name", "chat");
        let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name.to_string());
        let model_kv = KeyValue::new("gen_ai.request.model", req.model.clone());

        match result {
            Ok(resp) => {
                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(&resp.content, 2000),
                    )],
                );

                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.input_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "input"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.output_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "output"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_OPERATION_DURATION.record(duration, &[op_kv, provider_kv, model_kv]);

                Ok(resp)
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", err.kind());

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        provider_kv,
                        model_kv,
                        KeyValue::new("error.type", err.kind()),
                    ],
                );

                Err(err)
            }
        }
    }

    /// One logical generation call. Transient failures and rate limits are
    /// retried with exponential backoff; everything else returns at once.
    pub async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        self.check_prompt(req)?;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match self.generate_once(req, attempt).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::warn!(
                    provider = self.provider.name(),
                    model = %req.model,
                    error.type = err.kind(),
                    error = %err,
                    "LLM call failed, not retrying"
                );
                return Err(err);
            }

            if attempt + 1 >= max_attempts {
                tracing::error!(
                    attempts = attempt + 1,
                    provider = self.provider.name(),
                    model = %req.model,
                    error.type = err.kind(),
                    error = %err,
                    "LLM call failed, retries exhausted"
                );
                return Err(err);
            }

            let delay = self.retry_delay(attempt, err.retry_after());
            tracing::warn!(
                attempt = attempt + 1,
                max_attempts = max_attempts,
                provider = self.provider.name(),
                model = %req.model,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "LLM call failed, retrying"
            );

            GEN_AI_RETRY_COUNT.add(
                1,
                &[
                    KeyValue::new("gen_ai.provider.name", self.provider.name().to_string()),
                    KeyValue::new("gen_ai.request.model", req.model.clone()),
                    KeyValue::new("error.type", err.kind()),
                ],
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.retry.backoff(attempt);
        // 25% jitter to avoid thundering herd
        let jitter_ms = fastrand::u64(0..=base.as_millis() as u64 / 4);
        let delay = base + Duration::from_millis(jitter_ms);
        match retry_after {
            Some(hint) => delay.max(hint).min(self.retry.max_delay),
            None => delay.min(self.retry.max_delay),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, c)| i + c.len_utf8() <= max)
            .map(|(_, c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        script: Mutex<Vec<Result<GenerateResponse, ApiError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(mut script: Vec<Result<GenerateResponse, ApiError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        async fn generate(&self, _req: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ApiError::Transient("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl Provider for SlowProvider {
        async fn generate(&self, _req: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(ApiError::Unknown("unreachable".into()))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn client(provider: Arc<dyn Provider>, max_attempts: u32) -> LlmClient {
        LlmClient::new(provider, fast_policy(max_attempts), Duration::from_secs(5), 1_000)
    }

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "gemini-test".into(),
            system: "be brief".into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    fn ok(text: &str) -> Result<GenerateResponse, ApiError> {
        Ok(GenerateResponse {
            content: text.into(),
            model: "gemini-test".into(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: "stop".into(),
        })
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ApiError::Transient("503".into())),
            Err(ApiError::RateLimit {
                message: "429".into(),
                retry_after: Some(Duration::from_millis(2)),
            }),
            ok("done"),
        ]));
        let resp = client(provider.clone(), 3)
            .generate(&request("hi"))
            .await
            .unwrap();
        assert_eq!(resp.content, "done");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let err = client(provider.clone(), 4)
            .generate(&request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transient(_)));
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ApiError::Auth("401".into())),
            ok("never"),
        ]));
        let err = client(provider.clone(), 3)
            .generate(&request("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Auth("401".into()));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_prompt_fails_before_network() {
        let provider = Arc::new(ScriptedProvider::new(vec![ok("never")]));
        let err = client(provider.clone(), 3)
            .generate(&request(&"x".repeat(2_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPrompt(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let provider = Arc::new(ScriptedProvider::new(vec![ok("never")]));
        let err = client(provider.clone(), 3)
            .generate(&request("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPrompt(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_deadline_is_transient() {
        let llm = LlmClient::new(
            Arc::new(SlowProvider),
            fast_policy(2),
            Duration::from_millis(20),
            1_000,
        );
        let err = llm.generate(&request("hi")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transient(msg) if msg.contains("deadline")));
    }

    #[test]
    fn test_retry_delay_honours_retry_after_within_cap() {
        let llm = LlmClient::new(
            Arc::new(ScriptedProvider::new(vec![])),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(2),
            },
            Duration::from_secs(5),
            1_000,
        );
        assert_eq!(
            llm.retry_delay(0, Some(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
        assert_eq!(
            llm.retry_delay(0, Some(Duration::from_secs(60))),
            Duration::from_secs(2)
        );
        let plain = llm.retry_delay(1, None);
        assert!(plain >= Duration::from_millis(200) && plain <= Duration::from_millis(250));
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let result = truncate("hé世界!", 3);
        assert!(result.len() <= 3);
        assert_eq!(result, "hé");
    }
}
