mod common;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use common::{
    StubProvider, fast_retry, fonts, orchestrator, orchestrator_with, orchestrator_with_deadline,
    response,
};
use report_generator::llm::ApiError;
use report_generator::pipeline::{
    Audience, InterviewMetrics, ReportRequest, ReportState::*,
};
use report_generator::render::RenderError;

fn interview_request(audience: Audience) -> ReportRequest {
    let metrics: InterviewMetrics = serde_json::from_value(serde_json::json!({
        "score": 81.2,
        "average_score": 74.0,
        "emotions": {
            "happy": {"value": 35.5, "average": 30.0},
            "angry": {"value": 2.0, "average": 3.5},
            "disgusted": {"value": 1.0, "average": 1.2},
            "afraid": {"value": 4.25, "average": 5.0},
            "sad": {"value": 6.0, "average": 8.0},
            "surprised": {"value": 11.0, "average": 9.0},
            "neutral": {"value": 40.25, "average": 43.3}
        },
        "attention": {
            "off_screen_seconds": 12.5,
            "off_screen_count": 4,
            "average_off_screen_seconds": 18.0,
            "average_off_screen_count": 6.0
        },
        "questions": [
            {"question": "Tell us about a hard bug.", "answer": "A race in the cache layer."},
            {"question": "Why this role?", "answer": "I like distributed systems."}
        ]
    }))
    .unwrap();
    ReportRequest {
        subject: "Ayşe Yılmaz".into(),
        title: Some("Backend Engineer".into()),
        audience,
        language: "English".into(),
        parameters: BTreeMap::new(),
        interview: Some(metrics),
    }
}

const INTERVIEW_REPLY: &str = r#"```json
{"title": "Interview Assessment", "sections": [
  {"key": "overview", "heading": "General Overview", "body": "The candidate answered clearly.\n\nCommunication was structured."},
  {"key": "emotions", "heading": "Emotion Analysis", "body": "The candidate emotions were analysed from video and audio. Neutral dominated."},
  {"key": "attention", "heading": "Attention Analysis", "body": "Off-screen time was below average."},
  {"key": "evaluation", "heading": "General Evaluation", "body": "Strong technical depth."},
  {"key": "conclusions", "heading": "Conclusions and Recommendations", "body": "Proceed to the next round."},
  {"key": "suitability", "heading": "Position Suitability Assessment", "body": "The score is above average."}
]}
```"#;

#[tokio::test]
async fn test_plain_request_renders_one_page() {
    let provider = StubProvider::reply("Q3 sales rose 4%.");
    let outcome = orchestrator(provider.clone())
        .run(ReportRequest::new("Q3 sales"))
        .await;

    assert_eq!(outcome.history, [Received, Generating, Rendering, Completed]);
    assert_eq!(outcome.state(), Completed);
    let document = outcome.result.unwrap();
    assert_eq!(document.page_count, 1);
    assert!(document.bytes.starts_with(b"%PDF-"));
    assert_eq!(document.file_name, "Q3 sales_Report.pdf");
    assert_eq!(provider.calls(), 1);
    assert!(provider.prompts()[0].contains("- Subject: Q3 sales"));
}

#[tokio::test]
async fn test_auth_failure_never_renders() {
    let provider = StubProvider::failing(ApiError::Auth("API key not valid".into()));
    let outcome = orchestrator(provider.clone())
        .run(ReportRequest::new("Q3 sales"))
        .await;

    assert_eq!(outcome.history, [Received, Generating, Failed]);
    assert!(!outcome.history.contains(&Rendering));
    assert_eq!(outcome.result.unwrap_err().kind().as_str(), "auth_error");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_transient_failures_stop_at_max_attempts() {
    let provider = StubProvider::failing(ApiError::Transient("503 overloaded".into()));
    let outcome = orchestrator(provider.clone())
        .run(ReportRequest::new("Q3 sales"))
        .await;

    assert_eq!(outcome.state(), Failed);
    assert_eq!(outcome.result.unwrap_err().kind().as_str(), "transient");
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_rate_limit_then_success_completes() {
    let provider = StubProvider::script(vec![
        Err(ApiError::RateLimit {
            message: "quota".into(),
            retry_after: None,
        }),
        Err(ApiError::Transient("connection reset".into())),
        Ok(response("Recovered on the third attempt.")),
    ]);
    let outcome = orchestrator(provider.clone())
        .run(ReportRequest::new("Q3 sales"))
        .await;

    assert_eq!(outcome.state(), Completed);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_invalid_request_fails_before_generation() {
    let provider = StubProvider::reply("unused");
    let outcome = orchestrator(provider.clone())
        .run(ReportRequest::new("   "))
        .await;

    assert_eq!(outcome.history, [Received, Failed]);
    assert_eq!(
        outcome.result.unwrap_err().kind().as_str(),
        "validation_error"
    );
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_missing_font_fails_after_generation() {
    let provider = StubProvider::reply("Q3 sales rose 4%.");
    let outcome = orchestrator_with(provider.clone(), fonts(), "Nope-Regular", fast_retry(3))
        .run(ReportRequest::new("Q3 sales"))
        .await;

    assert_eq!(outcome.history, [Received, Generating, Rendering, Failed]);
    match outcome.result.unwrap_err() {
        report_generator::pipeline::ReportError::Render(RenderError::MissingFont(name)) => {
            assert_eq!(name, "Nope-Regular")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_identical_runs_give_identical_bytes() {
    let orchestrator = orchestrator(StubProvider::reply(INTERVIEW_REPLY));
    let first = orchestrator
        .run(interview_request(Audience::Candidate))
        .await;
    let second = orchestrator
        .run(interview_request(Audience::Candidate))
        .await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.result.unwrap().bytes, second.result.unwrap().bytes);
}

#[tokio::test]
async fn test_candidate_interview_report() {
    let provider = StubProvider::reply(INTERVIEW_REPLY);
    let outcome = orchestrator(provider.clone())
        .run(interview_request(Audience::Candidate))
        .await;

    let document = outcome.result.unwrap();
    assert!(document.page_count >= 1);
    assert_eq!(document.file_name, "Ayşe Yılmaz_Backend Engineer_Report.pdf");
    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("Suitability score: 81.2"));
    assert!(prompt.contains("Happy 35.5 (average 30)"));
    assert!(prompt.contains("Question 2: Why this role?"));
}

#[tokio::test]
async fn test_customer_prompt_has_no_suitability() {
    let provider = StubProvider::reply(INTERVIEW_REPLY);
    let outcome = orchestrator(provider.clone())
        .run(interview_request(Audience::Customer))
        .await;

    assert_eq!(outcome.state(), Completed);
    assert!(!provider.prompts()[0].contains("Suitability score"));
}

#[tokio::test]
async fn test_long_reply_paginates() {
    let paragraph = "Revenue grew across every region while costs stayed flat. ".repeat(40);
    let reply = (0..12)
        .map(|_| paragraph.clone())
        .collect::<Vec<_>>()
        .join("\n\n");
    let outcome = orchestrator(StubProvider::reply(&reply))
        .run(ReportRequest::new("Q3 sales"))
        .await;

    let document = outcome.result.unwrap();
    assert!(document.page_count > 1, "got {} pages", document.page_count);
    let pages = document
        .bytes
        .windows(b"/Type /Page\n".len())
        .filter(|w| *w == b"/Type /Page\n")
        .count();
    assert_eq!(pages, document.page_count);
}

#[tokio::test]
async fn test_slow_generation_fails_at_deadline() {
    let provider = StubProvider::slow("Q3 sales rose 4%.", Duration::from_secs(3));
    let orchestrator = orchestrator_with_deadline(
        provider.clone(),
        fonts(),
        "Serif-Regular",
        fast_retry(1),
        Duration::from_millis(200),
    );

    let start = Instant::now();
    let outcome = orchestrator.run(ReportRequest::new("Q3 sales")).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.history, [Received, Generating, Failed]);
    let err = outcome.result.unwrap_err();
    assert_eq!(err.kind().as_str(), "transient");
    assert!(err.to_string().contains("0.2s"), "{err}");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_turkish_request_renders() {
    let mut request = interview_request(Audience::Candidate);
    request.language = "Turkish".into();
    let outcome = orchestrator(StubProvider::reply(INTERVIEW_REPLY))
        .run(request)
        .await;

    assert_eq!(outcome.state(), Completed);
    assert!(outcome.result.unwrap().bytes.starts_with(b"%PDF-"));
}
