use std::fmt::Write;

use super::request::{Audience, InterviewMetrics, ReportRequest};

/// Section keys requested for interview reports, in document order.
pub const INTERVIEW_SECTIONS: &[(&str, &str)] = &[
    (
        "overview",
        "A detailed introduction of at least two paragraphs summarising overall performance, \
         communication skills and how the interview went.",
    ),
    (
        "emotions",
        "Interpret the emotion percentages above: which emotions dominate and what that may \
         mean in this context. At least two detailed paragraphs.",
    ),
    (
        "attention",
        "Interpret the off-screen time and glance count against the averages and what they \
         suggest about attention and focus. At least one detailed paragraph.",
    ),
    (
        "evaluation",
        "A comprehensive evaluation combining the answers, overall attitude and the analysis \
         results, naming strengths and areas for improvement. At least three paragraphs.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
}

/// Builds the prompt for a validated request. The output depends only on
/// the request, so equal requests give byte-identical prompts.
pub fn build_prompt(request: &ReportRequest) -> GenerationPrompt {
    let system = format!(
        "You write formal reports. Write all text only in {}. \
         Keep the tone professional, formal and data-driven. \
         Do not add notes, explanations or meta-commentary addressed to the user. \
         Reply with a single JSON object and nothing else.",
        request.language
    );

    let mut user = String::new();
    match &request.interview {
        Some(metrics) => interview_prompt(&mut user, request, metrics),
        None => general_prompt(&mut user, request),
    }

    GenerationPrompt { system, user }
}

fn subject_lines(out: &mut String, request: &ReportRequest, subject_label: &str, title_label: &str) {
    let _ = writeln!(out, "- {subject_label}: {}", request.subject);
    if let Some(title) = &request.title {
        let _ = writeln!(out, "- {title_label}: {title}");
    }
    for (key, value) in &request.parameters {
        let _ = writeln!(out, "- {key}: {value}");
    }
}

/// Appends the reply format. Without keys the model picks its own sections.
fn json_shape(out: &mut String, keys: &[&str]) {
    const ENTRY: &str =
        "\"heading\": \"Section heading\", \"body\": \"Paragraphs separated by blank lines\"";
    let entries: Vec<String> = if keys.is_empty() {
        vec![format!("    {{{ENTRY}}}")]
    } else {
        keys.iter()
            .map(|key| format!("    {{\"key\": \"{key}\", {ENTRY}}}"))
            .collect()
    };

    out.push_str("\nReturn JSON with exactly this structure:\n");
    out.push_str("{\n  \"title\": \"Report title\",\n  \"sections\": [\n");
    out.push_str(&entries.join(",\n"));
    out.push_str("\n  ]\n}\n");
    out.push_str("Use plain text in every body, without markdown or HTML.\n");
}

fn general_prompt(out: &mut String, request: &ReportRequest) {
    out.push_str("Write a structured report from the following inputs.\n\nInputs:\n");
    subject_lines(out, request, "Subject", "Title");
    out.push_str(
        "\nInclude 3-5 sections covering the subject. Each section needs a heading and a body.",
    );
    json_shape(out, &[]);
}

fn interview_prompt(out: &mut String, request: &ReportRequest, metrics: &InterviewMetrics) {
    let (person, meeting) = match request.audience {
        Audience::Candidate => ("Candidate", "Interview"),
        Audience::Customer => ("Customer", "Meeting"),
    };

    out.push_str("Write an interview assessment report from the following data.\n\nData:\n");
    subject_lines(out, request, &format!("{person} name"), &format!("{meeting} name"));

    if request.audience == Audience::Candidate {
        let _ = writeln!(
            out,
            "- Suitability score: {}, average suitability score: {}",
            metrics.score, metrics.average_score
        );
    }

    let emotions = metrics
        .emotions
        .readings()
        .iter()
        .map(|(emotion, reading)| {
            format!(
                "{} {} (average {})",
                emotion.label(),
                reading.value,
                reading.average
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "- Emotion analysis (%): {emotions}");

    let attention = &metrics.attention;
    let _ = writeln!(
        out,
        "- Attention analysis: off-screen time {} s, off-screen glances {}, \
         average off-screen time {} s, average off-screen glances {}",
        attention.off_screen_seconds,
        attention.off_screen_count,
        attention.average_off_screen_seconds,
        attention.average_off_screen_count
    );

    for (i, qa) in metrics.questions.iter().enumerate() {
        let _ = writeln!(out, "- Question {}: {}", i + 1, qa.question);
        let _ = writeln!(out, "  Answer {}: {}", i + 1, qa.answer);
    }

    out.push_str("\nSections to write:\n");
    let mut keys: Vec<&str> = Vec::new();
    for &(key, instruction) in INTERVIEW_SECTIONS {
        let _ = writeln!(out, "- \"{key}\": {instruction}");
        keys.push(key);
    }

    match request.audience {
        Audience::Candidate => {
            out.push_str(
                "- \"conclusions\": Written only for human resources professionals. Reach a clear \
                 conclusion on fit for the position and give concrete hiring recommendations. \
                 Do not address the candidate. At least two paragraphs.\n",
            );
            out.push_str(
                "- \"suitability\": One or two paragraphs explaining the position suitability \
                 percentage, based on the suitability score above. Do not repeat the number \
                 as a heading.\n",
            );
            keys.extend(["conclusions", "suitability"]);
        }
        Audience::Customer => {
            out.push_str(
                "- \"conclusions\": A general assessment of the customer in about one paragraph.\n",
            );
            keys.push("conclusions");
        }
    }

    let _ = writeln!(
        out,
        "\nThe emotion analysis body must start with the sentence: \
         \"The {} emotions were analysed from video and audio.\"",
        person.to_lowercase()
    );
    json_shape(out, &keys);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::request::tests::sample_interview;

    fn interview_request(audience: Audience) -> ReportRequest {
        let mut req = ReportRequest::new("Ayşe Yılmaz");
        req.title = Some("Backend Engineer".into());
        req.audience = audience;
        req.language = "Turkish".into();
        req.interview = Some(sample_interview());
        req
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let mut req = ReportRequest::new("Q3 sales");
        req.parameters.insert("region".into(), "EMEA".into());
        req.parameters.insert("currency".into(), "EUR".into());
        assert_eq!(build_prompt(&req), build_prompt(&req.clone()));
    }

    #[test]
    fn test_general_prompt_lists_inputs_in_key_order() {
        let mut req = ReportRequest::new("Q3 sales");
        req.parameters.insert("region".into(), "EMEA".into());
        req.parameters.insert("currency".into(), "EUR".into());
        let prompt = build_prompt(&req);
        assert!(prompt.user.contains("- Subject: Q3 sales"));
        let currency = prompt.user.find("- currency: EUR").unwrap();
        let region = prompt.user.find("- region: EMEA").unwrap();
        assert!(currency < region);
        assert!(prompt.system.contains("only in English"));
    }

    #[test]
    fn test_candidate_prompt_includes_every_metric() {
        let prompt = build_prompt(&interview_request(Audience::Candidate));
        let user = &prompt.user;
        assert!(user.contains("- Candidate name: Ayşe Yılmaz"));
        assert!(user.contains("- Interview name: Backend Engineer"));
        assert!(user.contains("Suitability score: 82.456, average suitability score: 74"));
        for label in ["Happy 35.5 (average 30)", "Neutral 40.25 (average 43.3)", "Afraid 4.25"] {
            assert!(user.contains(label), "missing {label}");
        }
        assert!(user.contains("off-screen time 12.346 s, off-screen glances 4"));
        assert!(user.contains("Question 1: "));
        assert!(user.contains("\"key\": \"suitability\""));
        assert!(prompt.system.contains("only in Turkish"));
    }

    #[test]
    fn test_customer_prompt_omits_suitability() {
        let prompt = build_prompt(&interview_request(Audience::Customer));
        assert!(prompt.user.contains("- Customer name: Ayşe Yılmaz"));
        assert!(!prompt.user.contains("Suitability score"));
        assert!(!prompt.user.contains("\"key\": \"suitability\""));
        assert!(prompt.user.contains("\"key\": \"conclusions\""));
    }

    #[test]
    fn test_reply_format_is_shared() {
        let general = build_prompt(&ReportRequest::new("Q3 sales")).user;
        let interview = build_prompt(&interview_request(Audience::Customer)).user;
        for user in [&general, &interview] {
            assert!(user.contains("Return JSON with exactly this structure:"));
            assert!(user.contains("\"title\": \"Report title\""));
            assert!(user.ends_with("Use plain text in every body, without markdown or HTML.\n"));
        }
        assert!(general.contains(
            "    {\"heading\": \"Section heading\", \"body\": \"Paragraphs separated by blank lines\"}\n  ]"
        ));
        assert!(!general.contains("\"key\""));
        assert!(interview.contains(
            "    {\"key\": \"overview\", \"heading\": \"Section heading\", \"body\": \"Paragraphs separated by blank lines\"},\n"
        ));
    }
}
