use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_PARAMETERS: usize = 64;
const MAX_PARAMETER_KEY_CHARS: usize = 100;
const MAX_PARAMETER_VALUE_CHARS: usize = 2_000;
const MAX_LANGUAGE_CHARS: usize = 40;
const MAX_QUESTIONS: usize = 50;
const MAX_QA_CHARS: usize = 4_000;

pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Report for HR about a candidate; carries the suitability section.
    #[default]
    Candidate,
    Customer,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::Candidate => "candidate",
            Audience::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub value: f64,
    #[serde(default)]
    pub average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Happy,
    Angry,
    Disgusted,
    Afraid,
    Sad,
    Surprised,
    Neutral,
}

impl Emotion {
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Angry => "Angry",
            Emotion::Disgusted => "Disgusted",
            Emotion::Afraid => "Afraid",
            Emotion::Sad => "Sad",
            Emotion::Surprised => "Surprised",
            Emotion::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emotions {
    pub happy: EmotionReading,
    pub angry: EmotionReading,
    pub disgusted: EmotionReading,
    pub afraid: EmotionReading,
    pub sad: EmotionReading,
    pub surprised: EmotionReading,
    pub neutral: EmotionReading,
}

impl Emotions {
    /// Readings in display order.
    pub fn readings(&self) -> [(Emotion, EmotionReading); 7] {
        [
            (Emotion::Happy, self.happy),
            (Emotion::Angry, self.angry),
            (Emotion::Disgusted, self.disgusted),
            (Emotion::Afraid, self.afraid),
            (Emotion::Sad, self.sad),
            (Emotion::Surprised, self.surprised),
            (Emotion::Neutral, self.neutral),
        ]
    }

    fn readings_mut(&mut self) -> [&mut EmotionReading; 7] {
        [
            &mut self.happy,
            &mut self.angry,
            &mut self.disgusted,
            &mut self.afraid,
            &mut self.sad,
            &mut self.surprised,
            &mut self.neutral,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attention {
    pub off_screen_seconds: f64,
    pub off_screen_count: u32,
    #[serde(default)]
    pub average_off_screen_seconds: f64,
    #[serde(default)]
    pub average_off_screen_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewMetrics {
    pub score: f64,
    pub average_score: f64,
    pub emotions: Emotions,
    pub attention: Attention,
    #[serde(default)]
    pub questions: Vec<QuestionAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub subject: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub interview: Option<InterviewMetrics>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl ReportRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            title: None,
            audience: Audience::default(),
            language: default_language(),
            parameters: BTreeMap::new(),
            interview: None,
        }
    }

    /// Checks bounds and returns the normalised request: text trimmed,
    /// empty optionals dropped, metrics rounded to two decimals.
    pub fn validate(mut self) -> Result<Self, String> {
        self.subject = self.subject.trim().to_string();
        if self.subject.is_empty() {
            return Err("subject must not be empty".to_string());
        }
        check_len("subject", &self.subject, MAX_SUBJECT_CHARS)?;

        self.title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(title) = &self.title {
            check_len("title", title, MAX_TITLE_CHARS)?;
        }

        self.language = self.language.trim().to_string();
        if self.language.is_empty() {
            self.language = default_language();
        }
        check_len("language", &self.language, MAX_LANGUAGE_CHARS)?;

        if self.parameters.len() > MAX_PARAMETERS {
            return Err(format!(
                "at most {MAX_PARAMETERS} parameters are allowed, got {}",
                self.parameters.len()
            ));
        }
        for (key, value) in &self.parameters {
            if key.trim().is_empty() {
                return Err("parameter names must not be empty".to_string());
            }
            check_len("parameter name", key, MAX_PARAMETER_KEY_CHARS)?;
            check_len(&format!("parameter {key:?}"), value, MAX_PARAMETER_VALUE_CHARS)?;
        }

        if let Some(interview) = &mut self.interview {
            validate_interview(interview)?;
        }

        Ok(self)
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len > max {
        return Err(format!("{field} is {len} characters, limit is {max}"));
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn check_range(field: &str, value: &mut f64, max: Option<f64>) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{field} must be a finite number"));
    }
    if *value < 0.0 || max.is_some_and(|max| *value > max) {
        return Err(match max {
            Some(max) => format!("{field} must be between 0 and {max}, got {value}"),
            None => format!("{field} must not be negative, got {value}"),
        });
    }
    *value = round2(*value);
    Ok(())
}

fn validate_interview(interview: &mut InterviewMetrics) -> Result<(), String> {
    check_range("interview.score", &mut interview.score, Some(100.0))?;
    check_range(
        "interview.average_score",
        &mut interview.average_score,
        Some(100.0),
    )?;

    let labels = Emotions::readings(&interview.emotions).map(|(emotion, _)| emotion.label());
    for (reading, label) in interview.emotions.readings_mut().into_iter().zip(labels) {
        let label = label.to_lowercase();
        check_range(
            &format!("interview.emotions.{label}.value"),
            &mut reading.value,
            Some(100.0),
        )?;
        check_range(
            &format!("interview.emotions.{label}.average"),
            &mut reading.average,
            Some(100.0),
        )?;
    }

    let attention = &mut interview.attention;
    check_range(
        "interview.attention.off_screen_seconds",
        &mut attention.off_screen_seconds,
        None,
    )?;
    check_range(
        "interview.attention.average_off_screen_seconds",
        &mut attention.average_off_screen_seconds,
        None,
    )?;
    check_range(
        "interview.attention.average_off_screen_count",
        &mut attention.average_off_screen_count,
        None,
    )?;

    if interview.questions.len() > MAX_QUESTIONS {
        return Err(format!(
            "at most {MAX_QUESTIONS} questions are allowed, got {}",
            interview.questions.len()
        ));
    }
    for (i, qa) in interview.questions.iter_mut().enumerate() {
        qa.question = qa.question.trim().to_string();
        qa.answer = qa.answer.trim().to_string();
        if qa.question.is_empty() {
            return Err(format!("interview.questions[{i}].question must not be empty"));
        }
        check_len(&format!("interview.questions[{i}].question"), &qa.question, MAX_QA_CHARS)?;
        check_len(&format!("interview.questions[{i}].answer"), &qa.answer, MAX_QA_CHARS)?;
    }

    Ok(())
}
