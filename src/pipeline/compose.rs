use crate::render::{Badge, Bar, BarChart, Block, DocumentContent, Rgb};

use super::content::{GeneratedContent, GeneratedSection, paragraphs};
use super::labels::Labels;
use super::prompt::INTERVIEW_SECTIONS;
use super::request::{Audience, Emotion, InterviewMetrics, ReportRequest};

/// Colour band for a suitability score relative to the average.
pub fn suitability_color(score: f64, average: f64) -> Rgb {
    if score >= average + 5.0 {
        Rgb(0x27, 0xae, 0x60)
    } else if score >= average + 2.5 {
        Rgb(0x8b, 0xc3, 0x4a)
    } else if score >= average - 2.5 {
        Rgb(0xff, 0xc1, 0x07)
    } else if score >= average - 5.0 {
        Rgb(0xff, 0x98, 0x00)
    } else {
        Rgb(0xf4, 0x43, 0x36)
    }
}

fn emotion_color(emotion: Emotion) -> Rgb {
    match emotion {
        Emotion::Happy => Rgb(0xd4, 0xea, 0xc8),
        Emotion::Angry => Rgb(0xe5, 0xb9, 0xb5),
        Emotion::Disgusted => Rgb(0xd3, 0xcd, 0xd7),
        Emotion::Afraid => Rgb(0xa9, 0xb4, 0xc2),
        Emotion::Sad => Rgb(0xb7, 0xd0, 0xe2),
        Emotion::Surprised => Rgb(0xfd, 0xea, 0xc9),
        Emotion::Neutral => Rgb(0xd8, 0xd8, 0xd8),
    }
}

pub fn emotion_charts(metrics: &InterviewMetrics, labels: &Labels) -> [BarChart; 2] {
    let readings = metrics.emotions.readings();
    let absolute = BarChart {
        title: labels.emotion_chart.to_string(),
        bars: readings
            .iter()
            .map(|(emotion, reading)| Bar {
                label: labels.emotion(*emotion).to_string(),
                value: reading.value,
                color: emotion_color(*emotion),
            })
            .collect(),
        signed: false,
    };
    let difference = BarChart {
        title: labels.difference_chart.to_string(),
        bars: readings
            .iter()
            .map(|(emotion, reading)| Bar {
                label: labels.emotion(*emotion).to_string(),
                value: ((reading.value - reading.average) * 100.0).round() / 100.0,
                color: emotion_color(*emotion),
            })
            .collect(),
        signed: true,
    };
    [absolute, difference]
}

pub fn fit_text(score: f64) -> String {
    format!("%{score:.0}")
}

/// `<subject> - <title>`, or the subject alone.
pub fn title_line(request: &ReportRequest) -> String {
    match &request.title {
        Some(title) => format!("{} - {}", request.subject, title),
        None => request.subject.clone(),
    }
}

/// Download name derived from the title line, safe for any filesystem.
pub fn file_name(request: &ReportRequest) -> String {
    let mut stem = request.subject.clone();
    if let Some(title) = &request.title {
        stem.push('_');
        stem.push_str(title);
    }
    let stem: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_Report.pdf", stem.trim())
}

struct Composer {
    blocks: Vec<Block>,
    number: usize,
}

impl Composer {
    fn numbered(&mut self, heading: &str) {
        self.number += 1;
        self.blocks
            .push(Block::Heading(format!("{}) {}", self.number, heading)));
    }

    fn body(&mut self, body: &str) {
        self.blocks
            .extend(paragraphs(body).into_iter().map(Block::Paragraph));
    }

    fn section(&mut self, section: &GeneratedSection, fallback_heading: &str) {
        self.numbered(section.heading.as_deref().unwrap_or(fallback_heading));
        self.body(&section.body);
    }
}

/// Turns a validated request and the model's sections into renderable
/// document content.
pub fn compose(
    request: &ReportRequest,
    generated: &GeneratedContent,
    footer: &[String],
) -> DocumentContent {
    let labels = Labels::for_language(&request.language);
    let title = title_line(request);
    let mut composer = Composer {
        blocks: vec![Block::Title(title.clone())],
        number: 0,
    };
    if let Some(subtitle) = &generated.title
        && !subtitle.eq_ignore_ascii_case(&title)
    {
        composer.blocks.push(Block::Subheading(subtitle.clone()));
    }

    let badge = match (&request.interview, request.audience) {
        (Some(metrics), Audience::Candidate) => Some(Badge {
            label: labels.position_fit.to_string(),
            value: fit_text(metrics.score),
            color: suitability_color(metrics.score, metrics.average_score),
        }),
        _ => None,
    };

    match &request.interview {
        Some(metrics) => interview_blocks(&mut composer, request, metrics, generated, labels),
        None => {
            for section in &generated.sections {
                match &section.heading {
                    Some(heading) => composer.section(section, heading),
                    None => composer.body(&section.body),
                }
            }
        }
    }

    DocumentContent {
        title,
        file_name: file_name(request),
        badge,
        footer: footer.to_vec(),
        page_label: labels.page.to_string(),
        blocks: composer.blocks,
    }
}

fn interview_blocks(
    composer: &mut Composer,
    request: &ReportRequest,
    metrics: &InterviewMetrics,
    generated: &GeneratedContent,
    labels: &Labels,
) {
    if let Some(overview) = generated.section("overview") {
        composer.section(overview, labels.overview);
    }

    composer.numbered(labels.analysis);
    let emotions = generated.section("emotions");
    composer.blocks.push(Block::Subheading(
        emotions
            .and_then(|s| s.heading.clone())
            .unwrap_or_else(|| labels.emotion_analysis.to_string()),
    ));
    let [absolute, difference] = emotion_charts(metrics, labels);
    composer.blocks.push(Block::Chart(absolute));
    composer.blocks.push(Block::Chart(difference));
    if let Some(emotions) = emotions {
        composer.body(&emotions.body);
    }
    if let Some(attention) = generated.section("attention") {
        composer.blocks.push(Block::Subheading(
            attention
                .heading
                .clone()
                .unwrap_or_else(|| labels.attention_analysis.to_string()),
        ));
        composer.body(&attention.body);
    }

    if let Some(evaluation) = generated.section("evaluation") {
        composer.section(evaluation, labels.evaluation);
    }

    if !metrics.questions.is_empty() {
        composer.numbered(labels.questions_and_answers);
        for qa in &metrics.questions {
            composer.blocks.push(Block::QuestionAnswer {
                question: format!("{} {}", labels.question, qa.question),
                answer: format!("{} {}", labels.answer, qa.answer),
            });
        }
    }

    if let Some(conclusions) = generated.section("conclusions") {
        composer.section(conclusions, labels.conclusions);
    }

    // Sections outside the known slots keep their order, after the known ones.
    let known = |s: &&GeneratedSection| {
        s.key.as_deref().is_some_and(|k| {
            INTERVIEW_SECTIONS.iter().any(|(key, _)| *key == k)
                || k == "conclusions"
                || k == "suitability"
        })
    };
    for section in generated.sections.iter().filter(|s| !known(s)) {
        match &section.heading {
            Some(heading) => composer.section(section, heading),
            None => composer.body(&section.body),
        }
    }

    if request.audience == Audience::Candidate {
        let suitability = generated.section("suitability");
        composer.numbered(
            suitability
                .and_then(|s| s.heading.as_deref())
                .unwrap_or(labels.suitability),
        );
        composer.blocks.push(Block::Callout {
            text: format!("{} {}", labels.position_fit, fit_text(metrics.score)),
            color: suitability_color(metrics.score, metrics.average_score),
        });
        if let Some(suitability) = suitability {
            composer.body(&suitability.body);
        }
    }
}
