//! Fixed document text per report language. Model-written headings take
//! precedence; these cover charts, Q&A, fit labels and fallbacks.

use super::request::Emotion;

#[derive(Debug, PartialEq, Eq)]
pub struct Labels {
    pub emotions: [&'static str; 7],
    pub emotion_chart: &'static str,
    pub difference_chart: &'static str,
    pub position_fit: &'static str,
    pub question: &'static str,
    pub answer: &'static str,
    pub overview: &'static str,
    pub analysis: &'static str,
    pub emotion_analysis: &'static str,
    pub attention_analysis: &'static str,
    pub evaluation: &'static str,
    pub questions_and_answers: &'static str,
    pub conclusions: &'static str,
    pub suitability: &'static str,
    pub page: &'static str,
}

pub const ENGLISH: Labels = Labels {
    emotions: [
        "Happy",
        "Angry",
        "Disgusted",
        "Afraid",
        "Sad",
        "Surprised",
        "Neutral",
    ],
    emotion_chart: "Emotion Analysis",
    difference_chart: "Emotion Difference from Average",
    position_fit: "Position fit:",
    question: "Question:",
    answer: "Answer:",
    overview: "General Overview",
    analysis: "Analysis",
    emotion_analysis: "Emotion Analysis",
    attention_analysis: "Attention Analysis",
    evaluation: "General Evaluation",
    questions_and_answers: "Questions and Answers",
    conclusions: "Conclusions and Recommendations",
    suitability: "Position Suitability Assessment",
    page: "Page",
};

pub const TURKISH: Labels = Labels {
    emotions: [
        "Mutlu",
        "Kızgın",
        "İğrenme",
        "Korku",
        "Üzgün",
        "Şaşkın",
        "Doğal",
    ],
    emotion_chart: "Aday Duygu Analizi",
    difference_chart: "Aday Duygularının Ortalamadan Farkı",
    position_fit: "Pozisyona Uygunluk:",
    question: "Soru:",
    answer: "Cevap:",
    overview: "Genel Bakış",
    analysis: "Analiz",
    emotion_analysis: "Duygu Analizi",
    attention_analysis: "Dikkat Analizi",
    evaluation: "Genel Değerlendirme",
    questions_and_answers: "Sorular ve Cevaplar",
    conclusions: "Sonuçlar ve Öneriler",
    suitability: "Pozisyona Uygunluk Değerlendirmesi",
    page: "Sayfa",
};

impl Labels {
    /// Unknown languages get English labels; the prose still follows the
    /// requested language.
    pub fn for_language(language: &str) -> &'static Labels {
        match language.trim().to_lowercase().as_str() {
            "turkish" | "türkçe" | "turkce" | "tr" | "tr-tr" => &TURKISH,
            _ => &ENGLISH,
        }
    }

    pub fn emotion(&self, emotion: Emotion) -> &'static str {
        let i = match emotion {
            Emotion::Happy => 0,
            Emotion::Angry => 1,
            Emotion::Disgusted => 2,
            Emotion::Afraid => 3,
            Emotion::Sad => 4,
            Emotion::Surprised => 5,
            Emotion::Neutral => 6,
        };
        self.emotions[i]
    }
}
