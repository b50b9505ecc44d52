use crate::text::TextPreprocessor;
use serde::Serialize;

/// Persian sentiment keywords. Lexicon-based on purpose: scoring has to
/// work offline with no model downloads.
const POSITIVE_WORDS: &[&str] = &[
    "خوب",
    "عالی",
    "موفق",
    "موفقیت",
    "پیروزی",
    "پیشرفت",
    "رشد",
    "بهبود",
    "افزایش",
    "توسعه",
    "امید",
    "امیدوار",
    "مثبت",
    "برتر",
    "قهرمان",
    "رکورد",
    "دستاورد",
    "افتخار",
    "رونق",
    "توافق",
];

const NEGATIVE_WORDS: &[&str] = &[
    "بد",
    "ضعیف",
    "شکست",
    "کاهش",
    "سقوط",
    "بحران",
    "مشکل",
    "خطر",
    "تهدید",
    "مرگ",
    "کشته",
    "زلزله",
    "سیل",
    "اتش",
    "انفجار",
    "جنگ",
    "تحریم",
    "گرانی",
    "تورم",
    "فساد",
];

/// Cutoff between neutral and a polar label on the [-1, 1] scale.
const LABEL_CUTOFF: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// Lexicon hit counts plus the derived polarity score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SentimentScore {
    /// (positive - negative) / (positive + negative), 0.0 with no hits.
    pub score: f64,
    pub label: SentimentLabel,
    pub positive_hits: usize,
    pub negative_hits: usize,
}

/// Score a text by counting lexicon hits over its cleaned tokens.
pub fn score_sentiment(preprocessor: &TextPreprocessor, text: &str) -> SentimentScore {
    let cleaned = preprocessor.clean(text);
    let mut positive_hits = 0;
    let mut negative_hits = 0;
    for token in cleaned.split_whitespace() {
        if POSITIVE_WORDS.contains(&token) {
            positive_hits += 1;
        } else if NEGATIVE_WORDS.contains(&token) {
            negative_hits += 1;
        }
    }

    let total = positive_hits + negative_hits;
    let score = if total == 0 {
        0.0
    } else {
        (positive_hits as f64 - negative_hits as f64) / total as f64
    };
    let label = if score > LABEL_CUTOFF {
        SentimentLabel::Positive
    } else if score < -LABEL_CUTOFF {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    SentimentScore {
        score,
        label,
        positive_hits,
        negative_hits,
    }
}
