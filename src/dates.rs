use crate::text::fold_digits;
use crate::types::{NormalizedTime, TimeConfidence};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum RelativeUnit {
    Minutes,
    Hours,
    Days,
}

/// Relative-time phrases in both scripts: «N دقیقه/ساعت/روز پیش» and
/// "N minutes/hours/days ago". Tolerant of case and stray whitespace.
static RELATIVE_PATTERNS: Lazy<Vec<(Regex, RelativeUnit)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(\d+)\s*دقیقه\s*(?:پیش|قبل)").expect("static pattern"),
            RelativeUnit::Minutes,
        ),
        (
            Regex::new(r"(\d+)\s*ساعت\s*(?:پیش|قبل)").expect("static pattern"),
            RelativeUnit::Hours,
        ),
        (
            Regex::new(r"(\d+)\s*روز\s*(?:پیش|قبل)").expect("static pattern"),
            RelativeUnit::Days,
        ),
        (
            Regex::new(r"(?i)(\d+)\s*min(?:ute)?s?\s+ago").expect("static pattern"),
            RelativeUnit::Minutes,
        ),
        (
            Regex::new(r"(?i)(\d+)\s*hours?\s+ago").expect("static pattern"),
            RelativeUnit::Hours,
        ),
        (
            Regex::new(r"(?i)(\d+)\s*days?\s+ago").expect("static pattern"),
            RelativeUnit::Days,
        ),
    ]
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Reconciles raw timestamp strings into UTC instants. Total: any input,
/// including garbage, yields an instant; the confidence flag tells callers
/// whether it was actually parsed or defaulted to "now".
#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    offset: FixedOffset,
}

impl TimestampNormalizer {
    /// `offset` is the source's local timezone; naive absolute dates are
    /// assumed to be in it.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedTime {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalization against an explicit reference instant, so relative
    /// phrases resolve deterministically.
    pub fn normalize_at(&self, raw: &str, now: DateTime<Utc>) -> NormalizedTime {
        let folded = fold_digits(raw);
        let trimmed = folded.trim();

        if trimmed.is_empty() {
            return defaulted(now);
        }

        // Absolute machine-readable dates carry a date separator.
        if trimmed.contains('T') || trimmed.contains('-') || trimmed.contains('/') {
            return match self.parse_absolute(trimmed) {
                Some(instant) => NormalizedTime {
                    instant,
                    confidence: TimeConfidence::Parsed,
                },
                None => {
                    debug!("Could not parse absolute date: {trimmed}");
                    defaulted(now)
                }
            };
        }

        if let Some(delta) = parse_relative(trimmed) {
            // Subtracting in the source timezone and converting to UTC is
            // the same instant arithmetic either way.
            return NormalizedTime {
                instant: now - delta,
                confidence: TimeConfidence::Parsed,
            };
        }

        debug!("Could not parse date: {trimmed}");
        defaulted(now)
    }

    fn parse_absolute(&self, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in NAIVE_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return self.localize(naive);
            }
        }
        for format in NAIVE_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return self.localize(date.and_hms_opt(0, 0, 0)?);
            }
        }
        None
    }

    /// A timezone-less parse is assumed to be source-local.
    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

fn parse_relative(raw: &str) -> Option<Duration> {
    for (pattern, unit) in RELATIVE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(raw) {
            let value: i64 = caps.get(1)?.as_str().parse().ok()?;
            return Some(match unit {
                RelativeUnit::Minutes => Duration::minutes(value),
                RelativeUnit::Hours => Duration::hours(value),
                RelativeUnit::Days => Duration::days(value),
            });
        }
    }
    None
}

fn defaulted(now: DateTime<Utc>) -> NormalizedTime {
    NormalizedTime {
        instant: now,
        confidence: TimeConfidence::Defaulted,
    }
}
