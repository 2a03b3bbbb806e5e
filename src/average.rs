use serde::Serialize;
use serde_json::Value;

use crate::models::{RecordId, TestResult};

/// Outcome of averaging a set of tests.
///
/// `NoData` is not a score of zero: it means there was nothing to average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    NoData,
    Score(f64),
}

impl Average {
    pub fn score(&self) -> Option<f64> {
        match self {
            Average::NoData => None,
            Average::Score(score) => Some(*score),
        }
    }
}

/// `mark / outOf * 100` for a single test.
///
/// A missing or non-numeric mark or denominator, or a zero denominator, gives
/// a non-finite value. It is propagated rather than skipped.
pub fn percentage(test: &TestResult) -> f64 {
    let mark = numeric(test.mark.as_ref());
    let out_of = numeric(test.out_of.as_ref());
    mark / out_of * 100.0
}

/// Loose numeric reading of a stored attribute.
///
/// Numbers pass through, numeric text like `"8"` is read as a number,
/// booleans count as 1 and 0, blank text and `null` as 0. Anything else,
/// including an absent value, is NaN.
pub fn numeric(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::Number(number)) => number.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(text)) => numeric_text(text.trim()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn numeric_text(text: &str) -> f64 {
    match text {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => text.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Unweighted mean of the per-test percentages, rounded to two decimals.
pub fn average(tests: &[TestResult]) -> Average {
    if tests.is_empty() {
        return Average::NoData;
    }
    let total: f64 = tests.iter().map(percentage).sum();
    Average::Score(round2(total / tests.len() as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Subject {
    StudentId(RecordId),
    CourseId(RecordId),
}

impl Subject {
    fn empty_message(&self) -> &'static str {
        match self {
            Subject::StudentId(_) => "This student has no tests yet.",
            Subject::CourseId(_) => "This course has no tests yet.",
        }
    }
}

/// Body of the `/students/:id/average` and `/courses/:id/average` answers.
///
/// Non-finite scores serialize as `null`, same as the no-data case, but keep
/// their real `testCount` and carry no message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageReport {
    #[serde(flatten)]
    pub subject: Subject,
    pub average: Option<f64>,
    pub test_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl AverageReport {
    pub fn new(subject: Subject, tests: &[TestResult]) -> Self {
        let average = average(tests);
        Self {
            subject,
            average: average.score(),
            test_count: tests.len(),
            message: match average {
                Average::NoData => Some(subject.empty_message()),
                Average::Score(_) => None,
            },
        }
    }
}
