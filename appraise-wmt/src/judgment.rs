//! Judge submissions and their decoded values

use crate::codec;
use crate::error::DecodeError;
use crate::task_type::TaskType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Literal raw result meaning "judge skipped this item"
pub const SKIP_SENTINEL: &str = "SKIPPED";

/// A submission waiting to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResult {
    pub segment_id: i64,
    pub user: String,
    pub duration: Option<Duration>,
    pub raw_result: String,
}

impl NewResult {
    pub fn new(segment_id: i64, user: impl Into<String>, raw_result: impl Into<String>) -> Self {
        Self {
            segment_id,
            user: user.into(),
            duration: None,
            raw_result: raw_result.into(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn skipped(segment_id: i64, user: impl Into<String>) -> Self {
        Self::new(segment_id, user, SKIP_SENTINEL)
    }
}

/// A stored judge submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    /// Lookup only; the segment is owned by its HIT
    pub segment_id: i64,
    pub hit_id: String,
    pub user: String,
    pub duration: Option<Duration>,
    pub raw_result: String,
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn is_skipped(&self) -> bool {
        self.raw_result == SKIP_SENTINEL
    }

    /// Decode `raw_result` for the owning HIT's task type; recomputed on every call
    pub fn judgment(&self, task_type: TaskType) -> Judgment {
        Judgment::decode(task_type, &self.raw_result)
    }
}

/// One word-level error annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordError {
    pub word_id: i64,
    pub class: String,
    pub severity: String,
}

/// Decoded error classification result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ErrorAnnotation {
    /// Sorted by ascending word id, ties in submission order
    pub errors: Vec<WordError>,
    pub missing_words: bool,
    pub too_many_errors: bool,
}

/// Decoded post-editing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEdit {
    pub from_scratch: bool,
    /// Index of the translation the edit started from
    pub translation_index: usize,
    pub text: String,
}

/// Structured value of a non-skipped raw result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum DecodedValue {
    QualityChecking(String),
    Ranking(Vec<i64>),
    PostEditing(PostEdit),
    ErrorClassification(ErrorAnnotation),
    ThreeWayRanking(String),
}

/// Outcome of decoding one raw result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgment {
    Value(DecodedValue),
    Skipped,
    Failed(DecodeError),
}

impl Judgment {
    pub fn decode(task_type: TaskType, raw_result: &str) -> Self {
        match codec::decode_result(task_type, raw_result) {
            Ok(Some(value)) => Judgment::Value(value),
            Ok(None) => Judgment::Skipped,
            Err(e) => Judgment::Failed(e),
        }
    }

    pub fn value(&self) -> Option<&DecodedValue> {
        match self {
            Judgment::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Judgment::Skipped)
    }

    pub fn error(&self) -> Option<&DecodeError> {
        match self {
            Judgment::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Ranks of a decoded ranking result
    pub fn ranks(&self) -> Option<&[i64]> {
        match self {
            Judgment::Value(DecodedValue::Ranking(ranks)) => Some(ranks),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tri_state() {
        assert_eq!(
            Judgment::decode(TaskType::Ranking, "1,2,3,4,5").ranks(),
            Some(&[1, 2, 3, 4, 5][..])
        );
        assert!(Judgment::decode(TaskType::Ranking, SKIP_SENTINEL).is_skipped());
        assert!(Judgment::decode(TaskType::Ranking, "1,2,x,4,5").error().is_some());
    }

    #[test]
    fn test_failed_judgment_has_no_value() {
        let judgment = Judgment::decode(TaskType::Ranking, "1,2");
        assert!(judgment.value().is_none());
        assert!(!judgment.is_skipped());
    }

    #[test]
    fn test_new_result_builders() {
        let result = NewResult::skipped(4, "alice").with_duration(Duration::from_secs(3));
        assert_eq!(result.raw_result, SKIP_SENTINEL);
        assert_eq!(result.duration, Some(Duration::from_secs(3)));
    }
}
