//! The five annotation task types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    QualityChecking,
    #[default]
    Ranking,
    PostEditing,
    ErrorClassification,
    #[serde(rename = "3-way-ranking")]
    ThreeWayRanking,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::QualityChecking,
        TaskType::Ranking,
        TaskType::PostEditing,
        TaskType::ErrorClassification,
        TaskType::ThreeWayRanking,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            TaskType::QualityChecking => "Quality Checking",
            TaskType::Ranking => "Ranking",
            TaskType::PostEditing => "Post-editing",
            TaskType::ErrorClassification => "Error classification",
            TaskType::ThreeWayRanking => "3-Way Ranking",
        }
    }

    /// Label lower-cased with spaces replaced by `-`; used in exports and storage
    pub fn slug(&self) -> &'static str {
        match self {
            TaskType::QualityChecking => "quality-checking",
            TaskType::Ranking => "ranking",
            TaskType::PostEditing => "post-editing",
            TaskType::ErrorClassification => "error-classification",
            TaskType::ThreeWayRanking => "3-way-ranking",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskType {
    type Err = String;

    /// Accepts either the slug or the label
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.slug() == s || t.label() == s)
            .ok_or_else(|| format!("unknown task type: {}", s))
    }
}
