use serde::{Deserialize, Serialize};

use crate::ids::{EvalItemId, ScoreId, ScoreVersionId, ScorecardId, SectionId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    pub id: ScorecardId,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub guidelines: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub scorecard_id: ScorecardId,
    pub name: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub id: ScoreId,
    pub section_id: SectionId,
    pub scorecard_id: ScorecardId,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub score_type: String,
    pub order: u32,
    #[serde(default)]
    pub champion_version_id: Option<ScoreVersionId>,
}

/// Immutable once created; edits always produce a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreVersion {
    pub id: ScoreVersionId,
    pub score_id: ScoreId,
    pub configuration: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalItem {
    pub id: EvalItemId,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStage {
    pub name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub processed_items: u64,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub stages: Vec<TaskStage>,
    #[serde(default)]
    pub target: Option<String>,
}
