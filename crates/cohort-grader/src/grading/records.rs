use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enrolled student as known to the data-access layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub group_name: String,
    #[serde(default)]
    pub retake: bool,
}

/// CI verdict reported for a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Banned,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

/// One CI run for a task inside a student's project. Retries add new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: u64,
    pub project: String,
    pub task_id: String,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
}

/// Out-of-band proof of completion, redeemable by exactly one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub id: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub claimed_by: Option<String>,
}

/// Manual grading correction for a (login, task) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub login: String,
    pub task_id: String,
    pub score: u32,
    pub status: PipelineStatus,
}
