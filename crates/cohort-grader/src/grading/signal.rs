use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::course::TaskDefinition;
use super::records::{FlagRecord, PipelineRecord, PipelineStatus};

/// Displayed task state, ordered from worst to best-looking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Banned,
    Assigned,
    Failed,
    Checking,
    Success,
}

impl From<PipelineStatus> for TaskStatus {
    fn from(status: PipelineStatus) -> Self {
        match status {
            PipelineStatus::Banned => TaskStatus::Banned,
            PipelineStatus::Pending | PipelineStatus::Running => TaskStatus::Checking,
            PipelineStatus::Success => TaskStatus::Success,
            PipelineStatus::Failed | PipelineStatus::Canceled => TaskStatus::Failed,
        }
    }
}

/// Record a winning signal was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalOrigin {
    Pipeline { id: u64 },
    Flag { id: String },
}

/// Best available evidence for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub origin: SignalOrigin,
}

/// Winning pipeline and claimed flag per task for a single student.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentSignals {
    pipelines: HashMap<String, PipelineRecord>,
    flags: HashMap<String, FlagRecord>,
}

impl StudentSignals {
    /// Merges the student's pipeline history with the flags they claimed.
    ///
    /// Flags claimed by other students are ignored, so callers may pass unfiltered lists.
    pub fn reconcile<'a, P, F>(login: &str, pipelines: P, flags: F) -> Self
    where
        P: IntoIterator<Item = &'a PipelineRecord>,
        F: IntoIterator<Item = &'a FlagRecord>,
    {
        let mut best_pipelines: HashMap<String, PipelineRecord> = HashMap::new();
        for pipeline in pipelines {
            match best_pipelines.get(&pipeline.task_id) {
                Some(current) if pipeline_key(current) >= pipeline_key(pipeline) => {}
                _ => {
                    best_pipelines.insert(pipeline.task_id.clone(), pipeline.clone());
                }
            }
        }

        let mut earliest_flags: HashMap<String, FlagRecord> = HashMap::new();
        for flag in flags {
            if flag.claimed_by.as_deref() != Some(login) {
                continue;
            }
            match earliest_flags.get(&flag.task_id) {
                Some(current) if flag_key(current) <= flag_key(flag) => {}
                _ => {
                    earliest_flags.insert(flag.task_id.clone(), flag.clone());
                }
            }
        }

        Self {
            pipelines: best_pipelines,
            flags: earliest_flags,
        }
    }

    /// Winning signal for `task`, or `None` when the task was never attempted.
    pub fn signal_for(&self, task: &TaskDefinition) -> Option<Signal> {
        let flag = self.flags.get(&task.id).map(|flag| Signal {
            status: TaskStatus::Success,
            submitted_at: flag.created_at,
            origin: SignalOrigin::Flag {
                id: flag.id.clone(),
            },
        });

        if task.alternate_proof {
            return flag;
        }

        self.pipelines
            .get(&task.id)
            .map(|pipeline| Signal {
                status: pipeline.status.into(),
                submitted_at: pipeline.started_at,
                origin: SignalOrigin::Pipeline { id: pipeline.id },
            })
            .or(flag)
    }

    pub fn pipeline_for(&self, task_id: &str) -> Option<&PipelineRecord> {
        self.pipelines.get(task_id)
    }

    pub fn flag_for(&self, task_id: &str) -> Option<&FlagRecord> {
        self.flags.get(task_id)
    }
}

// Highest rank first, then the earliest start; the id only makes the choice total.
fn pipeline_key(pipeline: &PipelineRecord) -> (TaskStatus, Reverse<DateTime<Utc>>, Reverse<u64>) {
    (
        TaskStatus::from(pipeline.status),
        Reverse(pipeline.started_at),
        Reverse(pipeline.id),
    )
}

fn flag_key(flag: &FlagRecord) -> (DateTime<Utc>, &str) {
    (flag.created_at, flag.id.as_str())
}
