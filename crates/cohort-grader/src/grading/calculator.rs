use chrono::{DateTime, FixedOffset};

use super::course::{TaskDefinition, TaskGroup};
use super::policy::{apply_ratio, ScoringPolicySpec};
use super::records::OverrideRecord;
use super::results::ScoredTask;
use super::signal::{Signal, TaskStatus};

/// Everything the calculator needs to know about where a task sits in the course.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub task: &'a TaskDefinition,
    pub group: &'a TaskGroup,
    pub policy: &'a ScoringPolicySpec,
    pub final_deadline: Option<DateTime<FixedOffset>>,
    pub retake_penalty_ratio: f64,
}

/// Scores one task.
///
/// Steps, in order: non-success signals score zero, submissions after the course-wide
/// cutoff score zero, the policy decays the rest, retaking students are lifted to their
/// floor, and an override replaces everything.
pub fn evaluate(
    ctx: &TaskContext<'_>,
    signal: Option<&Signal>,
    retake: bool,
    override_record: Option<&OverrideRecord>,
) -> ScoredTask {
    let status = signal.map_or(TaskStatus::Assigned, |signal| signal.status);
    let submitted_at = signal.map(|signal| signal.submitted_at);

    let mut score = match signal {
        Some(signal) if signal.status == TaskStatus::Success => {
            let past_cutoff = ctx
                .final_deadline
                .is_some_and(|cutoff| signal.submitted_at > cutoff);
            if past_cutoff {
                0
            } else {
                ctx.policy
                    .score(ctx.task.nominal_score, ctx.group.deadline, signal.submitted_at)
            }
        }
        _ => 0,
    };

    if retake {
        score = score.max(apply_ratio(ctx.task.nominal_score, ctx.retake_penalty_ratio));
    }

    let mut scored = ScoredTask {
        task_id: ctx.task.id.clone(),
        status,
        score,
        max_score: ctx.task.nominal_score,
        overridden: false,
        submitted_at,
        task_url: None,
        pipeline_url: None,
        branch_url: None,
    };

    if let Some(record) = override_record {
        scored.score = record.score;
        scored.status = record.status.into();
        scored.overridden = true;
    }

    scored
}
