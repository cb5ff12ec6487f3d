use std::collections::HashMap;

use super::calculator::{evaluate, TaskContext};
use super::course::{CourseDefinition, CourseError};
use super::platform::ProjectLinks;
use super::records::{OverrideRecord, Student};
use super::results::{pretty_title, ScoredTaskGroup, StudentSummary, UserScores};
use super::signal::{SignalOrigin, StudentSignals};

/// Overrides for one student keyed by task id; later records replace earlier ones.
pub fn overrides_by_task<'a, I>(records: I) -> HashMap<String, OverrideRecord>
where
    I: IntoIterator<Item = &'a OverrideRecord>,
{
    records
        .into_iter()
        .map(|record| (record.task_id.clone(), record.clone()))
        .collect()
}

/// Already-reconciled inputs for one student.
#[derive(Debug, Clone, Copy)]
pub struct StudentInputs<'a> {
    pub student: &'a Student,
    pub project: &'a str,
    pub signals: &'a StudentSignals,
    pub overrides: &'a HashMap<String, OverrideRecord>,
}

/// Scores every task of `course` and folds them into group totals and the final mark.
pub fn score_student(
    course: &CourseDefinition,
    inputs: StudentInputs<'_>,
    links: &dyn ProjectLinks,
) -> Result<UserScores, CourseError> {
    let mut groups = Vec::with_capacity(course.task_groups().len());
    let mut final_mark = 0.0;

    for group in course.task_groups() {
        let resolved = course.resolve(group)?;
        let mut tasks = Vec::with_capacity(group.tasks.len());

        for task in &group.tasks {
            let ctx = TaskContext {
                task,
                group,
                policy: resolved.policy,
                final_deadline: course.final_deadline(),
                retake_penalty_ratio: course.retake_penalty_ratio(),
            };
            let signal = inputs.signals.signal_for(task);
            let mut scored = evaluate(
                &ctx,
                signal.as_ref(),
                inputs.student.retake,
                inputs.overrides.get(&task.id),
            );

            scored.task_url = links.task_url(&task.id);
            scored.branch_url = Some(links.task_branch_url(inputs.project, &task.id));
            scored.pipeline_url = match signal.map(|signal| signal.origin) {
                Some(SignalOrigin::Pipeline { id }) => Some(links.pipeline_url(inputs.project, id)),
                _ => None,
            };
            tasks.push(scored);
        }

        let score: u64 = tasks.iter().map(|task| u64::from(task.score)).sum();
        let max_score: u64 = tasks.iter().map(|task| u64::from(task.max_score)).sum();

        let scoring_group = resolved.scoring_group;
        if scoring_group.max_score() > 0 {
            final_mark += scoring_group.weight * score as f64 / scoring_group.max_score() as f64;
        }

        groups.push(ScoredTaskGroup {
            title: group.title.clone(),
            pretty_title: pretty_title(&group.title),
            scoring_group: scoring_group.name.clone(),
            deadline: group.deadline,
            tasks,
            score,
            max_score,
        });
    }

    let score: u64 = groups.iter().map(|group| group.score).sum();
    let max_score: u64 = groups.iter().map(|group| group.max_score).sum();

    Ok(UserScores {
        student: StudentSummary::from_student(inputs.student, inputs.project.to_string(), links),
        groups,
        score,
        max_score,
        final_mark,
    })
}
