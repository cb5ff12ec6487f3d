//! Course definition model: task groups, deadlines, and the named scoring policies and
//! scoring groups they resolve to.
//!
//! A [`CourseDefinition`] can only be obtained through [`CourseDefinition::build`] (or the
//! YAML parser that calls it), so every value in circulation has already had its
//! references checked and its scoring-group maxima derived.

mod parser;
pub mod snapshot;

pub use parser::{parse_course, parse_duration, CourseFormat};
pub use snapshot::{
    run_refresh_loop, CourseCatalog, CourseSnapshotStore, CourseSource, FileCourseSource,
};

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::policy::ScoringPolicySpec;

/// A single gradable task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub id: String,
    pub nominal_score: u32,
    /// Satisfied only by a claimed flag, never by CI.
    pub alternate_proof: bool,
}

/// Tasks sharing a start date and deadline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskGroup {
    pub title: String,
    /// Scoring group name; empty means the course default.
    pub scoring_group_ref: String,
    pub start: DateTime<FixedOffset>,
    pub deadline: DateTime<FixedOffset>,
    pub tasks: Vec<TaskDefinition>,
}

/// Weighted bucket several task groups can share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringGroup {
    pub name: String,
    pub weight: f64,
    pub policy: String,
    max_score: u64,
}

impl ScoringGroup {
    pub fn new(name: impl Into<String>, weight: f64, policy: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight,
            policy: policy.into(),
            max_score: 0,
        }
    }

    /// Sum of nominal scores of every task resolving to this group.
    pub fn max_score(&self) -> u64 {
        self.max_score
    }
}

/// Scoring group and policy a task group resolves to.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedScoring<'a> {
    pub scoring_group: &'a ScoringGroup,
    pub policy: &'a ScoringPolicySpec,
}

/// Parts a course is assembled from before validation.
#[derive(Debug, Clone)]
pub struct CourseParts {
    pub task_groups: Vec<TaskGroup>,
    pub policies: BTreeMap<String, ScoringPolicySpec>,
    pub scoring_groups: Vec<ScoringGroup>,
    pub default_scoring_group: String,
    pub final_deadline: Option<DateTime<FixedOffset>>,
    pub retake_penalty_ratio: f64,
}

/// Validated, immutable course document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseDefinition {
    task_groups: Vec<TaskGroup>,
    policies: BTreeMap<String, ScoringPolicySpec>,
    scoring_groups: BTreeMap<String, ScoringGroup>,
    default_scoring_group: String,
    final_deadline: Option<DateTime<FixedOffset>>,
    retake_penalty_ratio: f64,
}

impl CourseDefinition {
    /// Validates every reference and derives scoring-group maxima.
    pub fn build(parts: CourseParts) -> Result<Self, CourseError> {
        let CourseParts {
            task_groups,
            policies,
            scoring_groups,
            default_scoring_group,
            final_deadline,
            retake_penalty_ratio,
        } = parts;

        for (name, policy) in &policies {
            policy
                .validate()
                .map_err(|reason| CourseError::InvalidPolicy {
                    policy: name.clone(),
                    reason,
                })?;
        }

        if !retake_penalty_ratio.is_finite() || retake_penalty_ratio < 0.0 {
            return Err(CourseError::InvalidRetakeRatio {
                value: retake_penalty_ratio,
            });
        }

        let mut seen = HashSet::new();
        for task in task_groups.iter().flat_map(|group| group.tasks.iter()) {
            if !seen.insert(task.id.as_str()) {
                return Err(CourseError::DuplicateTask {
                    task: task.id.clone(),
                });
            }
        }

        let scoring_groups = scoring_groups
            .into_iter()
            .map(|mut group| {
                group.max_score = 0;
                (group.name.clone(), group)
            })
            .collect();

        let mut course = Self {
            task_groups,
            policies,
            scoring_groups,
            default_scoring_group,
            final_deadline,
            retake_penalty_ratio,
        };

        for group in &course.scoring_groups {
            if !course.policies.contains_key(&group.1.policy) {
                return Err(CourseError::UnknownPolicy {
                    scoring_group: group.0.clone(),
                    policy: group.1.policy.clone(),
                });
            }
        }

        let mut max_scores: BTreeMap<String, u64> = BTreeMap::new();
        for group in &course.task_groups {
            let resolved = course.resolve(group)?;
            let total: u64 = group
                .tasks
                .iter()
                .map(|task| u64::from(task.nominal_score))
                .sum();
            *max_scores
                .entry(resolved.scoring_group.name.clone())
                .or_default() += total;
        }
        for (name, total) in max_scores {
            if let Some(group) = course.scoring_groups.get_mut(&name) {
                group.max_score = total;
            }
        }

        Ok(course)
    }

    pub fn task_groups(&self) -> &[TaskGroup] {
        &self.task_groups
    }

    pub fn scoring_groups(&self) -> impl Iterator<Item = &ScoringGroup> {
        self.scoring_groups.values()
    }

    pub fn scoring_group(&self, name: &str) -> Option<&ScoringGroup> {
        self.scoring_groups.get(name)
    }

    pub fn policy(&self, name: &str) -> Option<&ScoringPolicySpec> {
        self.policies.get(name)
    }

    pub fn default_scoring_group(&self) -> &str {
        &self.default_scoring_group
    }

    pub fn final_deadline(&self) -> Option<DateTime<FixedOffset>> {
        self.final_deadline
    }

    pub fn retake_penalty_ratio(&self) -> f64 {
        self.retake_penalty_ratio
    }

    /// Scoring group name after substituting the course default for an empty reference.
    pub fn scoring_group_name<'a>(&'a self, group: &'a TaskGroup) -> &'a str {
        if group.scoring_group_ref.is_empty() {
            &self.default_scoring_group
        } else {
            &group.scoring_group_ref
        }
    }

    pub fn resolve(&self, group: &TaskGroup) -> Result<ResolvedScoring<'_>, CourseError> {
        let name = self.scoring_group_name(group);
        let scoring_group =
            self.scoring_groups
                .get(name)
                .ok_or_else(|| CourseError::UnknownScoringGroup {
                    task_group: group.title.clone(),
                    scoring_group: name.to_string(),
                })?;
        let policy =
            self.policies
                .get(&scoring_group.policy)
                .ok_or_else(|| CourseError::UnknownPolicy {
                    scoring_group: scoring_group.name.clone(),
                    policy: scoring_group.policy.clone(),
                })?;
        Ok(ResolvedScoring {
            scoring_group,
            policy,
        })
    }

    pub fn find_task(&self, task_id: &str) -> Option<(&TaskGroup, &TaskDefinition)> {
        self.task_groups.iter().find_map(|group| {
            group
                .tasks
                .iter()
                .find(|task| task.id == task_id)
                .map(|task| (group, task))
        })
    }

    /// Copy with task groups in reverse order, for newest-first presentation.
    pub fn newest_first(&self) -> Self {
        let mut course = self.clone();
        course.task_groups.reverse();
        course
    }
}

/// Failures raised while loading or validating a course definition.
#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error("malformed course definition: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid date '{value}', expected DD-MM-YYYY HH:MM or RFC 3339")]
    InvalidDate { value: String },
    #[error("invalid duration '{value}', expected values like 5d, 120h or 1h30m")]
    InvalidDuration { value: String },
    #[error("invalid timezone '{value}', expected an offset like +03:00")]
    InvalidTimezone { value: String },
    #[error("scoring policy '{policy}' has unknown kind '{kind}'")]
    UnknownPolicyKind { policy: String, kind: String },
    #[error("scoring policy '{policy}' is invalid: {reason}")]
    InvalidPolicy { policy: String, reason: String },
    #[error("retake penalty ratio {value} must be a non-negative number")]
    InvalidRetakeRatio { value: f64 },
    #[error("task group '{task_group}' references unknown scoring group '{scoring_group}'")]
    UnknownScoringGroup {
        task_group: String,
        scoring_group: String,
    },
    #[error("scoring group '{scoring_group}' references unknown policy '{policy}'")]
    UnknownPolicy {
        scoring_group: String,
        policy: String,
    },
    #[error("task '{task}' is defined more than once")]
    DuplicateTask { task: String },
    #[error("failed to read course definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("course definition for group '{group}': {source}")]
    Group {
        group: String,
        #[source]
        source: Box<CourseError>,
    },
}
