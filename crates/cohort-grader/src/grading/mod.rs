//! Grading engine: reconciles CI pipelines, claimed flags and manual overrides into
//! per-task scores, then rolls them up into student results and cohort standings.
//!
//! Everything from [`signal`] through [`standings`] is pure and synchronous. I/O lives
//! behind [`GradingRepository`], and course documents arrive as immutable snapshots from
//! [`course::CourseSnapshotStore`].

pub(crate) mod aggregate;
pub(crate) mod cache;
pub(crate) mod calculator;
pub mod course;
pub mod engine;
pub mod platform;
pub mod policy;
pub mod records;
pub mod repository;
pub mod results;
pub mod router;
pub mod service;
pub mod signal;
pub(crate) mod standings;

#[cfg(test)]
mod tests;

pub use aggregate::{overrides_by_task, score_student, StudentInputs};
pub use calculator::{evaluate, TaskContext};
pub use course::{
    parse_course, CourseCatalog, CourseDefinition, CourseError, CourseFormat,
    CourseSnapshotStore, CourseSource, FileCourseSource,
};
pub use engine::{GradingEngine, GradingError};
pub use platform::{links_for, GiteaLinks, GitlabLinks, ProjectLinks};
pub use policy::ScoringPolicySpec;
pub use records::{FlagRecord, OverrideRecord, PipelineRecord, PipelineStatus, Student};
pub use repository::{GradingRepository, RepositoryError};
pub use results::{ScoredTask, ScoredTaskGroup, Standings, StudentSummary, UserScores};
pub use router::grading_router;
pub use service::{CohortFilter, GradingService};
pub use signal::{Signal, SignalOrigin, StudentSignals, TaskStatus};
pub use standings::{rank, CohortIndex};
