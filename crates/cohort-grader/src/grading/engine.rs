use std::collections::HashMap;
use std::sync::Arc;

use super::aggregate::{overrides_by_task, score_student, StudentInputs};
use super::course::{CourseCatalog, CourseDefinition, CourseError};
use super::platform::ProjectLinks;
use super::records::Student;
use super::repository::{GradingRepository, RepositoryError};
use super::results::{Standings, UserScores};
use super::signal::StudentSignals;
use super::standings::{rank, CohortIndex};

/// Turns repository records into scores against an explicit course snapshot.
///
/// The engine holds no course state of its own; every call names the catalog it grades
/// against, so concurrent callers on different snapshots never interfere.
pub struct GradingEngine<R> {
    repository: Arc<R>,
    links: Arc<dyn ProjectLinks>,
}

impl<R> GradingEngine<R>
where
    R: GradingRepository + 'static,
{
    pub fn new(repository: Arc<R>, links: Arc<dyn ProjectLinks>) -> Self {
        Self { repository, links }
    }

    /// Scores one student, fetching only their project's pipelines and their own flags.
    pub fn compute_student_scores(
        &self,
        student: &Student,
        catalog: &CourseCatalog,
    ) -> Result<UserScores, GradingError> {
        let course = course_for(catalog, &student.group_name)?;
        let project = self.links.project_name(student);

        let pipelines = self.repository.list_project_pipelines(&project)?;
        let flags = self.repository.list_student_flags(&student.login)?;
        let overrides = self.repository.list_student_overrides(&student.login)?;

        let signals = StudentSignals::reconcile(&student.login, &pipelines, &flags);
        let overrides = overrides_by_task(
            overrides
                .iter()
                .filter(|record| record.login == student.login),
        );

        let inputs = StudentInputs {
            student,
            project: &project,
            signals: &signals,
            overrides: &overrides,
        };
        Ok(score_student(&course, inputs, self.links.as_ref())?)
    }

    /// Scores every student of `group` from three cohort-wide reads and ranks them.
    pub fn compute_standings(
        &self,
        group: &str,
        catalog: &CourseCatalog,
        filter: Option<&dyn Fn(&Student) -> bool>,
    ) -> Result<Standings, GradingError> {
        let course = course_for(catalog, group)?;

        let students = self.repository.list_group_students(group)?;
        let index = CohortIndex::new(
            self.repository.list_all_pipelines()?,
            self.repository.list_claimed_flags()?,
            self.repository.list_all_overrides()?,
        );

        let no_overrides = HashMap::new();
        let mut users = Vec::with_capacity(students.len());
        for student in students
            .iter()
            .filter(|student| filter.map_or(true, |keep| keep(*student)))
        {
            let project = self.links.project_name(student);
            let signals = index.signals_for(&student.login, &project);
            let inputs = StudentInputs {
                student,
                project: &project,
                signals: &signals,
                overrides: index.overrides_for(&student.login).unwrap_or(&no_overrides),
            };
            users.push(score_student(&course, inputs, self.links.as_ref())?);
        }
        rank(&mut users);

        Ok(Standings {
            group: group.to_string(),
            course: CourseDefinition::clone(&course),
            users,
        })
    }
}

fn course_for(catalog: &CourseCatalog, group: &str) -> Result<Arc<CourseDefinition>, GradingError> {
    catalog
        .for_group(group)
        .ok_or_else(|| GradingError::NotGradedYet {
            group: group.to_string(),
        })
}

/// Errors surfaced by grading calls.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("no course definition published for group '{group}' yet")]
    NotGradedYet { group: String },
    #[error("student '{login}' not found")]
    StudentNotFound { login: String },
    #[error("invalid override: {reason}")]
    InvalidOverride { reason: String },
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
