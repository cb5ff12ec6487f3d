use super::records::{FlagRecord, OverrideRecord, PipelineRecord, Student};

/// Data-access contract the grading engine reads already-materialized records through.
///
/// Implementations own persistence and retries; the engine only propagates their errors.
pub trait GradingRepository: Send + Sync {
    fn find_student(&self, login: &str) -> Result<Option<Student>, RepositoryError>;
    fn list_group_students(&self, group: &str) -> Result<Vec<Student>, RepositoryError>;

    fn list_project_pipelines(&self, project: &str) -> Result<Vec<PipelineRecord>, RepositoryError>;
    fn list_all_pipelines(&self) -> Result<Vec<PipelineRecord>, RepositoryError>;

    fn list_student_flags(&self, login: &str) -> Result<Vec<FlagRecord>, RepositoryError>;
    fn list_claimed_flags(&self) -> Result<Vec<FlagRecord>, RepositoryError>;

    fn list_student_overrides(&self, login: &str) -> Result<Vec<OverrideRecord>, RepositoryError>;
    fn list_all_overrides(&self) -> Result<Vec<OverrideRecord>, RepositoryError>;

    /// Inserts or replaces the override stored for `(record.login, record.task_id)`.
    fn upsert_override(&self, record: OverrideRecord) -> Result<(), RepositoryError>;
    /// Returns whether an override existed.
    fn remove_override(&self, login: &str, task_id: &str) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
