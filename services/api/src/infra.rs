use cohort_grader::error::AppError;
use cohort_grader::grading::{
    FlagRecord, GradingRepository, OverrideRecord, PipelineRecord, RepositoryError, Student,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// JSON snapshot of students and their CI, flag and override history.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GradingDataset {
    #[serde(default)]
    pub(crate) students: Vec<Student>,
    #[serde(default)]
    pub(crate) pipelines: Vec<PipelineRecord>,
    #[serde(default)]
    pub(crate) flags: Vec<FlagRecord>,
    #[serde(default)]
    pub(crate) overrides: Vec<OverrideRecord>,
}

#[derive(Default)]
struct Records {
    students: Vec<Student>,
    pipelines: Vec<PipelineRecord>,
    flags: Vec<FlagRecord>,
    overrides: BTreeMap<(String, String), OverrideRecord>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryGradingRepository {
    records: Arc<Mutex<Records>>,
}

impl InMemoryGradingRepository {
    pub(crate) fn from_dataset(dataset: GradingDataset) -> Self {
        let overrides = dataset
            .overrides
            .into_iter()
            .map(|record| ((record.login.clone(), record.task_id.clone()), record))
            .collect();

        Self {
            records: Arc::new(Mutex::new(Records {
                students: dataset.students,
                pipelines: dataset.pipelines,
                flags: dataset.flags,
                overrides,
            })),
        }
    }
}

/// Builds the repository from `path`, or an empty one when no dataset is configured.
pub(crate) fn load_repository(path: Option<&Path>) -> Result<InMemoryGradingRepository, AppError> {
    let Some(path) = path else {
        return Ok(InMemoryGradingRepository::default());
    };

    let raw = std::fs::read_to_string(path)?;
    let dataset: GradingDataset =
        serde_json::from_str(&raw).map_err(|source| AppError::Dataset {
            path: path.to_path_buf(),
            source,
        })?;
    info!(
        path = %path.display(),
        students = dataset.students.len(),
        pipelines = dataset.pipelines.len(),
        flags = dataset.flags.len(),
        "loaded grading dataset"
    );
    Ok(InMemoryGradingRepository::from_dataset(dataset))
}

impl GradingRepository for InMemoryGradingRepository {
    fn find_student(&self, login: &str) -> Result<Option<Student>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .students
            .iter()
            .find(|student| student.login == login)
            .cloned())
    }

    fn list_group_students(&self, group: &str) -> Result<Vec<Student>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .students
            .iter()
            .filter(|student| student.group_name == group)
            .cloned()
            .collect())
    }

    fn list_project_pipelines(&self, project: &str) -> Result<Vec<PipelineRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .pipelines
            .iter()
            .filter(|pipeline| pipeline.project == project)
            .cloned()
            .collect())
    }

    fn list_all_pipelines(&self) -> Result<Vec<PipelineRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.pipelines.clone())
    }

    fn list_student_flags(&self, login: &str) -> Result<Vec<FlagRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .flags
            .iter()
            .filter(|flag| flag.claimed_by.as_deref() == Some(login))
            .cloned()
            .collect())
    }

    fn list_claimed_flags(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .flags
            .iter()
            .filter(|flag| flag.claimed_by.is_some())
            .cloned()
            .collect())
    }

    fn list_student_overrides(&self, login: &str) -> Result<Vec<OverrideRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .overrides
            .values()
            .filter(|record| record.login == login)
            .cloned()
            .collect())
    }

    fn list_all_overrides(&self) -> Result<Vec<OverrideRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.overrides.values().cloned().collect())
    }

    fn upsert_override(&self, record: OverrideRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard
            .overrides
            .insert((record.login.clone(), record.task_id.clone()), record);
        Ok(())
    }

    fn remove_override(&self, login: &str, task_id: &str) -> Result<bool, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .overrides
            .remove(&(login.to_string(), task_id.to_string()))
            .is_some())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use cohort_grader::grading::PipelineStatus;

    #[test]
    fn dataset_overrides_are_keyed_by_login_and_task() {
        let repository = InMemoryGradingRepository::from_dataset(fixtures::dataset());
        let record = OverrideRecord {
            login: "ada".to_string(),
            task_id: "intro/aplusb".to_string(),
            score: 5,
            status: PipelineStatus::Failed,
        };

        repository.upsert_override(record.clone()).expect("insert");
        repository
            .upsert_override(OverrideRecord { score: 7, ..record })
            .expect("replace");

        let stored = repository.list_student_overrides("ada").expect("listed");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].score, 7);
        assert!(repository.remove_override("ada", "intro/aplusb").expect("removed"));
        assert!(repository.list_all_overrides().expect("listed").is_empty());
    }

    #[test]
    fn claimed_flags_are_filtered_by_login() {
        let repository = InMemoryGradingRepository::from_dataset(fixtures::dataset());
        assert_eq!(repository.list_student_flags("alan").expect("flags").len(), 1);
        assert!(repository.list_student_flags("ada").expect("flags").is_empty());
    }

    #[test]
    fn missing_dataset_path_yields_an_empty_repository() {
        let repository = load_repository(None).expect("empty repository");
        assert!(repository.list_all_pipelines().expect("listed").is_empty());
    }

    #[test]
    fn malformed_dataset_is_reported_with_its_path() {
        let path = std::env::temp_dir().join(format!("cohort-dataset-{}.json", std::process::id()));
        std::fs::write(&path, "{\"students\": 42}").expect("write dataset");

        let error = load_repository(Some(&path)).err().expect("invalid dataset");
        assert!(matches!(error, AppError::Dataset { .. }));
        let _ = std::fs::remove_file(path);
    }
}
