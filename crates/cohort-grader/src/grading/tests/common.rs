use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{PlatformConfig, PlatformKind};
use crate::grading::course::{
    parse_course, CourseCatalog, CourseDefinition, CourseFormat, CourseSnapshotStore,
};
use crate::grading::platform::{links_for, ProjectLinks};
use crate::grading::records::{
    FlagRecord, OverrideRecord, PipelineRecord, PipelineStatus, Student,
};
use crate::grading::repository::{GradingRepository, RepositoryError};
use crate::grading::service::GradingService;

pub(super) const GROUP: &str = "hse-2024";

pub(super) const COURSE: &str = r#"
timezone: "+00:00"
retakePenaltyRatio: 0.5
finalDeadline: 31-12-2024 23:59
scoring:
  defaultGroup: weekly
  policies:
    - name: soft
      kind: exp
      spec:
        halfLife: 5d
        floorRatio: 0.3
    - name: notsohard
      kind: linear
      spec:
        gracePeriod: 168h
        floorMultiplier: 0.5
  groups:
    - name: weekly
      weight: 6.0
      policy: soft
    - name: exams
      weight: 4.0
      policy: notsohard
assignments:
  - title: 01-intro
    start: 01-09-2024 00:00
    deadline: 15-09-2024 20:00
    tasks:
      - task: intro/aplusb
        score: 100
      - task: intro/crashme
        score: 50
        alternateProof: true
  - title: 02-exam
    group: exams
    start: 01-10-2024 10:00
    deadline: 01-10-2024 14:00
    tasks:
      - task: exam/bigint
        score: 100
"#;

pub(super) fn course() -> CourseDefinition {
    parse_course(COURSE, CourseFormat::V2).expect("test course parses")
}

pub(super) fn catalog() -> CourseCatalog {
    CourseCatalog::new().with_course(GROUP, course())
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn student(login: &str, first: &str, last: &str, retake: bool) -> Student {
    Student {
        login: login.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        group_name: GROUP.to_string(),
        retake,
    }
}

pub(super) fn ada() -> Student {
    student("ada", "Ada", "Lovelace", false)
}

pub(super) fn alan() -> Student {
    student("alan", "Alan", "Turing", true)
}

pub(super) fn platform() -> PlatformConfig {
    PlatformConfig {
        kind: PlatformKind::Gitlab,
        base_url: "https://gitlab.example.org".to_string(),
        namespace: "hse".to_string(),
        task_url_prefix: "https://course.example.org/tasks".to_string(),
    }
}

pub(super) fn links() -> Arc<dyn ProjectLinks> {
    links_for(&platform())
}

pub(super) fn project_of(student: &Student) -> String {
    links().project_name(student)
}

pub(super) fn pipeline(
    id: u64,
    owner: &Student,
    task: &str,
    status: PipelineStatus,
    started_at: DateTime<Utc>,
) -> PipelineRecord {
    PipelineRecord {
        id,
        project: project_of(owner),
        task_id: task.to_string(),
        status,
        started_at,
    }
}

pub(super) fn flag(
    id: &str,
    task: &str,
    created_at: DateTime<Utc>,
    claimed_by: Option<&str>,
) -> FlagRecord {
    FlagRecord {
        id: id.to_string(),
        task_id: task.to_string(),
        created_at,
        claimed_by: claimed_by.map(str::to_string),
    }
}

pub(super) fn override_record(
    login: &str,
    task: &str,
    score: u32,
    status: PipelineStatus,
) -> OverrideRecord {
    OverrideRecord {
        login: login.to_string(),
        task_id: task.to_string(),
        score,
        status,
    }
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    pub(super) students: Mutex<Vec<Student>>,
    pub(super) pipelines: Mutex<Vec<PipelineRecord>>,
    pub(super) flags: Mutex<Vec<FlagRecord>>,
    pub(super) overrides: Mutex<HashMap<(String, String), OverrideRecord>>,
    pub(super) project_queries: AtomicUsize,
    pub(super) cohort_queries: AtomicUsize,
}

impl MemoryRepository {
    pub(super) fn seeded() -> Self {
        let repository = Self::default();
        repository.add_student(ada());
        repository.add_student(alan());
        repository.add_pipeline(pipeline(
            1,
            &ada(),
            "intro/aplusb",
            PipelineStatus::Success,
            at(2024, 9, 10, 12, 0),
        ));
        repository.add_pipeline(pipeline(
            2,
            &ada(),
            "exam/bigint",
            PipelineStatus::Success,
            at(2024, 10, 1, 13, 0),
        ));
        repository.add_flag(flag(
            "flag-1",
            "intro/crashme",
            at(2024, 9, 12, 9, 30),
            Some("ada"),
        ));
        repository.add_pipeline(pipeline(
            3,
            &alan(),
            "intro/aplusb",
            PipelineStatus::Failed,
            at(2024, 9, 11, 8, 0),
        ));
        repository
    }

    pub(super) fn add_student(&self, student: Student) {
        self.students
            .lock()
            .expect("repository mutex poisoned")
            .push(student);
    }

    pub(super) fn add_pipeline(&self, pipeline: PipelineRecord) {
        self.pipelines
            .lock()
            .expect("repository mutex poisoned")
            .push(pipeline);
    }

    pub(super) fn add_flag(&self, flag: FlagRecord) {
        self.flags
            .lock()
            .expect("repository mutex poisoned")
            .push(flag);
    }

    pub(super) fn project_queries(&self) -> usize {
        self.project_queries.load(Ordering::SeqCst)
    }

    pub(super) fn cohort_queries(&self) -> usize {
        self.cohort_queries.load(Ordering::SeqCst)
    }
}

impl GradingRepository for MemoryRepository {
    fn find_student(&self, login: &str) -> Result<Option<Student>, RepositoryError> {
        let guard = self.students.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|student| student.login == login).cloned())
    }

    fn list_group_students(&self, group: &str) -> Result<Vec<Student>, RepositoryError> {
        let guard = self.students.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|student| student.group_name == group)
            .cloned()
            .collect())
    }

    fn list_project_pipelines(
        &self,
        project: &str,
    ) -> Result<Vec<PipelineRecord>, RepositoryError> {
        self.project_queries.fetch_add(1, Ordering::SeqCst);
        let guard = self.pipelines.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|pipeline| pipeline.project == project)
            .cloned()
            .collect())
    }

    fn list_all_pipelines(&self) -> Result<Vec<PipelineRecord>, RepositoryError> {
        self.cohort_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pipelines
            .lock()
            .expect("repository mutex poisoned")
            .clone())
    }

    fn list_student_flags(&self, login: &str) -> Result<Vec<FlagRecord>, RepositoryError> {
        let guard = self.flags.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|flag| flag.claimed_by.as_deref() == Some(login))
            .cloned()
            .collect())
    }

    fn list_claimed_flags(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        let guard = self.flags.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|flag| flag.claimed_by.is_some())
            .cloned()
            .collect())
    }

    fn list_student_overrides(&self, login: &str) -> Result<Vec<OverrideRecord>, RepositoryError> {
        let guard = self.overrides.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.login == login)
            .cloned()
            .collect())
    }

    fn list_all_overrides(&self) -> Result<Vec<OverrideRecord>, RepositoryError> {
        let guard = self.overrides.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn upsert_override(&self, record: OverrideRecord) -> Result<(), RepositoryError> {
        let mut guard = self.overrides.lock().expect("repository mutex poisoned");
        guard.insert((record.login.clone(), record.task_id.clone()), record);
        Ok(())
    }

    fn remove_override(&self, login: &str, task_id: &str) -> Result<bool, RepositoryError> {
        let mut guard = self.overrides.lock().expect("repository mutex poisoned");
        Ok(guard
            .remove(&(login.to_string(), task_id.to_string()))
            .is_some())
    }
}

pub(super) struct UnavailableRepository;

impl GradingRepository for UnavailableRepository {
    fn find_student(&self, login: &str) -> Result<Option<Student>, RepositoryError> {
        Ok(Some(student(login, "Grace", "Hopper", false)))
    }

    fn list_group_students(&self, _group: &str) -> Result<Vec<Student>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_project_pipelines(
        &self,
        _project: &str,
    ) -> Result<Vec<PipelineRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_all_pipelines(&self) -> Result<Vec<PipelineRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_student_flags(&self, _login: &str) -> Result<Vec<FlagRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_claimed_flags(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_student_overrides(&self, _login: &str) -> Result<Vec<OverrideRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_all_overrides(&self) -> Result<Vec<OverrideRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_override(&self, _record: OverrideRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove_override(&self, _login: &str, _task_id: &str) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_service() -> (GradingService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::seeded());
    let service = service_with(repository.clone(), Duration::from_secs(60));
    (service, repository)
}

pub(super) fn service_with<R>(repository: Arc<R>, ttl: Duration) -> GradingService<R>
where
    R: GradingRepository + 'static,
{
    let store = Arc::new(CourseSnapshotStore::new(catalog()));
    GradingService::new(store, repository, links(), ttl)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
