use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cache::StandingsCache;
use super::course::CourseSnapshotStore;
use super::engine::{GradingEngine, GradingError};
use super::platform::ProjectLinks;
use super::records::{OverrideRecord, Student};
use super::repository::GradingRepository;
use super::results::{Standings, UserScores};

/// Which students of a group a standings view covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortFilter {
    #[default]
    All,
    Retakes,
}

impl CohortFilter {
    fn keeps(self, student: &Student) -> bool {
        match self {
            CohortFilter::All => true,
            CohortFilter::Retakes => student.retake,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CohortFilter::All => "all",
            CohortFilter::Retakes => "retakes",
        }
    }
}

/// Service composing the live course snapshot, repository, and standings cache.
pub struct GradingService<R> {
    courses: Arc<CourseSnapshotStore>,
    repository: Arc<R>,
    engine: GradingEngine<R>,
    cache: StandingsCache,
}

impl<R> GradingService<R>
where
    R: GradingRepository + 'static,
{
    pub fn new(
        courses: Arc<CourseSnapshotStore>,
        repository: Arc<R>,
        links: Arc<dyn ProjectLinks>,
        standings_ttl: Duration,
    ) -> Self {
        let engine = GradingEngine::new(repository.clone(), links);
        Self {
            courses,
            repository,
            engine,
            cache: StandingsCache::new(standings_ttl),
        }
    }

    pub fn courses(&self) -> &Arc<CourseSnapshotStore> {
        &self.courses
    }

    /// Scores a single student against the catalog live at call time.
    pub fn student_scores(&self, login: &str) -> Result<UserScores, GradingError> {
        let student = self
            .repository
            .find_student(login)?
            .ok_or_else(|| GradingError::StudentNotFound {
                login: login.to_string(),
            })?;
        let catalog = self.courses.current();
        self.engine.compute_student_scores(&student, &catalog)
    }

    /// Ranked standings for `group`, served from cache while fresh.
    pub fn standings(
        &self,
        group: &str,
        filter: CohortFilter,
    ) -> Result<Arc<Standings>, GradingError> {
        let catalog = self.courses.current();
        if let Some(cached) = self.cache.get(group, filter, &catalog) {
            debug!(group, filter = filter.label(), "standings cache hit");
            return Ok(cached);
        }

        debug!(group, filter = filter.label(), "standings cache miss");
        let keep: &dyn Fn(&Student) -> bool = &|student| filter.keeps(student);
        let standings = Arc::new(self.engine.compute_standings(group, &catalog, Some(keep))?);
        self.cache
            .put(group, filter, catalog.clone(), standings.clone());
        Ok(standings)
    }

    /// Stores a manual correction; the latest write for a (login, task) pair wins.
    pub fn override_score(&self, record: OverrideRecord) -> Result<(), GradingError> {
        if record.login.trim().is_empty() || record.task_id.trim().is_empty() {
            return Err(GradingError::InvalidOverride {
                reason: "login and task_id are required".to_string(),
            });
        }

        let (login, task, score) = (record.login.clone(), record.task_id.clone(), record.score);
        self.repository.upsert_override(record)?;
        self.cache.invalidate();
        info!(login = %login, task = %task, score, "override stored");
        Ok(())
    }

    /// Deletes a manual correction, returning whether one existed.
    pub fn remove_override(&self, login: &str, task_id: &str) -> Result<bool, GradingError> {
        let removed = self.repository.remove_override(login, task_id)?;
        if removed {
            self.cache.invalidate();
            info!(login, task = task_id, "override removed");
        }
        Ok(removed)
    }
}
