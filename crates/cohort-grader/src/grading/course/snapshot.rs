use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{parse_course, CourseDefinition, CourseError};
use crate::config::CourseSourceConfig;

/// Course definitions keyed by enrolled group. Never mutated once published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseCatalog {
    courses: BTreeMap<String, Arc<CourseDefinition>>,
}

impl CourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, group: impl Into<String>, course: CourseDefinition) -> Self {
        self.courses.insert(group.into(), Arc::new(course));
        self
    }

    pub fn for_group(&self, group: &str) -> Option<Arc<CourseDefinition>> {
        self.courses.get(group).cloned()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

/// Anything able to produce a complete catalog in one go.
pub trait CourseSource: Send + Sync {
    fn load_catalog(&self) -> Result<CourseCatalog, CourseError>;
}

/// Reads every configured course definition file.
#[derive(Debug, Clone)]
pub struct FileCourseSource {
    sources: Vec<CourseSourceConfig>,
}

impl FileCourseSource {
    pub fn new(sources: Vec<CourseSourceConfig>) -> Self {
        Self { sources }
    }
}

impl CourseSource for FileCourseSource {
    fn load_catalog(&self) -> Result<CourseCatalog, CourseError> {
        let mut catalog = CourseCatalog::new();
        for source in &self.sources {
            let raw = std::fs::read_to_string(&source.path).map_err(|err| CourseError::Io {
                path: source.path.clone(),
                source: err,
            })?;
            let course =
                parse_course(&raw, source.format).map_err(|err| CourseError::Group {
                    group: source.group.clone(),
                    source: Box::new(err),
                })?;
            debug!(
                group = %source.group,
                task_groups = course.task_groups().len(),
                "fetched course definition"
            );
            catalog = catalog.with_course(source.group.clone(), course);
        }
        Ok(catalog)
    }
}

/// Single-writer, multi-reader holder of the live catalog.
///
/// Readers clone the current `Arc` and keep using it even if a refresh publishes a new
/// catalog mid-request.
#[derive(Debug, Default)]
pub struct CourseSnapshotStore {
    current: RwLock<Arc<CourseCatalog>>,
}

impl CourseSnapshotStore {
    pub fn new(catalog: CourseCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn current(&self) -> Arc<CourseCatalog> {
        self.current
            .read()
            .expect("course snapshot lock poisoned")
            .clone()
    }

    /// Publishes `catalog`, returning whether its content differs from the previous one.
    pub fn replace(&self, catalog: CourseCatalog) -> bool {
        let next = Arc::new(catalog);
        let previous = {
            let mut guard = self.current.write().expect("course snapshot lock poisoned");
            std::mem::replace(&mut *guard, next.clone())
        };
        *previous != *next
    }

    /// Loads a full catalog from `source`; on failure the previous catalog stays live.
    pub fn refresh(&self, source: &dyn CourseSource) -> Result<bool, CourseError> {
        debug!("start course refresh");
        let catalog = source.load_catalog()?;
        let groups = catalog.len();
        let changed = self.replace(catalog);
        if changed {
            info!(groups, "updated course definitions");
        } else {
            debug!(groups, "course definitions unchanged");
        }
        Ok(changed)
    }
}

/// Refreshes `store` from `source` every `period` until the task is dropped.
pub async fn run_refresh_loop(
    store: Arc<CourseSnapshotStore>,
    source: Arc<dyn CourseSource>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    // the first tick completes immediately; the caller has already loaded once
    ticker.tick().await;
    loop {
        ticker.tick().await;
        // refresh does blocking file I/O
        let (pending_store, pending_source) = (store.clone(), source.clone());
        let outcome =
            tokio::task::spawn_blocking(move || pending_store.refresh(pending_source.as_ref()))
                .await;
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "course refresh failed, keeping previous snapshot");
            }
            Err(err) => warn!(error = %err, "course refresh task did not complete"),
        }
    }
}
