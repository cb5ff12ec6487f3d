use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::course::CourseCatalog;
use super::results::Standings;
use super::service::CohortFilter;

struct CachedStandings {
    catalog: Arc<CourseCatalog>,
    computed_at: Instant,
    standings: Arc<Standings>,
}

/// Short-lived standings memo keyed by group and cohort filter.
///
/// An entry is only served while it is younger than the TTL and was computed from the
/// catalog that is live right now.
pub struct StandingsCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, CohortFilter), CachedStandings>>,
}

impl StandingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        group: &str,
        filter: CohortFilter,
        catalog: &Arc<CourseCatalog>,
    ) -> Option<Arc<Standings>> {
        let entries = self.entries.lock().expect("standings cache poisoned");
        entries
            .get(&(group.to_string(), filter))
            .filter(|entry| {
                Arc::ptr_eq(&entry.catalog, catalog) && entry.computed_at.elapsed() < self.ttl
            })
            .map(|entry| entry.standings.clone())
    }

    pub fn put(
        &self,
        group: &str,
        filter: CohortFilter,
        catalog: Arc<CourseCatalog>,
        standings: Arc<Standings>,
    ) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().expect("standings cache poisoned");
        entries.insert(
            (group.to_string(), filter),
            CachedStandings {
                catalog,
                computed_at: Instant::now(),
                standings,
            },
        );
    }

    pub fn invalidate(&self) {
        self.entries.lock().expect("standings cache poisoned").clear();
    }
}
