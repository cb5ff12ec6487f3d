use std::cmp::Ordering;
use std::collections::HashMap;

use super::aggregate::overrides_by_task;
use super::records::{FlagRecord, OverrideRecord, PipelineRecord};
use super::results::UserScores;
use super::signal::StudentSignals;

/// Cohort-wide records partitioned once so per-student lookups never hit storage.
#[derive(Debug, Default)]
pub struct CohortIndex {
    pipelines_by_project: HashMap<String, Vec<PipelineRecord>>,
    flags_by_login: HashMap<String, Vec<FlagRecord>>,
    overrides_by_login: HashMap<String, HashMap<String, OverrideRecord>>,
}

impl CohortIndex {
    pub fn new(
        pipelines: Vec<PipelineRecord>,
        flags: Vec<FlagRecord>,
        overrides: Vec<OverrideRecord>,
    ) -> Self {
        let mut pipelines_by_project: HashMap<String, Vec<PipelineRecord>> = HashMap::new();
        for pipeline in pipelines {
            pipelines_by_project
                .entry(pipeline.project.clone())
                .or_default()
                .push(pipeline);
        }

        let mut flags_by_login: HashMap<String, Vec<FlagRecord>> = HashMap::new();
        for flag in flags {
            if let Some(login) = flag.claimed_by.clone() {
                flags_by_login.entry(login).or_default().push(flag);
            }
        }

        let mut grouped: HashMap<String, Vec<OverrideRecord>> = HashMap::new();
        for record in overrides {
            grouped.entry(record.login.clone()).or_default().push(record);
        }
        let overrides_by_login = grouped
            .into_iter()
            .map(|(login, records)| (login, overrides_by_task(&records)))
            .collect();

        Self {
            pipelines_by_project,
            flags_by_login,
            overrides_by_login,
        }
    }

    pub fn signals_for(&self, login: &str, project: &str) -> StudentSignals {
        let pipelines = self
            .pipelines_by_project
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let flags = self
            .flags_by_login
            .get(login)
            .map(Vec::as_slice)
            .unwrap_or_default();
        StudentSignals::reconcile(login, pipelines, flags)
    }

    pub fn overrides_for(&self, login: &str) -> Option<&HashMap<String, OverrideRecord>> {
        self.overrides_by_login.get(login)
    }
}

/// Highest final mark first, ties broken by "Last First" ascending.
pub fn rank(users: &mut [UserScores]) {
    users.sort_by(compare_standing);
}

fn compare_standing(left: &UserScores, right: &UserScores) -> Ordering {
    right
        .final_mark
        .total_cmp(&left.final_mark)
        .then_with(|| left.student.sort_name().cmp(&right.student.sort_name()))
}
