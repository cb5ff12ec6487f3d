//! Link builders for the code hosting back ends student repositories live on.
//!
//! Exactly one implementation is chosen at startup; grading code only sees
//! [`ProjectLinks`].

use std::sync::Arc;

use super::records::Student;
use crate::config::{PlatformConfig, PlatformKind};

pub trait ProjectLinks: Send + Sync {
    fn base_url(&self) -> &str;
    fn namespace(&self) -> &str;
    fn task_url_prefix(&self) -> &str;

    fn pipeline_url(&self, project: &str, pipeline_id: u64) -> String;
    fn submits_url(&self, project: &str) -> String;
    fn task_branch_url(&self, project: &str, task_id: &str) -> String;

    /// Repository name derived from the student's group, name and login.
    fn project_name(&self, student: &Student) -> String {
        format!(
            "{}-{}-{}-{}",
            student.group_name,
            cleanup_name(&student.first_name),
            cleanup_name(&student.last_name),
            cleanup_login(&student.login)
        )
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/{}/{}", self.base_url(), self.namespace(), project)
    }

    /// Task description link, absent when no prefix is configured.
    fn task_url(&self, task_id: &str) -> Option<String> {
        let prefix = self.task_url_prefix();
        if prefix.is_empty() {
            None
        } else {
            Some(format!("{prefix}/{task_id}"))
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitlabLinks {
    config: PlatformConfig,
}

impl GitlabLinks {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }
}

impl ProjectLinks for GitlabLinks {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn task_url_prefix(&self) -> &str {
        &self.config.task_url_prefix
    }

    fn pipeline_url(&self, project: &str, pipeline_id: u64) -> String {
        format!("{}/-/pipelines/{pipeline_id}", self.project_url(project))
    }

    fn submits_url(&self, project: &str) -> String {
        format!("{}/-/jobs", self.project_url(project))
    }

    fn task_branch_url(&self, project: &str, task_id: &str) -> String {
        format!("{}/-/tree/submits/{task_id}", self.project_url(project))
    }
}

#[derive(Debug, Clone)]
pub struct GiteaLinks {
    config: PlatformConfig,
}

impl GiteaLinks {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }
}

impl ProjectLinks for GiteaLinks {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn task_url_prefix(&self) -> &str {
        &self.config.task_url_prefix
    }

    fn pipeline_url(&self, project: &str, pipeline_id: u64) -> String {
        format!("{}/actions/runs/{pipeline_id}", self.project_url(project))
    }

    fn submits_url(&self, project: &str) -> String {
        format!("{}/actions", self.project_url(project))
    }

    fn task_branch_url(&self, project: &str, task_id: &str) -> String {
        format!("{}/src/branch/{task_id}", self.project_url(project))
    }
}

pub fn links_for(config: &PlatformConfig) -> Arc<dyn ProjectLinks> {
    match config.kind {
        PlatformKind::Gitlab => Arc::new(GitlabLinks::new(config.clone())),
        PlatformKind::Gitea => Arc::new(GiteaLinks::new(config.clone())),
    }
}

fn cleanup_name(name: &str) -> String {
    name.replace(['-', '\''], "")
}

fn cleanup_login(login: &str) -> String {
    login.replace("__", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            login: "o__brien".to_string(),
            first_name: "Anna-Maria".to_string(),
            last_name: "O'Brien".to_string(),
            group_name: "hse".to_string(),
            retake: false,
        }
    }

    fn config(kind: PlatformKind) -> PlatformConfig {
        PlatformConfig {
            kind,
            base_url: "https://code.example.org".to_string(),
            namespace: "students-2024".to_string(),
            task_url_prefix: String::new(),
        }
    }

    #[test]
    fn project_names_strip_punctuation() {
        let links = links_for(&config(PlatformKind::Gitlab));
        assert_eq!(links.project_name(&student()), "hse-AnnaMaria-OBrien-obrien");
    }

    #[test]
    fn gitlab_links_use_dash_routes() {
        let links = links_for(&config(PlatformKind::Gitlab));
        let project = links.project_name(&student());
        assert_eq!(
            links.pipeline_url(&project, 42),
            "https://code.example.org/students-2024/hse-AnnaMaria-OBrien-obrien/-/pipelines/42"
        );
        assert!(links.submits_url(&project).ends_with("/-/jobs"));
        assert!(links
            .task_branch_url(&project, "intro/aplusb")
            .ends_with("/-/tree/submits/intro/aplusb"));
    }

    #[test]
    fn gitea_links_use_actions_routes() {
        let links = links_for(&config(PlatformKind::Gitea));
        assert!(links.pipeline_url("repo", 7).ends_with("/repo/actions/runs/7"));
        assert!(links.submits_url("repo").ends_with("/repo/actions"));
        assert!(links
            .task_branch_url("repo", "intro/aplusb")
            .ends_with("/repo/src/branch/intro/aplusb"));
    }

    #[test]
    fn task_urls_need_a_prefix() {
        let mut with_prefix = config(PlatformKind::Gitlab);
        with_prefix.task_url_prefix = "https://course.example.org/tasks".to_string();

        assert_eq!(links_for(&config(PlatformKind::Gitlab)).task_url("intro/aplusb"), None);
        assert_eq!(
            links_for(&with_prefix).task_url("intro/aplusb").as_deref(),
            Some("https://course.example.org/tasks/intro/aplusb")
        );
    }
}
