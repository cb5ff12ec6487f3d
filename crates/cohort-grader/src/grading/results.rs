use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::course::CourseDefinition;
use super::platform::ProjectLinks;
use super::records::Student;
use super::signal::TaskStatus;

/// Outcome for a single task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub score: u32,
    pub max_score: u32,
    pub overridden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    /// Branch holding the student's submissions for this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTaskGroup {
    pub title: String,
    pub pretty_title: String,
    pub scoring_group: String,
    pub deadline: DateTime<FixedOffset>,
    pub tasks: Vec<ScoredTask>,
    pub score: u64,
    pub max_score: u64,
}

/// Student identity as shown next to their scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSummary {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub group_name: String,
    pub retake: bool,
    pub project: String,
    pub project_url: String,
    pub submits_url: String,
}

impl StudentSummary {
    pub fn from_student(student: &Student, project: String, links: &dyn ProjectLinks) -> Self {
        Self {
            login: student.login.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            group_name: student.group_name.clone(),
            retake: student.retake,
            project_url: links.project_url(&project),
            submits_url: links.submits_url(&project),
            project,
        }
    }

    /// "Last First", the key standings ties are broken on.
    pub fn sort_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserScores {
    pub student: StudentSummary,
    pub groups: Vec<ScoredTaskGroup>,
    pub score: u64,
    pub max_score: u64,
    pub final_mark: f64,
}

impl UserScores {
    pub fn newest_first(mut self) -> Self {
        self.groups.reverse();
        self
    }
}

/// Ranked cohort view together with the course snapshot it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standings {
    pub group: String,
    pub course: CourseDefinition,
    pub users: Vec<UserScores>,
}

impl Standings {
    /// Reverses task groups of the embedded course and of every student.
    pub fn newest_first(mut self) -> Self {
        self.course = self.course.newest_first();
        self.users = self
            .users
            .into_iter()
            .map(UserScores::newest_first)
            .collect();
        self
    }
}

/// Drops a leading `NN-` ordering prefix and capitalizes each word.
pub fn pretty_title(title: &str) -> String {
    let digits = title.chars().take_while(char::is_ascii_digit).count();
    let stripped = match title[digits..].strip_prefix('-') {
        Some(rest) if digits > 0 => rest,
        _ => title,
    };

    let mut pretty = String::with_capacity(stripped.len());
    let mut word_start = true;
    for ch in stripped.chars() {
        if word_start {
            pretty.extend(ch.to_uppercase());
        } else {
            pretty.push(ch);
        }
        word_start = !(ch.is_alphanumeric() || ch == '_');
    }
    pretty
}
