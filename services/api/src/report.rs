use crate::infra::{load_repository, InMemoryGradingRepository};
use clap::Args;
use cohort_grader::config::AppConfig;
use cohort_grader::error::AppError;
use cohort_grader::grading::{
    links_for, parse_course, CohortFilter, CourseFormat, CourseSnapshotStore, FileCourseSource,
    GradingService, Standings,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct StandingsArgs {
    /// Enrolled group to rank
    pub(crate) group: String,
    /// Only include students repeating the course
    #[arg(long)]
    pub(crate) retakes: bool,
    /// Print the full standings document instead of a mark sheet
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoresArgs {
    /// Student login
    pub(crate) login: String,
}

#[derive(Args, Debug)]
pub(crate) struct CheckCourseArgs {
    /// Course definition file to validate
    pub(crate) path: PathBuf,
    /// Document layout: v1, v2 or auto
    #[arg(long, default_value = "auto", value_parser = parse_format)]
    pub(crate) format: CourseFormat,
}

fn parse_format(value: &str) -> Result<CourseFormat, String> {
    CourseFormat::parse(value).ok_or_else(|| format!("unknown course format '{value}'"))
}

/// Builds a one-shot service over the configured course files and dataset.
fn offline_service() -> Result<GradingService<InMemoryGradingRepository>, AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(CourseSnapshotStore::default());
    store.refresh(&FileCourseSource::new(config.grading.courses.clone()))?;
    let repository = load_repository(config.grading.dataset.as_deref())?;

    Ok(GradingService::new(
        store,
        Arc::new(repository),
        links_for(&config.grading.platform),
        Duration::ZERO,
    ))
}

pub(crate) fn run_standings(args: StandingsArgs) -> Result<(), AppError> {
    let filter = if args.retakes {
        CohortFilter::Retakes
    } else {
        CohortFilter::All
    };
    let standings = offline_service()?.standings(&args.group, filter)?;

    let stdout = io::stdout();
    if args.json {
        let standings = Standings::clone(&standings).newest_first();
        serde_json::to_writer_pretty(stdout.lock(), &standings).map_err(io::Error::from)?;
        println!();
        Ok(())
    } else {
        write_mark_sheet(&standings, stdout.lock())
    }
}

pub(crate) fn run_scores(args: ScoresArgs) -> Result<(), AppError> {
    let scores = offline_service()?.student_scores(&args.login)?.newest_first();
    serde_json::to_writer_pretty(io::stdout().lock(), &scores).map_err(io::Error::from)?;
    println!();
    Ok(())
}

pub(crate) fn run_check_course(args: CheckCourseArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.path)?;
    let course = parse_course(&raw, args.format)?;

    println!("Course: {}", args.path.display());
    println!("Task groups: {}", course.task_groups().len());
    if let Some(cutoff) = course.final_deadline() {
        println!("Final deadline: {}", cutoff.to_rfc3339());
    }
    println!("Scoring groups:");
    for group in course.scoring_groups() {
        println!(
            "  - {} (policy {}, weight {:.1}): max {}",
            group.name,
            group.policy,
            group.weight,
            group.max_score()
        );
    }
    Ok(())
}

/// Writes `Last First<TAB>mark` rows ordered by name.
pub(crate) fn write_mark_sheet<W: Write>(standings: &Standings, writer: W) -> Result<(), AppError> {
    let mut rows: Vec<_> = standings
        .users
        .iter()
        .map(|user| (user.student.sort_name(), user.final_mark))
        .collect();
    rows.sort_by(|left, right| left.0.cmp(&right.0));

    let mut sheet = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    for (name, mark) in rows {
        sheet
            .write_record([name, format!("{mark:.3}")])
            .map_err(io::Error::from)?;
    }
    sheet.flush()?;
    Ok(())
}
