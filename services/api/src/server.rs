use crate::cli::ServeArgs;
use crate::infra::{load_repository, AppState};
use crate::routes::with_grading_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cohort_grader::config::AppConfig;
use cohort_grader::error::AppError;
use cohort_grader::grading::course::snapshot::run_refresh_loop;
use cohort_grader::grading::{
    links_for, CourseSnapshotStore, CourseSource, FileCourseSource, GradingService,
};
use cohort_grader::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let source: Arc<dyn CourseSource> =
        Arc::new(FileCourseSource::new(config.grading.courses.clone()));
    let courses = Arc::new(CourseSnapshotStore::default());
    courses.refresh(source.as_ref())?;
    if !config.grading.refresh_interval.is_zero() {
        tokio::spawn(run_refresh_loop(
            courses.clone(),
            source,
            config.grading.refresh_interval,
        ));
    }

    let repository = Arc::new(load_repository(config.grading.dataset.as_deref())?);
    let grading_service = Arc::new(GradingService::new(
        courses,
        repository,
        links_for(&config.grading.platform),
        config.grading.standings_ttl,
    ));

    let app = with_grading_routes(grading_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "cohort grader ready");

    axum::serve(listener, app).await?;
    Ok(())
}
