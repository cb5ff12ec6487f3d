use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::engine::GradingError;
use super::records::OverrideRecord;
use super::repository::GradingRepository;
use super::results::Standings;
use super::service::{CohortFilter, GradingService};

/// Router builder exposing scores, standings and override endpoints.
pub fn grading_router<R>(service: Arc<GradingService<R>>) -> Router
where
    R: GradingRepository + 'static,
{
    Router::new()
        .route("/api/v1/scores/:login", get(scores_handler::<R>))
        .route("/api/v1/standings/:group", get(standings_handler::<R>))
        .route(
            "/api/v1/overrides",
            put(upsert_override_handler::<R>).delete(remove_override_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StandingsQuery {
    #[serde(default)]
    retakes: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideKey {
    login: String,
    task: String,
}

pub(crate) async fn scores_handler<R>(
    State(service): State<Arc<GradingService<R>>>,
    Path(login): Path<String>,
) -> Response
where
    R: GradingRepository + 'static,
{
    match service.student_scores(&login) {
        Ok(scores) => (StatusCode::OK, axum::Json(scores.newest_first())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn standings_handler<R>(
    State(service): State<Arc<GradingService<R>>>,
    Path(group): Path<String>,
    Query(query): Query<StandingsQuery>,
) -> Response
where
    R: GradingRepository + 'static,
{
    let filter = if query.retakes {
        CohortFilter::Retakes
    } else {
        CohortFilter::All
    };

    match service.standings(&group, filter) {
        Ok(standings) => {
            let view = Standings::clone(&standings).newest_first();
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn upsert_override_handler<R>(
    State(service): State<Arc<GradingService<R>>>,
    axum::Json(record): axum::Json<OverrideRecord>,
) -> Response
where
    R: GradingRepository + 'static,
{
    match service.override_score(record) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_override_handler<R>(
    State(service): State<Arc<GradingService<R>>>,
    Query(key): Query<OverrideKey>,
) -> Response
where
    R: GradingRepository + 'static,
{
    match service.remove_override(&key.login, &key.task) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => {
            let payload = json!({
                "error": "override not found",
                "login": key.login,
                "task": key.task,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: GradingError) -> Response {
    match error {
        GradingError::NotGradedYet { group } => {
            let payload = json!({
                "error": "not_graded_yet",
                "group": group,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        GradingError::StudentNotFound { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        GradingError::InvalidOverride { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
