use crate::config::ConfigError;
use crate::grading::{CourseError, GradingError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Course(CourseError),
    Grading(GradingError),
    Dataset {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Course(err) => write!(f, "course error: {}", err),
            AppError::Grading(err) => write!(f, "grading error: {}", err),
            AppError::Dataset { path, source } => {
                write!(f, "dataset {} is invalid: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Course(err) => Some(err),
            AppError::Grading(err) => Some(err),
            AppError::Dataset { source, .. } => Some(source),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Grading(GradingError::NotGradedYet { .. })
            | AppError::Grading(GradingError::StudentNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Course(_) | AppError::Grading(GradingError::InvalidOverride { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Grading(_)
            | AppError::Dataset { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CourseError> for AppError {
    fn from(value: CourseError) -> Self {
        Self::Course(value)
    }
}

impl From<GradingError> for AppError {
    fn from(value: GradingError) -> Self {
        Self::Grading(value)
    }
}
