use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::grading::course::CourseFormat;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub grading: GradingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            grading: GradingConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where course definitions come from and how grading results are cached and decorated.
#[derive(Debug, Clone)]
pub struct GradingConfig {
    pub courses: Vec<CourseSourceConfig>,
    pub refresh_interval: Duration,
    pub standings_ttl: Duration,
    pub platform: PlatformConfig,
    pub dataset: Option<PathBuf>,
}

impl GradingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let courses = match env::var("GRADER_COURSES") {
            Ok(raw) => parse_course_sources(&raw)?,
            Err(_) => Vec::new(),
        };

        let refresh_interval = Duration::from_secs(seconds_var("GRADER_COURSE_REFRESH_SECS", 60)?);
        let standings_ttl = Duration::from_secs(seconds_var("GRADER_STANDINGS_TTL_SECS", 10)?);

        let kind = match env::var("GRADER_PLATFORM") {
            Ok(value) => PlatformKind::parse(&value)?,
            Err(_) => PlatformKind::Gitlab,
        };
        let platform = PlatformConfig {
            kind,
            base_url: env::var("GRADER_PLATFORM_BASE_URL")
                .unwrap_or_else(|_| "https://gitlab.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            namespace: env::var("GRADER_PLATFORM_NAMESPACE")
                .unwrap_or_else(|_| "students".to_string()),
            task_url_prefix: env::var("GRADER_TASK_URL_PREFIX")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
        };

        let dataset = env::var("GRADER_DATASET")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            courses,
            refresh_interval,
            standings_ttl,
            platform,
            dataset,
        })
    }
}

/// Course definition file bound to an enrolled group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSourceConfig {
    pub group: String,
    pub path: PathBuf,
    pub format: CourseFormat,
}

/// Code hosting back end used to build repository and pipeline links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Gitlab,
    Gitea,
}

impl PlatformKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(Self::Gitlab),
            "gitea" => Ok(Self::Gitea),
            other => Err(ConfigError::UnknownPlatform {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub kind: PlatformKind,
    pub base_url: String,
    pub namespace: String,
    pub task_url_prefix: String,
}

fn seconds_var(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable, value }),
        Err(_) => Ok(default),
    }
}

/// Parses `group=path[:format]` entries separated by commas.
pub fn parse_course_sources(raw: &str) -> Result<Vec<CourseSourceConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (group, rest) = entry
                .split_once('=')
                .filter(|(group, rest)| !group.trim().is_empty() && !rest.trim().is_empty())
                .ok_or_else(|| ConfigError::InvalidCourseEntry {
                    entry: entry.to_string(),
                })?;

            let (path, format) = match rest.rsplit_once(':') {
                Some((path, format)) if !path.is_empty() => {
                    let format = CourseFormat::parse(format).ok_or_else(|| {
                        ConfigError::UnknownCourseFormat {
                            value: format.to_string(),
                        }
                    })?;
                    (path, format)
                }
                _ => (rest, CourseFormat::Auto),
            };

            Ok(CourseSourceConfig {
                group: group.trim().to_string(),
                path: PathBuf::from(path.trim()),
                format,
            })
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidCourseEntry { entry: String },
    UnknownCourseFormat { value: String },
    UnknownPlatform { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a whole number of seconds, got '{value}'")
            }
            ConfigError::InvalidCourseEntry { entry } => write!(
                f,
                "GRADER_COURSES entry '{entry}' must look like group=path[:format]"
            ),
            ConfigError::UnknownCourseFormat { value } => {
                write!(f, "unknown course format '{value}', expected v1, v2 or auto")
            }
            ConfigError::UnknownPlatform { value } => {
                write!(f, "GRADER_PLATFORM must be gitlab or gitea, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "GRADER_COURSES",
            "GRADER_COURSE_REFRESH_SECS",
            "GRADER_STANDINGS_TTL_SECS",
            "GRADER_PLATFORM",
            "GRADER_PLATFORM_BASE_URL",
            "GRADER_PLATFORM_NAMESPACE",
            "GRADER_TASK_URL_PREFIX",
            "GRADER_DATASET",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.grading.courses.is_empty());
        assert_eq!(config.grading.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.grading.standings_ttl, Duration::from_secs(10));
        assert_eq!(config.grading.platform.kind, PlatformKind::Gitlab);
        assert!(config.grading.dataset.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_grading_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GRADER_COURSES", "hse=courses/hse.yaml:v2, spb=courses/spb.yaml");
        env::set_var("GRADER_STANDINGS_TTL_SECS", "30");
        env::set_var("GRADER_PLATFORM", "Gitea");
        env::set_var("GRADER_PLATFORM_BASE_URL", "https://gitea.example.org/");

        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(
            config.grading.courses,
            vec![
                CourseSourceConfig {
                    group: "hse".to_string(),
                    path: PathBuf::from("courses/hse.yaml"),
                    format: CourseFormat::V2,
                },
                CourseSourceConfig {
                    group: "spb".to_string(),
                    path: PathBuf::from("courses/spb.yaml"),
                    format: CourseFormat::Auto,
                },
            ]
        );
        assert_eq!(config.grading.standings_ttl, Duration::from_secs(30));
        assert_eq!(config.grading.platform.kind, PlatformKind::Gitea);
        assert_eq!(config.grading.platform.base_url, "https://gitea.example.org");
    }

    #[test]
    fn rejects_malformed_course_entries() {
        assert!(matches!(
            parse_course_sources("hse"),
            Err(ConfigError::InvalidCourseEntry { .. })
        ));
        assert!(matches!(
            parse_course_sources("hse=deadlines.yaml:v9"),
            Err(ConfigError::UnknownCourseFormat { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_intervals() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GRADER_COURSE_REFRESH_SECS", "soon");
        let result = AppConfig::load();
        reset_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                variable: "GRADER_COURSE_REFRESH_SECS",
                ..
            })
        ));
    }
}
