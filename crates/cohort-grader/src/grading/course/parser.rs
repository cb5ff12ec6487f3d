use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::{CourseDefinition, CourseError, CourseParts, ScoringGroup, TaskDefinition, TaskGroup};
use crate::grading::policy::ScoringPolicySpec;

const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";
const DEFAULT_OFFSET_SECS: i32 = 3 * 3600;
const DEFAULT_NAME: &str = "default";
const LEGACY_WEIGHT: f64 = 10.0;

/// Layout of a course definition document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseFormat {
    /// A bare list of task groups graded by one implicit exponential policy.
    V1,
    /// Task groups plus explicit scoring policies and groups.
    V2,
    /// Picks V1 for a top-level list and V2 for a mapping.
    Auto,
}

impl CourseFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "v1" => Some(Self::V1),
            "v2" => Some(Self::V2),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Parses and validates a YAML course definition.
pub fn parse_course(raw: &str, format: CourseFormat) -> Result<CourseDefinition, CourseError> {
    let document: Value = serde_yaml::from_str(raw)?;
    let format = match format {
        CourseFormat::Auto if document.is_sequence() => CourseFormat::V1,
        CourseFormat::Auto => CourseFormat::V2,
        explicit => explicit,
    };

    let parts = match format {
        CourseFormat::V1 => legacy_parts(serde_yaml::from_value(document)?)?,
        _ => scored_parts(serde_yaml::from_value(document)?)?,
    };

    CourseDefinition::build(parts)
}

#[derive(Debug, Deserialize)]
struct RawTask {
    task: String,
    #[serde(default)]
    score: u32,
    #[serde(default, alias = "crashme", alias = "alternateProof")]
    alternate_proof: bool,
}

#[derive(Debug, Deserialize)]
struct LegacyTaskGroup {
    group: String,
    start: String,
    deadline: String,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTaskGroup {
    #[serde(default)]
    title: String,
    #[serde(default)]
    group: String,
    start: String,
    deadline: String,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCourse {
    #[serde(default)]
    assignments: Vec<RawTaskGroup>,
    #[serde(default)]
    scoring: RawScoring,
    #[serde(default)]
    final_deadline: Option<String>,
    #[serde(default)]
    retake_penalty_ratio: f64,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScoring {
    #[serde(default)]
    policies: Vec<RawPolicy>,
    #[serde(default)]
    groups: Vec<RawScoringGroup>,
    #[serde(default)]
    default_group: String,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    name: String,
    kind: String,
    #[serde(default)]
    spec: Mapping,
}

#[derive(Debug, Deserialize)]
struct RawScoringGroup {
    name: String,
    #[serde(default)]
    weight: f64,
    policy: String,
}

fn legacy_parts(groups: Vec<LegacyTaskGroup>) -> Result<CourseParts, CourseError> {
    let offset = default_offset()?;
    let task_groups = groups
        .into_iter()
        .map(|group| {
            Ok(TaskGroup {
                title: group.group,
                scoring_group_ref: String::new(),
                start: parse_date(&group.start, offset)?,
                deadline: parse_date(&group.deadline, offset)?,
                tasks: tasks(group.tasks),
            })
        })
        .collect::<Result<Vec<_>, CourseError>>()?;

    let mut policies = BTreeMap::new();
    policies.insert(DEFAULT_NAME.to_string(), ScoringPolicySpec::weekly_default());

    Ok(CourseParts {
        task_groups,
        policies,
        scoring_groups: vec![ScoringGroup::new(DEFAULT_NAME, LEGACY_WEIGHT, DEFAULT_NAME)],
        default_scoring_group: DEFAULT_NAME.to_string(),
        final_deadline: None,
        retake_penalty_ratio: 0.0,
    })
}

fn scored_parts(course: RawCourse) -> Result<CourseParts, CourseError> {
    let offset = match course.timezone.as_deref() {
        Some(value) => parse_offset(value)?,
        None => default_offset()?,
    };

    let task_groups = course
        .assignments
        .into_iter()
        .map(|group| {
            let title = if group.title.is_empty() {
                group.group.clone()
            } else {
                group.title
            };
            Ok(TaskGroup {
                title,
                scoring_group_ref: group.group,
                start: parse_date(&group.start, offset)?,
                deadline: parse_date(&group.deadline, offset)?,
                tasks: tasks(group.tasks),
            })
        })
        .collect::<Result<Vec<_>, CourseError>>()?;

    let mut policies = BTreeMap::new();
    for policy in course.scoring.policies {
        let spec = policy_spec(&policy)?;
        policies.insert(policy.name, spec);
    }

    let scoring_groups = course
        .scoring
        .groups
        .into_iter()
        .map(|group| ScoringGroup::new(group.name, group.weight, group.policy))
        .collect();

    let final_deadline = course
        .final_deadline
        .as_deref()
        .map(|value| parse_date(value, offset))
        .transpose()?;

    Ok(CourseParts {
        task_groups,
        policies,
        scoring_groups,
        default_scoring_group: course.scoring.default_group,
        final_deadline,
        retake_penalty_ratio: course.retake_penalty_ratio,
    })
}

fn tasks(raw: Vec<RawTask>) -> Vec<TaskDefinition> {
    raw.into_iter()
        .map(|task| TaskDefinition {
            id: task.task.trim().to_string(),
            nominal_score: task.score,
            alternate_proof: task.alternate_proof,
        })
        .collect()
}

fn policy_spec(policy: &RawPolicy) -> Result<ScoringPolicySpec, CourseError> {
    let missing = |field: &str| CourseError::InvalidPolicy {
        policy: policy.name.clone(),
        reason: format!("missing {field}"),
    };

    match policy.kind.trim() {
        "exp" | "exponential" => {
            let half_life = duration_field(&policy.spec, &["halfLife", "multiplier"])?
                .ok_or_else(|| missing("halfLife"))?;
            let floor_ratio = float_field(&policy.spec, &["floorRatio", "threshold"])
                .ok_or_else(|| missing("floorRatio"))?;
            Ok(ScoringPolicySpec::Exponential {
                half_life,
                floor_ratio,
            })
        }
        "linear" => {
            let grace_period = duration_field(&policy.spec, &["gracePeriod", "after"])?
                .ok_or_else(|| missing("gracePeriod"))?;
            let floor_multiplier = float_field(&policy.spec, &["floorMultiplier", "multiplier"])
                .ok_or_else(|| missing("floorMultiplier"))?;
            Ok(ScoringPolicySpec::Linear {
                grace_period,
                floor_multiplier,
            })
        }
        other => Err(CourseError::UnknownPolicyKind {
            policy: policy.name.clone(),
            kind: other.to_string(),
        }),
    }
}

fn field<'a>(spec: &'a Mapping, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| spec.get(*key))
}

fn duration_field(spec: &Mapping, keys: &[&str]) -> Result<Option<Duration>, CourseError> {
    match field(spec, keys) {
        None => Ok(None),
        Some(Value::String(value)) => parse_duration(value).map(Some),
        // a bare number carries no unit
        Some(Value::Number(number)) => Err(CourseError::InvalidDuration {
            value: number.to_string(),
        }),
        Some(other) => Err(CourseError::InvalidDuration {
            value: format!("{other:?}"),
        }),
    }
}

fn float_field(spec: &Mapping, keys: &[&str]) -> Option<f64> {
    field(spec, keys).and_then(Value::as_f64)
}

/// Parses Go-style durations such as `5d`, `120h`, `1h30m`, `1.5h` or `500ms`.
///
/// Every component needs a unit; `d` and `w` extend the usual `ns`..`h` set.
pub fn parse_duration(value: &str) -> Result<Duration, CourseError> {
    let invalid = || CourseError::InvalidDuration {
        value: value.to_string(),
    };

    let mut rest = value.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_len);
        let amount: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        total_nanos += amount * unit_nanos(unit).ok_or_else(invalid)?;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos >= i64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::nanoseconds(total_nanos.round() as i64))
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "\u{b5}s" | "\u{3bc}s" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3_600e9,
        "d" => 86_400e9,
        "w" => 604_800e9,
        _ => return None,
    };
    Some(nanos)
}

fn default_offset() -> Result<FixedOffset, CourseError> {
    FixedOffset::east_opt(DEFAULT_OFFSET_SECS).ok_or_else(|| CourseError::InvalidTimezone {
        value: DEFAULT_OFFSET_SECS.to_string(),
    })
}

fn parse_offset(value: &str) -> Result<FixedOffset, CourseError> {
    let invalid = || CourseError::InvalidTimezone {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn parse_date(value: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, CourseError> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, DATE_FORMAT) {
        return offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| CourseError::InvalidDate {
                value: value.to_string(),
            });
    }

    DateTime::parse_from_rfc3339(trimmed).map_err(|_| CourseError::InvalidDate {
        value: value.to_string(),
    })
}
