//! Deadline-driven decay curves converting lateness into an awarded score.
//!
//! Every conversion from a fractional score to points goes through [`round_score`], which
//! rounds half away from zero and never produces a negative award.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Serialize, Serializer};

/// Closed set of scoring curves a scoring group can reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringPolicySpec {
    /// Decays as `e^(-late / half_life)`, never below `floor_ratio` of the nominal score.
    Exponential {
        #[serde(rename = "half_life_secs", serialize_with = "as_seconds")]
        half_life: Duration,
        floor_ratio: f64,
    },
    /// Decays linearly from the full score to `floor_multiplier` over the grace period.
    Linear {
        #[serde(rename = "grace_period_secs", serialize_with = "as_seconds")]
        grace_period: Duration,
        floor_multiplier: f64,
    },
}

impl ScoringPolicySpec {
    /// Default curve for weekly tasks: five day decay with a 30% floor.
    pub fn weekly_default() -> Self {
        Self::Exponential {
            half_life: Duration::days(5),
            floor_ratio: 0.3,
        }
    }

    /// Checks the parameters describe a usable curve, returning the reason when they do not.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Exponential {
                half_life,
                floor_ratio,
            } => {
                if half_life <= Duration::zero() {
                    return Err("halfLife must be positive".to_string());
                }
                if !(0.0..=1.0).contains(&floor_ratio) {
                    return Err(format!("floorRatio {floor_ratio} must lie within [0, 1]"));
                }
            }
            Self::Linear {
                grace_period,
                floor_multiplier,
            } => {
                if grace_period <= Duration::zero() {
                    return Err("gracePeriod must be positive".to_string());
                }
                if !floor_multiplier.is_finite() || floor_multiplier < 0.0 {
                    return Err(format!(
                        "floorMultiplier {floor_multiplier} must be a non-negative number"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Awards points for a successful submission made at `submitted_at`.
    ///
    /// Submissions at or before the deadline always receive the nominal score.
    pub fn score(
        &self,
        nominal_score: u32,
        deadline: DateTime<FixedOffset>,
        submitted_at: DateTime<Utc>,
    ) -> u32 {
        let deadline = deadline.with_timezone(&Utc);
        if submitted_at <= deadline {
            return nominal_score;
        }

        let late = submitted_at - deadline;
        let multiplier = match *self {
            Self::Exponential {
                half_life,
                floor_ratio,
            } => {
                let decay = (-seconds(late) / seconds(half_life)).exp();
                floor_ratio.max(decay)
            }
            Self::Linear {
                grace_period,
                floor_multiplier,
            } => {
                if late >= grace_period {
                    floor_multiplier
                } else {
                    let elapsed = seconds(late) / seconds(grace_period);
                    (1.0 - elapsed) + floor_multiplier * elapsed
                }
            }
        };

        round_score(f64::from(nominal_score) * multiplier)
    }
}

/// Scales a nominal score by `ratio` using the shared rounding rule.
pub fn apply_ratio(nominal_score: u32, ratio: f64) -> u32 {
    round_score(f64::from(nominal_score) * ratio)
}

/// Rounds half away from zero, clamping negative and non-finite values to zero.
pub fn round_score(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

fn as_seconds<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(duration.num_seconds())
}
