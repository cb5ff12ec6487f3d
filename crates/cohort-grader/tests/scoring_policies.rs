//! Scoring curve scenarios exercised through the public policy and course APIs.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use cohort_grader::grading::{parse_course, CourseFormat, ScoringPolicySpec};

const CURVES: &str = r#"
timezone: "+00:00"
scoring:
  defaultGroup: weekly
  policies:
    - name: soft
      kind: exp
      spec:
        halfLife: 36h
        floorRatio: 0.3
    - name: sprint
      kind: linear
      spec:
        gracePeriod: 1.5h
        floorMultiplier: 0.5
  groups:
    - name: weekly
      weight: 6.0
      policy: soft
    - name: sprints
      weight: 4.0
      policy: sprint
assignments:
  - title: 01-warmup
    start: 01-09-2024 00:00
    deadline: 08-09-2024 20:00
    tasks:
      - task: warmup/echo
        score: 100
"#;

fn deadline() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .expect("utc offset")
        .with_ymd_and_hms(1969, 7, 20, 20, 17, 0)
        .single()
        .expect("valid deadline")
}

fn exponential() -> ScoringPolicySpec {
    ScoringPolicySpec::Exponential {
        half_life: Duration::days(5),
        floor_ratio: 0.3,
    }
}

fn linear() -> ScoringPolicySpec {
    ScoringPolicySpec::Linear {
        grace_period: Duration::weeks(1),
        floor_multiplier: 0.5,
    }
}

#[test]
fn nothing_decays_before_the_deadline() {
    for policy in [exponential(), linear()] {
        for hours_early in [1, 24, 24 * 30] {
            let submitted = deadline().with_timezone(&Utc) - Duration::hours(hours_early);
            assert_eq!(policy.score(1234, deadline(), submitted), 1234);
        }
    }
}

#[test]
fn linear_decay_is_monotonic_and_floored() {
    let policy = linear();
    let mut previous = u32::MAX;
    for hour in 0..(24 * 14) {
        let submitted = deadline().with_timezone(&Utc) + Duration::hours(hour);
        let score = policy.score(9000, deadline(), submitted);
        assert!(score <= previous, "score rose at hour {hour}");
        assert!(score >= 4500, "score fell below the floor at hour {hour}");
        previous = score;
    }
}

#[test]
fn course_documents_carry_their_curves() {
    let course = parse_course(CURVES, CourseFormat::V2).expect("course parses");
    let deadline = course.task_groups()[0].deadline;
    let deadline_utc = deadline.with_timezone(&Utc);

    let soft = course.policy("soft").expect("soft policy");
    assert_eq!(soft.score(100, deadline, deadline_utc + Duration::hours(36)), 37);
    assert_eq!(soft.score(100, deadline, deadline_utc + Duration::days(30)), 30);

    let sprint = course.policy("sprint").expect("sprint policy");
    assert_eq!(sprint.score(100, deadline, deadline_utc + Duration::minutes(45)), 75);
    assert_eq!(sprint.score(100, deadline, deadline_utc + Duration::hours(2)), 50);
}
