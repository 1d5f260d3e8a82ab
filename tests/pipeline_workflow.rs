use chrono::{DateTime, TimeZone, Utc};
use gradebook::{
    GradingError, Identity, Location, Pipeline,
    config::CourseConfig,
    ledger::FeedbackRecord,
    pipeline::{grading_errors, report_path},
    platform::{MemoryPlatform, Platform},
    rubric::parse_document,
};

const CONFIG: &str = r#"{
    "course": "2026-fall",
    "breakdown": { "assignments": 1.0, "quiz": 0.0, "iterations": 0.0, "project": 0.0 },
    "cutoffs": [
        { "letter": "A", "minimum": 90 },
        { "letter": "B", "minimum": 80 },
        { "letter": "F", "minimum": 0 }
    ],
    "allowed_late_days": 1,
    "late_day_penalty_rate": -5,
    "assignments": ["assignment-1"],
    "deadlines": { "assignment-1": "2026-09-10T12:00:00Z" },
    "advisors": { "alice": "prof" },
    "source_url_template": "https://example.test/{{course}}-student-{{identity}}/tree/{{reference}}",
    "max_concurrency": 2
}"#;

const TESTS_PART: &str = "\
# Tests

# Rubric

## no-tests
**-10** No tests

# Grades

## [alice](https://example.test/2026-fall-student-alice/tree/a1)
no-tests
**+2** Tidy commits
**Grader:** carol

## [bob](https://example.test/2026-fall-student-bob/tree/b1)
**-15** Off by one in `sum`
**Grader:** dave
";

const STYLE_PART: &str = "\
# Style

# Rubric

# Grades

## [alice](https://example.test/2026-fall-student-alice/tree/a1)
**Grader:** carol

## [bob](https://example.test/2026-fall-student-bob/tree/b1)
-3 Inconsistent naming
**Grader:** GRADER
";

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
}

fn pipeline() -> Pipeline<MemoryPlatform> {
    let platform = MemoryPlatform::new()
        .with_roster("staff", ["carol", "dave"])
        .with_roster("students", ["alice", "bob"]);
    Pipeline::new(platform, CourseConfig::from_json(CONFIG).expect("config"))
}

async fn graded(pipeline: &Pipeline<MemoryPlatform>, style_grader: &str) {
    let platform = pipeline.platform();
    platform
        .write_document("grades/assignment-1/01-tests.md", TESTS_PART)
        .await
        .unwrap();
    platform
        .write_document(
            "grades/assignment-1/02-style.md",
            &STYLE_PART.replace("GRADER", style_grader),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn submissions_are_recorded_and_acknowledged() {
    let pipeline = pipeline();
    let alice = Identity::new("alice");

    let record = pipeline
        .record_submission("assignment-1", &alice, "a1", at(11, 13), None)
        .await
        .unwrap();
    assert_eq!(record.late_days, Some(2));

    let ledger = pipeline.platform().read_ledger("assignment-1").await.unwrap();
    assert_eq!(ledger, vec![record]);

    let issues = pipeline.platform().issues("2026-fall-student-alice");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "assignment-1 received");
    assert!(issues[0].body.starts_with("```json\n{\n  \"subject\": \"assignment-1\""));
    assert!(issues[0].body.ends_with("/cc @alice\n"));
}

#[tokio::test]
async fn feedback_is_recorded_without_the_identity() {
    let pipeline = pipeline();
    pipeline
        .record_submission(
            "assignment-1",
            &Identity::new("alice"),
            "a1",
            at(9, 8),
            Some("  Part 2 was unclear  "),
        )
        .await
        .unwrap();
    pipeline
        .record_submission("assignment-1", &Identity::new("bob"), "b1", at(9, 9), Some(" "))
        .await
        .unwrap();

    let feedback = pipeline.platform().read_feedback().await.unwrap();
    assert_eq!(feedback, vec![FeedbackRecord {
        subject:  "assignment-1".into(),
        feedback: "Part 2 was unclear".into(),
    }]);
    assert_eq!(pipeline.platform().read_ledger("assignment-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn scaffolds_use_latest_submission_and_are_not_overwritten() {
    let pipeline = pipeline();
    let alice = Identity::new("alice");
    pipeline
        .record_submission("assignment-1", &alice, "old", at(9, 8), None)
        .await
        .unwrap();
    pipeline
        .record_submission("assignment-1", &alice, "a1", at(10, 9), None)
        .await
        .unwrap();

    let template = parse_document(
        "# Tests\n\n# Rubric\n\n## no-tests\n**-10** No tests\n\n# Grades\n",
        &Location::subject("assignment-1"),
    )
    .unwrap();
    let written = pipeline
        .start_grading("assignment-1", &[template.clone()])
        .await
        .unwrap();
    assert_eq!(written, vec!["grades/assignment-1/01-tests.md".to_string()]);

    let text = pipeline
        .platform()
        .document("grades/assignment-1/01-tests.md")
        .unwrap();
    assert!(text.contains("## [alice](https://example.test/2026-fall-student-alice/tree/a1)"));
    assert!(!text.contains("/tree/old"));

    // ungraded entries do not pass the check
    let err = pipeline.check("assignment-1").await.unwrap_err();
    let errors = grading_errors(&err).expect("grading errors");
    assert!(errors.iter().all(|e| e.kind() == "FormatError"));

    let again = pipeline
        .start_grading("assignment-1", &[template])
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn publish_is_idempotent() {
    let pipeline = pipeline();
    graded(&pipeline, "carol").await;

    let reports = pipeline.publish("assignment-1").await.unwrap();
    let totals: Vec<(String, u64)> = reports
        .iter()
        .map(|r| (r.identity.to_string(), r.total))
        .collect();
    assert_eq!(totals, vec![("alice".into(), 92), ("bob".into(), 82)]);

    let text = pipeline
        .platform()
        .document(&report_path("assignment-1", &Identity::new("bob")))
        .unwrap();
    assert!(text.starts_with("# Tests\n\n[Submission](https://example.test/2026-fall-student-bob/tree/b1)\n"));
    assert!(text.contains("**-3** Inconsistent naming"));
    assert!(text.ends_with("# Total\n\n**Total:** 82/100\n"));

    pipeline.publish("assignment-1").await.unwrap();
    assert_eq!(pipeline.platform().issue_count(), 2);
    let issues = pipeline.platform().issues("2026-fall-student-alice");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "assignment-1 grades");
}

#[tokio::test]
async fn unauthorized_grader_blocks_publication() {
    let pipeline = pipeline();
    graded(&pipeline, "mallory").await;

    let err = pipeline.publish("assignment-1").await.unwrap_err();
    let errors: Vec<GradingError> = grading_errors(&err)
        .expect("grading errors")
        .iter()
        .cloned()
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        GradingError::UnauthorizedGrader { grader, .. } if grader.as_str() == "mallory"
    ));

    assert_eq!(pipeline.platform().issue_count(), 0);
    assert!(
        pipeline
            .platform()
            .document(&report_path("assignment-1", &Identity::new("alice")))
            .is_none()
    );
}

#[tokio::test]
async fn parts_must_grade_the_same_identities() {
    let pipeline = pipeline();
    graded(&pipeline, "carol").await;
    let style_without_bob = STYLE_PART
        .split("## [bob]")
        .next()
        .unwrap()
        .to_string();
    pipeline
        .platform()
        .write_document("grades/assignment-1/02-style.md", &style_without_bob)
        .await
        .unwrap();

    let err = pipeline.check("assignment-1").await.unwrap_err();
    let errors: Vec<GradingError> = grading_errors(&err).unwrap().iter().cloned().collect();
    assert_eq!(errors, vec![GradingError::Consistency {
        location:   Location::subject("assignment-1"),
        identities: vec![Identity::new("bob")],
    }]);
}

#[tokio::test]
async fn check_reports_format_and_consistency_problems_together() {
    let pipeline = pipeline();
    let platform = pipeline.platform();
    let tests_part = TESTS_PART.replace("**-15** Off by one in `sum`", "bogus");
    let style_part = STYLE_PART
        .replace("[bob](https://example.test/2026-fall-student-bob/tree/b1)", "[carol](u)")
        .replace("GRADER", "dave");
    platform
        .write_document("grades/assignment-1/01-tests.md", &tests_part)
        .await
        .unwrap();
    platform
        .write_document("grades/assignment-1/02-style.md", &style_part)
        .await
        .unwrap();

    let err = pipeline.check("assignment-1").await.unwrap_err();
    let errors: Vec<GradingError> = grading_errors(&err).unwrap().iter().cloned().collect();
    let kinds: Vec<&str> = errors.iter().map(GradingError::kind).collect();
    assert_eq!(kinds, vec!["FormatError", "ConsistencyError"]);
    assert_eq!(errors[1], GradingError::Consistency {
        location:   Location::subject("assignment-1"),
        identities: vec![Identity::new("bob"), Identity::new("carol")],
    });
}

#[tokio::test]
async fn final_grades_blend_published_totals() {
    let pipeline = pipeline();
    pipeline
        .record_submission("assignment-1", &Identity::new("alice"), "a1", at(11, 13), None)
        .await
        .unwrap();
    pipeline
        .record_submission("assignment-1", &Identity::new("bob"), "b1", at(10, 11), None)
        .await
        .unwrap();
    graded(&pipeline, "carol").await;
    pipeline.publish("assignment-1").await.unwrap();

    let summary = pipeline.final_grades().await.unwrap();
    let letters: Vec<(String, String)> = summary
        .records
        .iter()
        .map(|r| (r.identity.to_string(), r.letter_grade.clone()))
        .collect();
    // alice: 92 with one late day over the allowance, bob: 82 on time
    assert_eq!(letters, vec![("alice".into(), "B".into()), ("bob".into(), "B".into())]);
    assert_eq!(summary.records[0].weighted_total, 87.0);
    assert_eq!(summary.count("B"), 2);

    let table = pipeline.platform().document("grades/final.md").unwrap();
    assert!(table.contains("prof"));
    let json = pipeline.platform().document("grades/final.json").unwrap();
    assert!(json.contains("\"letter_grade\": \"B\""));
}

#[tokio::test]
async fn final_grades_need_every_report() {
    let pipeline = pipeline();
    let err = pipeline.final_grades().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GradingError>(),
        Some(GradingError::MissingTotal { .. })
    ));
    assert!(pipeline.platform().document("grades/final.md").is_none());
}
