use gradebook::{
    GradingError, Identity, Location, Roster,
    aggregate::PartAggregator,
    error::GradingErrors,
    totals::{TotalsCalculator, extract_deltas, extract_total},
    validate::RubricValidator,
};

const PART_ONE: &str = "\
# Correctness

# Rubric

## crash
**-20** Crashes on empty input
**-5** No error message

# Grades

## [alice](https://example.test/alice/1)
crash
**Grader:** carol

## [bob](https://example.test/bob/1)
**+3** Extra credit
**Grader:** carol
";

const PART_TWO: &str = "\
# Documentation

# Rubric

# Grades

## [bob](https://example.test/bob/2)
**-8** Missing README
**Grader:** dave

## [alice](https://example.test/alice/2)
**Grader:** dave
";

fn staff() -> Roster {
    ["carol", "dave"].into_iter().collect()
}

fn check(parts: &[(&str, &str)]) -> Result<Vec<gradebook::rubric::GradeDocument>, GradingErrors> {
    let roster = staff();
    RubricValidator::new(&roster).check_subject("assignment-2", parts.iter().copied())
}

#[test]
fn parts_aggregate_into_reports() {
    let documents = check(&[("01-correctness", PART_ONE), ("02-documentation", PART_TWO)])
        .expect("valid documents");
    let grades = PartAggregator::new("assignment-2")
        .aggregate(&documents)
        .expect("consistent parts");

    let alice = &grades[&Identity::new("alice")];
    assert_eq!(alice.deltas(), vec![-20, -5]);
    assert_eq!(
        alice.sections.iter().map(|s| s.title.as_str()).collect::<Vec<_>>(),
        vec!["Correctness", "Documentation"]
    );

    let reports = TotalsCalculator.reports(grades.values());
    let totals: Vec<u64> = reports.iter().map(|r| r.total).collect();
    assert_eq!(totals, vec![75, 95]);

    for report in &reports {
        let location = Location::subject("assignment-2");
        assert_eq!(
            extract_total(&report.text, &location, &report.identity),
            Ok(report.total)
        );
    }
    assert_eq!(extract_deltas(&reports[1].text), vec![3, -8]);
}

#[test]
fn errors_accumulate_across_parts() {
    let unauthorized = PART_ONE.replace(
        "**+3** Extra credit\n**Grader:** carol",
        "**+3** Extra credit\n**Grader:** eve",
    );
    let malformed = PART_TWO.replace("**-8** Missing README", "**-8**Missing README");
    let errors = check(&[
        ("01-correctness", unauthorized.as_str()),
        ("02-documentation", malformed.as_str()),
    ])
    .expect_err("problems in both parts");

    let found: Vec<(&str, Option<&str>, Option<usize>)> = errors
        .iter()
        .map(|e| (e.kind(), e.location().part.as_deref(), e.location().line))
        .collect();
    assert_eq!(found, vec![
        ("UnauthorizedGrader", Some("01-correctness"), Some(15)),
        ("FormatError", Some("02-documentation"), Some(8)),
    ]);
}

#[test]
fn duplicate_entries_and_items_are_reported_together() {
    let text = "\
# Part
# Rubric
## late
**-5** Late
## late
**-10** Very late
# Grades
## [alice](u)
late
**Grader:** carol
## [alice](u)
**Grader:** dave
";
    let errors = check(&[("p", text)]).expect_err("duplicates");
    let kinds: Vec<&str> = errors.iter().map(GradingError::kind).collect();
    assert_eq!(kinds, vec!["DuplicateRubricItem", "DuplicateEntry"]);
}

#[test]
fn totals_never_go_below_zero() {
    let text = "\
# Part
# Rubric
# Grades
## [alice](u)
**-80** Missing part one
**-60** Missing part two
**Grader:** carol
";
    let documents = check(&[("p", text)]).expect("valid document");
    let grades = PartAggregator::new("assignment-2")
        .aggregate(&documents)
        .unwrap();
    assert_eq!(grades[&Identity::new("alice")].total(), 0);
    let report = TotalsCalculator.report(&grades[&Identity::new("alice")]);
    assert!(report.text.ends_with("**Total:** 0/100\n"));
}
