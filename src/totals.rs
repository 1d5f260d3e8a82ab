#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use serde::Serialize;

use crate::{
    aggregate::AggregatedGrade,
    error::{GradingError, Location},
    rubric::tokenizer::line,
    types::Identity,
};

/// Score every subject starts from before deltas are applied.
pub const BASE_SCORE: i64 = 100;

/// `max(0, 100 + sum(deltas))`; there is no upper cap.
pub fn compute_total<I>(deltas: I) -> u64
where
    I: IntoIterator<Item = i64>,
{
    let total = deltas
        .into_iter()
        .fold(BASE_SCORE, |acc, delta| acc.saturating_add(delta));
    total.max(0) as u64
}

/// Deltas of every point line in a rendered report, in order.
pub fn extract_deltas(text: &str) -> Vec<i64> {
    text.lines()
        .filter_map(|l| line::point_line(l).ok())
        .map(|p| p.delta)
        .collect()
}

/// Recovers the total from a published report without re-parsing it.
///
/// The report must contain exactly one `**Total:** <n>/100` line.
pub fn extract_total(
    text: &str,
    location: &Location,
    identity: &Identity,
) -> Result<u64, GradingError> {
    let mut totals = text.lines().filter_map(|l| line::total_line(l).ok());
    match (totals.next(), totals.next()) {
        (Some(total), None) => Ok(total),
        _ => Err(GradingError::MissingTotal {
            location: location.clone(),
            identity: identity.clone(),
        }),
    }
}

/// Renders the footer section holding the total.
pub fn render_footer(total: u64) -> String {
    format!("# Total\n\n**Total:** {total}/100\n")
}

/// A publishable per-identity report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    /// The graded subject.
    pub subject:  String,
    /// Whose report this is.
    pub identity: Identity,
    /// Bounded total.
    pub total:    u64,
    /// Full report text, footer included.
    pub text:     String,
}

/// Turns aggregated grades into final reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalsCalculator;

impl TotalsCalculator {
    /// Sums the point lines of the rendered grade and appends the footer.
    pub fn report(&self, grade: &AggregatedGrade) -> GradeReport {
        let body = grade.render();
        let total = compute_total(extract_deltas(&body));
        GradeReport {
            subject: grade.subject.clone(),
            identity: grade.identity.clone(),
            total,
            text: format!("{body}\n{}", render_footer(total)),
        }
    }

    /// Reports for many grades, preserving iteration order.
    pub fn reports<'a, I>(&self, grades: I) -> Vec<GradeReport>
    where
        I: IntoIterator<Item = &'a AggregatedGrade>,
    {
        grades.into_iter().map(|g| self.report(g)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate::PartSection, rubric::PointLine};

    fn grade(deltas: &[i64]) -> AggregatedGrade {
        AggregatedGrade {
            subject:  "a1".into(),
            identity: Identity::new("alice"),
            sections: vec![PartSection {
                title:  "Part 1".into(),
                source: "https://example.test".into(),
                lines:  deltas
                    .iter()
                    .map(|d| PointLine::new(*d, format!("reason {d}")))
                    .collect(),
                grader: Identity::new("carol"),
            }],
        }
    }

    #[test]
    fn sums_from_one_hundred() {
        assert_eq!(compute_total([-5, -10, 2]), 87);
        assert_eq!(compute_total([]), 100);
        assert_eq!(compute_total([30]), 130);
    }

    #[test]
    fn never_goes_negative() {
        assert_eq!(compute_total([-150]), 0);
        assert_eq!(compute_total([i64::MIN, -1]), 0);
    }

    #[test]
    fn report_footer_is_extractable() {
        let report = TotalsCalculator.report(&grade(&[-5, -10, 2]));
        assert_eq!(report.total, 87);
        assert!(report.text.ends_with("# Total\n\n**Total:** 87/100\n"));
        let total = extract_total(&report.text, &Location::subject("a1"), &report.identity)
            .expect("total line");
        assert_eq!(total, 87);
    }

    #[test]
    fn rendered_deltas_round_trip() {
        let grade = grade(&[-5, 3, -5, -1]);
        let report = TotalsCalculator.report(&grade);
        let mut rendered = extract_deltas(&report.text);
        let mut original = grade.deltas();
        rendered.sort_unstable();
        original.sort_unstable();
        assert_eq!(rendered, original);
    }

    #[test]
    fn missing_or_repeated_totals_are_errors() {
        let who = Identity::new("alice");
        let at = Location::subject("quiz");
        assert!(matches!(
            extract_total("# Part\n**-5** x\n", &at, &who),
            Err(GradingError::MissingTotal { .. })
        ));
        assert!(extract_total("**Total:** 1/100\n**Total:** 2/100\n", &at, &who).is_err());
    }
}
