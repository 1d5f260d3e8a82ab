#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt::Display};

use bon::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};

use crate::types::Identity;

/// A weighted ingredient of the semester grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Average of assignment totals, after the late-day penalty.
    Assignments,
    /// The quiz total.
    Quiz,
    /// Average of every project iteration except the last.
    Iterations,
    /// The last iteration, after manual point adjustments.
    Project,
}

impl Component {
    /// Every component, in reporting order.
    pub const ALL: [Component; 4] = [
        Component::Assignments,
        Component::Quiz,
        Component::Iterations,
        Component::Project,
    ];
}

impl Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Component::Assignments => "assignments",
            Component::Quiz => "quiz",
            Component::Iterations => "iterations",
            Component::Project => "project",
        })
    }
}

/// Weight of each component in the semester grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Breakdown {
    /// Weight of the assignments average.
    pub assignments: f64,
    /// Weight of the quiz.
    pub quiz:        f64,
    /// Weight of the iterations average.
    pub iterations:  f64,
    /// Weight of the final project.
    pub project:     f64,
}

impl Breakdown {
    /// Weight of `component`.
    pub fn weight(&self, component: Component) -> f64 {
        match component {
            Component::Assignments => self.assignments,
            Component::Quiz => self.quiz,
            Component::Iterations => self.iterations,
            Component::Project => self.project,
        }
    }
}

/// The lowest weighted total that earns `letter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutoff {
    /// Letter grade, e.g. `A-`.
    pub letter:  String,
    /// Inclusive lower bound.
    pub minimum: f64,
}

impl Cutoff {
    /// Creates a cutoff.
    pub fn new(letter: impl Into<String>, minimum: f64) -> Self {
        Self {
            letter: letter.into(),
            minimum,
        }
    }
}

/// Course-wide rules for turning subject totals into a semester grade.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct GradingPolicy {
    /// Late days a student may use without penalty.
    #[builder(default)]
    pub allowed_late_days:     u32,
    /// Points applied per late day beyond the allowance (usually negative).
    #[builder(default)]
    pub late_day_penalty_rate: f64,
    /// Component weights.
    pub breakdown:             Breakdown,
    /// Letter cutoffs, checked in the order given.
    pub cutoffs:               Vec<Cutoff>,
}

/// Subject totals already computed for one student.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(on(Identity, into))]
pub struct StudentScores {
    /// The student.
    pub identity:          Identity,
    /// One total per assignment.
    #[builder(default)]
    pub assignment_scores: Vec<f64>,
    /// Late days used on each assignment.
    #[builder(default)]
    pub late_days:         Vec<u32>,
    /// The quiz total.
    #[builder(default)]
    pub quiz:              f64,
    /// One total per project iteration; the last one is the project.
    #[builder(default)]
    pub iteration_scores:  Vec<f64>,
    /// Manual, signed adjustment applied to the project.
    #[builder(default)]
    pub point_adjustment:  f64,
}

/// A student's semester grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalGradeRecord {
    /// The student.
    pub identity:          Identity,
    /// Score of each component before weighting.
    pub component_scores:  BTreeMap<Component, f64>,
    /// Penalty applied to the assignments average.
    pub late_days_penalty: f64,
    /// Weighted sum of the components.
    pub weighted_total:    f64,
    /// Letter from the first matching cutoff.
    pub letter_grade:      String,
}

/// Ways the final-grade computation can fail.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FinalGradeError {
    /// No cutoff is low enough for the score.
    #[error("no cutoff matches `{identity}` with weighted total {score:.2}")]
    NoMatchingCutoff {
        /// The student.
        identity: Identity,
        /// The weighted total.
        score:    f64,
    },
}

/// Arithmetic mean, `0` for an empty slice.
fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Blends assignment, quiz, and project totals into letter grades.
pub struct FinalGradeEngine {
    /// Rules applied to every student.
    policy: GradingPolicy,
}

impl FinalGradeEngine {
    /// Creates an engine for `policy`.
    ///
    /// Cutoffs are used in the order given. Thresholds that are not strictly
    /// descending are accepted but logged, since later cutoffs could then be
    /// unreachable.
    pub fn new(policy: GradingPolicy) -> Self {
        let descending = policy
            .cutoffs
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.minimum > b.minimum);
        if !descending {
            tracing::warn!(
                "Cutoffs are not in strictly descending order: {}",
                policy
                    .cutoffs
                    .iter()
                    .map(|c| format!("{}={}", c.letter, c.minimum))
                    .join(", ")
            );
        }
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    /// `rate * max(0, used - allowed)`.
    pub fn late_days_penalty(&self, late_days: &[u32]) -> f64 {
        let used: u64 = late_days.iter().map(|d| u64::from(*d)).sum();
        let excess = used.saturating_sub(u64::from(self.policy.allowed_late_days));
        self.policy.late_day_penalty_rate * excess as f64
    }

    /// Letter of the first cutoff whose minimum is at most `score`.
    pub fn letter_grade(&self, score: f64) -> Option<&str> {
        self.policy
            .cutoffs
            .iter()
            .find(|c| c.minimum <= score)
            .map(|c| c.letter.as_str())
    }

    /// Computes one student's semester grade.
    pub fn grade(&self, scores: &StudentScores) -> Result<FinalGradeRecord, FinalGradeError> {
        if scores.assignment_scores.is_empty() || scores.iteration_scores.is_empty() {
            tracing::warn!("{} has no assignment or iteration totals", scores.identity);
        }

        let late_days_penalty = self.late_days_penalty(&scores.late_days);
        let assignments = (average(&scores.assignment_scores) + late_days_penalty).max(0.0);
        let (project, iterations) = match scores.iteration_scores.split_last() {
            Some((project, iterations)) => (*project, average(iterations)),
            None => (0.0, 0.0),
        };
        let project = (project + scores.point_adjustment).max(0.0);

        let component_scores = BTreeMap::from([
            (Component::Assignments, assignments),
            (Component::Quiz, scores.quiz),
            (Component::Iterations, iterations),
            (Component::Project, project),
        ]);
        let weighted_total = component_scores
            .iter()
            .map(|(component, score)| self.policy.breakdown.weight(*component) * score)
            .sum::<f64>();

        let letter_grade = self
            .letter_grade(weighted_total)
            .ok_or_else(|| FinalGradeError::NoMatchingCutoff {
                identity: scores.identity.clone(),
                score:    weighted_total,
            })?
            .to_string();

        Ok(FinalGradeRecord {
            identity: scores.identity.clone(),
            component_scores,
            late_days_penalty,
            weighted_total,
            letter_grade,
        })
    }

    /// Computes every student's grade; one failure fails the whole run.
    pub fn grade_all<'a, I>(&self, students: I) -> Result<GradeSummary, FinalGradeError>
    where
        I: IntoIterator<Item = &'a StudentScores>,
    {
        let records = students
            .into_iter()
            .map(|s| self.grade(s))
            .collect::<Result<Vec<_>, _>>()?;

        let counts = self
            .policy
            .cutoffs
            .iter()
            .map(|c| &c.letter)
            .unique()
            .map(|letter| {
                let count = records.iter().filter(|r| &r.letter_grade == letter).count();
                (letter.clone(), count)
            })
            .collect();

        Ok(GradeSummary { records, counts })
    }
}

/// A row of the letter distribution table.
#[derive(Tabled)]
struct LetterRow {
    /// Letter grade.
    #[tabled(rename = "Letter")]
    letter: String,
    /// Students with that letter.
    #[tabled(rename = "Students")]
    count:  usize,
}

/// A row of the per-student table.
#[derive(Tabled)]
struct StudentRow {
    /// The student.
    #[tabled(rename = "Student")]
    identity:    String,
    /// Project advisor, if any.
    #[tabled(rename = "Advisor")]
    advisor:     String,
    /// Assignments component.
    #[tabled(rename = "Assignments")]
    assignments: String,
    /// Quiz component.
    #[tabled(rename = "Quiz")]
    quiz:        String,
    /// Iterations component.
    #[tabled(rename = "Iterations")]
    iterations:  String,
    /// Project component.
    #[tabled(rename = "Project")]
    project:     String,
    /// Weighted total.
    #[tabled(rename = "Total")]
    total:       String,
    /// Letter grade.
    #[tabled(rename = "Grade")]
    letter:      String,
}

/// Every record of a final-grade run plus the letter distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSummary {
    /// One record per student, in input order.
    pub records: Vec<FinalGradeRecord>,
    /// Students per letter, in cutoff order.
    pub counts:  Vec<(String, usize)>,
}

impl GradeSummary {
    /// Number of students who received `letter`.
    pub fn count(&self, letter: &str) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == letter)
            .map_or(0, |(_, n)| *n)
    }

    /// Renders the distribution and the per-student tables.
    pub fn render(&self, advisors: &BTreeMap<Identity, Identity>) -> String {
        let distribution = Table::new(self.counts.iter().map(|(letter, count)| LetterRow {
            letter: letter.clone(),
            count:  *count,
        }))
        .with(Style::modern())
        .with(Panel::header("Distribution"))
        .to_string();

        let score = |record: &FinalGradeRecord, component: Component| {
            let value = record.component_scores.get(&component).copied();
            format!("{:.2}", value.unwrap_or_default())
        };
        let students = Table::new(self.records.iter().map(|r| StudentRow {
            identity:    r.identity.to_string(),
            advisor:     advisors
                .get(&r.identity)
                .map(ToString::to_string)
                .unwrap_or_default(),
            assignments: score(r, Component::Assignments),
            quiz:        score(r, Component::Quiz),
            iterations:  score(r, Component::Iterations),
            project:     score(r, Component::Project),
            total:       format!("{:.2}", r.weighted_total),
            letter:      r.letter_grade.clone(),
        }))
        .with(Style::modern())
        .with(Panel::header(format!("Final Grades ({} students)", self.records.len())))
        .to_string();

        format!("{distribution}\n\n{students}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> GradingPolicy {
        GradingPolicy::builder()
            .allowed_late_days(2)
            .late_day_penalty_rate(-5.0)
            .breakdown(Breakdown {
                assignments: 0.4,
                quiz:        0.2,
                iterations:  0.2,
                project:     0.2,
            })
            .cutoffs(vec![
                Cutoff::new("A", 90.0),
                Cutoff::new("B", 80.0),
                Cutoff::new("C", 70.0),
                Cutoff::new("F", 0.0),
            ])
            .build()
    }

    #[test]
    fn late_days_beyond_allowance_are_penalized() {
        let engine = FinalGradeEngine::new(policy());
        assert_eq!(engine.late_days_penalty(&[1, 3, 1]), -15.0);
        assert_eq!(engine.late_days_penalty(&[1, 1]), 0.0);
        assert_eq!(engine.late_days_penalty(&[]), 0.0);
    }

    #[test]
    fn weighted_blend_picks_first_matching_cutoff() {
        let engine = FinalGradeEngine::new(policy());
        let scores = StudentScores::builder()
            .identity("alice")
            .assignment_scores(vec![60.0, 80.0])
            .quiz(90.0)
            .iteration_scores(vec![70.0, 90.0, 70.0])
            .point_adjustment(5.0)
            .build();
        let record = engine.grade(&scores).expect("grade");

        assert_eq!(record.component_scores[&Component::Assignments], 70.0);
        assert_eq!(record.component_scores[&Component::Iterations], 80.0);
        assert_eq!(record.component_scores[&Component::Project], 75.0);
        assert!((record.weighted_total - 77.0).abs() < 1e-9);
        assert_eq!(record.letter_grade, "C");
    }

    #[test]
    fn components_are_floored_at_zero() {
        let engine = FinalGradeEngine::new(policy());
        let scores = StudentScores::builder()
            .identity("bob")
            .assignment_scores(vec![10.0])
            .late_days(vec![10])
            .iteration_scores(vec![5.0])
            .point_adjustment(-20.0)
            .build();
        let record = engine.grade(&scores).expect("grade");
        assert_eq!(record.late_days_penalty, -40.0);
        assert_eq!(record.component_scores[&Component::Assignments], 0.0);
        assert_eq!(record.component_scores[&Component::Iterations], 0.0);
        assert_eq!(record.component_scores[&Component::Project], 0.0);
        assert_eq!(record.letter_grade, "F");
    }

    #[test]
    fn cutoff_order_decides_the_letter() {
        let mut misordered = policy();
        misordered.cutoffs.reverse();
        let engine = FinalGradeEngine::new(misordered);
        assert_eq!(engine.letter_grade(95.0), Some("F"));
    }

    #[test]
    fn unmatched_score_fails_the_run() {
        let mut strict = policy();
        strict.cutoffs.pop();
        let engine = FinalGradeEngine::new(strict);
        let scores = StudentScores::builder().identity("carl").build();
        assert!(matches!(
            engine.grade_all([&scores]),
            Err(FinalGradeError::NoMatchingCutoff { .. })
        ));
    }

    #[test]
    fn summary_counts_letters_in_cutoff_order() {
        let engine = FinalGradeEngine::new(policy());
        let students = [
            StudentScores::builder()
                .identity("a")
                .assignment_scores(vec![100.0])
                .quiz(100.0)
                .iteration_scores(vec![100.0, 100.0])
                .build(),
            StudentScores::builder().identity("b").build(),
            StudentScores::builder().identity("c").build(),
        ];
        let summary = engine.grade_all(&students).expect("grades");
        assert_eq!(summary.counts, vec![
            ("A".to_string(), 1),
            ("B".to_string(), 0),
            ("C".to_string(), 0),
            ("F".to_string(), 2),
        ]);
        assert_eq!(summary.count("F"), 2);

        let advisors = BTreeMap::from([(Identity::new("a"), Identity::new("dave"))]);
        let rendered = summary.render(&advisors);
        assert!(rendered.contains("dave"));
        assert!(rendered.contains("100.00"));
    }
}
