#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use serde::Serialize;

use crate::{
    error::{GradingError, GradingErrors, Location},
    rubric::{GradeDocument, GradeEntry, GradeLine, PointLine},
    totals,
    types::Identity,
};

/// One part's contribution to an identity's grade, references expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartSection {
    /// Title of the part.
    pub title:  String,
    /// Link to the graded submission.
    pub source: String,
    /// Point lines after expanding rubric references.
    pub lines:  Vec<PointLine>,
    /// Who graded this part.
    pub grader: Identity,
}

impl Display for PartSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# {}\n", self.title)?;
        writeln!(f, "[Submission]({})\n", self.source)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        if !self.lines.is_empty() {
            writeln!(f)?;
        }
        writeln!(f, "**Grader:** {}", self.grader)
    }
}

/// Everything one identity received for one subject, part by part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedGrade {
    /// The graded subject.
    pub subject:  String,
    /// Whose grade this is.
    pub identity: Identity,
    /// Sections in the part order given to the aggregator.
    pub sections: Vec<PartSection>,
}

impl AggregatedGrade {
    /// Sections concatenated in part order.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every delta, in rendering order.
    pub fn deltas(&self) -> Vec<i64> {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter().map(|l| l.delta))
            .collect()
    }

    /// `max(0, 100 + sum of deltas)`.
    pub fn total(&self) -> u64 {
        totals::compute_total(self.deltas())
    }
}

/// Merges per-part grading documents of one subject into one grade per
/// identity.
pub struct PartAggregator<'a> {
    /// The subject the parts belong to.
    subject: &'a str,
}

impl<'a> PartAggregator<'a> {
    /// Creates an aggregator for `subject`.
    pub fn new(subject: &'a str) -> Self {
        Self { subject }
    }

    /// A [`GradingError::Consistency`] naming every identity that appears in
    /// some of `sets` but not all of them.
    pub fn consistency(&self, sets: &[BTreeSet<Identity>]) -> Option<GradingError> {
        let everyone: BTreeSet<&Identity> = sets.iter().flatten().collect();
        let mismatched: Vec<Identity> = everyone
            .into_iter()
            .filter(|identity| sets.iter().any(|set| !set.contains(*identity)))
            .cloned()
            .collect();
        (!mismatched.is_empty()).then(|| GradingError::Consistency {
            location:   Location::subject(self.subject),
            identities: mismatched,
        })
    }

    /// Aggregates `parts` in the order given.
    ///
    /// Either every identity gets a grade or none does: a mismatch in the
    /// identity sets of the parts or an unresolved rubric reference fails the
    /// whole subject.
    pub fn aggregate(
        &self,
        parts: &[GradeDocument],
    ) -> Result<BTreeMap<Identity, AggregatedGrade>, GradingErrors> {
        let location = Location::subject(self.subject);
        let mut errors = GradingErrors::new();

        let sets: Vec<BTreeSet<Identity>> = parts.iter().map(GradeDocument::identities).collect();
        let everyone: BTreeSet<Identity> = sets.iter().flatten().cloned().collect();
        errors.extend(self.consistency(&sets));

        let mut grades = BTreeMap::new();
        for identity in &everyone {
            let mut sections = Vec::with_capacity(parts.len());
            for part in parts {
                let Some(entry) = part.entry(identity) else {
                    continue;
                };
                match expand(part, entry, &location.with_part(part.title.as_str())) {
                    Ok(section) => sections.push(section),
                    Err(problems) => errors.absorb(problems),
                }
            }
            grades.insert(
                identity.clone(),
                AggregatedGrade {
                    subject: self.subject.to_string(),
                    identity: identity.clone(),
                    sections,
                },
            );
        }

        if errors.is_empty() {
            tracing::debug!(
                "{}: aggregated {} part(s) for {} identities",
                self.subject,
                parts.len(),
                grades.len()
            );
        }
        errors.into_result(grades)
    }
}

/// Replaces references in `entry` with the point lines of the rubric items
/// they name.
fn expand(
    part: &GradeDocument,
    entry: &GradeEntry,
    location: &Location,
) -> Result<PartSection, GradingErrors> {
    let mut errors = GradingErrors::new();
    let mut lines = Vec::new();

    for line in &entry.lines {
        match line {
            GradeLine::Points(points) => lines.push(points.clone()),
            GradeLine::Reference(identifier) => match part.rubric_item(identifier) {
                Some(item) => lines.extend(item.lines.iter().cloned()),
                None => errors.push(GradingError::Format {
                    location: location.at_line(entry.line),
                    line:     identifier.clone(),
                    message:  format!("`{}` references an unknown rubric item", entry.identity),
                }),
            },
        }
    }

    errors.into_result(PartSection {
        title: part.title.clone(),
        source: entry.source.clone(),
        lines,
        grader: entry.grader.clone(),
    })
}
