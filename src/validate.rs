#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashSet;

use crate::{
    aggregate::PartAggregator,
    error::{GradingError, GradingErrors, Location},
    rubric::{DocumentParser, GradeDocument},
    types::Roster,
};

/// Checks that need more than one line of context: duplicates and grader
/// authorization.
pub struct RubricValidator<'a> {
    /// Identities allowed to sign grade entries.
    staff: &'a Roster,
}

impl<'a> RubricValidator<'a> {
    /// Creates a validator authorizing members of `staff`.
    pub fn new(staff: &'a Roster) -> Self {
        Self { staff }
    }

    /// Every problem in one parsed document.
    pub fn validate(&self, document: &GradeDocument, location: &Location) -> GradingErrors {
        let mut errors = GradingErrors::new();

        let mut identifiers = HashSet::new();
        for item in &document.rubric {
            if !identifiers.insert(item.identifier.as_str()) {
                errors.push(GradingError::DuplicateRubricItem {
                    location:   location.at_line(item.line),
                    identifier: item.identifier.clone(),
                });
            }
        }

        let mut identities = HashSet::new();
        for entry in &document.entries {
            if !identities.insert(&entry.identity) {
                errors.push(GradingError::DuplicateEntry {
                    location: location.at_line(entry.line),
                    identity: entry.identity.clone(),
                });
            }
            if !self.staff.contains(&entry.grader) {
                errors.push(GradingError::UnauthorizedGrader {
                    location: location.at_line(entry.line),
                    identity: entry.identity.clone(),
                    grader:   entry.grader.clone(),
                });
            }
        }

        errors
    }

    /// Parses and validates every part of `subject`.
    ///
    /// `parts` pairs a part name (used in error locations) with its text. All
    /// problems across all parts are returned together; documents are only
    /// returned when there are none. When some part has problems, identities
    /// are still compared across every part whose structure could be read, so a
    /// [`GradingError::Consistency`] is reported in the same pass.
    pub fn check_subject<'p, I>(
        &self,
        subject: &str,
        parts: I,
    ) -> Result<Vec<GradeDocument>, GradingErrors>
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        let mut errors = GradingErrors::new();
        let mut documents = Vec::new();
        let mut identity_sets = Vec::new();

        for (part, text) in parts {
            let location = Location::subject(subject).with_part(part);
            let partial = DocumentParser::new(location.clone()).parse_partial(text);
            errors.absorb(partial.errors);
            if let Some(document) = partial.document {
                errors.absorb(self.validate(&document, &location));
                identity_sets.push(partial.identities);
                documents.push(document);
            }
        }

        if !errors.is_empty() {
            // Aggregation will not run, so compare identities here.
            errors.extend(PartAggregator::new(subject).consistency(&identity_sets));
            tracing::warn!("{subject}: {} problem(s) in grading documents", errors.len());
        }
        errors.into_result(documents)
    }
}
