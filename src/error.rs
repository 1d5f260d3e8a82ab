#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use itertools::Itertools;

use crate::types::Identity;

/// Where in the grading material a problem was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Subject being graded, e.g. `assignment-1`.
    pub subject: Option<String>,
    /// Part of the subject (document title or file name).
    pub part:    Option<String>,
    /// 1-based line number inside the part document.
    pub line:    Option<usize>,
}

impl Location {
    /// A location pointing at a whole subject.
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Returns a copy narrowed to a part.
    pub fn with_part(&self, part: impl Into<String>) -> Self {
        Self {
            part: Some(part.into()),
            ..self.clone()
        }
    }

    /// Returns a copy narrowed to a line.
    pub fn at_line(&self, line: usize) -> Self {
        Self {
            line: Some(line),
            ..self.clone()
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut segments = Vec::new();
        if let Some(subject) = &self.subject {
            segments.push(subject.clone());
        }
        if let Some(part) = &self.part {
            segments.push(part.clone());
        }
        let mut out = if segments.is_empty() { "<input>".to_string() } else { segments.join("/") };
        if let Some(line) = self.line {
            out.push_str(&format!(":{line}"));
        }
        f.write_str(&out)
    }
}

/// Problems found in hand-edited grading documents and published reports.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GradingError {
    /// Section headers are missing, out of order, or unexpected.
    #[error("{location}: {message}")]
    Structure {
        /// Where the problem was found.
        location: Location,
        /// What is wrong with the document structure.
        message:  String,
    },
    /// A line is neither a point line nor a reference to a known rubric item.
    #[error("{location}: {message}: `{line}`")]
    Format {
        /// Where the problem was found.
        location: Location,
        /// The offending line, trimmed.
        line:     String,
        /// What is wrong with the line.
        message:  String,
    },
    /// The same rubric identifier is declared twice in one document.
    #[error("{location}: rubric item `{identifier}` is declared more than once")]
    DuplicateRubricItem {
        /// Where the duplicate declaration was found.
        location:   Location,
        /// The repeated identifier.
        identifier: String,
    },
    /// The same identity has two entries in one document.
    #[error("{location}: `{identity}` has more than one grade entry")]
    DuplicateEntry {
        /// Where the duplicate entry was found.
        location: Location,
        /// The repeated identity.
        identity: Identity,
    },
    /// A grade entry is signed by someone outside the staff roster.
    #[error("{location}: `{grader}` graded `{identity}` but is not on staff")]
    UnauthorizedGrader {
        /// Where the entry was found.
        location: Location,
        /// The graded identity.
        identity: Identity,
        /// The grader named in the entry.
        grader:   Identity,
    },
    /// Parts of one subject do not grade the same set of identities.
    #[error(
        "{location}: parts do not grade the same identities; missing from some parts: {}",
        identities.iter().join(", ")
    )]
    Consistency {
        /// The subject whose parts disagree.
        location:   Location,
        /// Every identity present in some parts but not all.
        identities: Vec<Identity>,
    },
    /// A previously published report has no extractable total line.
    #[error("{location}: report for `{identity}` has no single `**Total:** <n>/100` line")]
    MissingTotal {
        /// The subject of the report.
        location: Location,
        /// Whose report it is.
        identity: Identity,
    },
}

impl GradingError {
    /// Location the error refers to.
    pub fn location(&self) -> &Location {
        match self {
            GradingError::Structure { location, .. }
            | GradingError::Format { location, .. }
            | GradingError::DuplicateRubricItem { location, .. }
            | GradingError::DuplicateEntry { location, .. }
            | GradingError::UnauthorizedGrader { location, .. }
            | GradingError::Consistency { location, .. }
            | GradingError::MissingTotal { location, .. } => location,
        }
    }

    /// Short name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GradingError::Structure { .. } => "StructureError",
            GradingError::Format { .. } => "FormatError",
            GradingError::DuplicateRubricItem { .. } => "DuplicateRubricItem",
            GradingError::DuplicateEntry { .. } => "DuplicateEntry",
            GradingError::UnauthorizedGrader { .. } => "UnauthorizedGrader",
            GradingError::Consistency { .. } => "ConsistencyError",
            GradingError::MissingTotal { .. } => "MissingTotalError",
        }
    }
}

/// Every problem found for one subject, reported together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradingErrors(Vec<GradingError>);

impl GradingErrors {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more problem.
    pub fn push(&mut self, error: GradingError) {
        self.0.push(error);
    }

    /// Moves every problem of `other` into this collection.
    pub fn absorb(&mut self, other: GradingErrors) {
        self.0.extend(other.0);
    }

    /// Whether no problem has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded problems.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Recorded problems in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, GradingError> {
        self.0.iter()
    }

    /// `Ok(value)` when nothing was recorded, the whole collection otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, GradingErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<GradingError> for GradingErrors {
    fn from(error: GradingError) -> Self {
        Self(vec![error])
    }
}

impl Extend<GradingError> for GradingErrors {
    fn extend<T: IntoIterator<Item = GradingError>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for GradingErrors {
    type IntoIter = std::vec::IntoIter<GradingError>;
    type Item = GradingError;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for GradingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} problem(s) found:", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "- [{}] {error}", error.kind())?;
        }
        Ok(())
    }
}

impl std::error::Error for GradingErrors {}
