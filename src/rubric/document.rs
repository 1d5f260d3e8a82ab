#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeSet, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::types::Identity;

/// A signed adjustment to the score with a short justification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointLine {
    /// Points added (positive) or taken off (negative).
    pub delta:       i64,
    /// Why the points were adjusted.
    pub description: String,
}

impl PointLine {
    /// Creates a point line.
    pub fn new(delta: i64, description: impl Into<String>) -> Self {
        Self {
            delta,
            description: description.into(),
        }
    }
}

impl Display for PointLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "**{:+}** {}", self.delta, self.description)
    }
}

/// A named, reusable bundle of point lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricItem {
    /// Identifier graders use to reference this item.
    pub identifier: String,
    /// Point lines the item expands to, in order.
    pub lines:      Vec<PointLine>,
    /// Line of the `## ` header that declared the item (1-based, 0 if built
    /// in memory).
    pub line:       usize,
}

impl RubricItem {
    /// Creates a rubric item that was not parsed from a document.
    pub fn new(identifier: impl Into<String>, lines: Vec<PointLine>) -> Self {
        Self {
            identifier: identifier.into(),
            lines,
            line: 0,
        }
    }
}

/// One line of a grade entry body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeLine {
    /// An inline point adjustment.
    Points(PointLine),
    /// A bare rubric identifier standing for that item's point lines.
    Reference(String),
}

/// The grade a single grader assigned to one identity in one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeEntry {
    /// Whose work is graded.
    pub identity: Identity,
    /// Link to the graded submission.
    pub source:   String,
    /// Body lines, in document order.
    pub lines:    Vec<GradeLine>,
    /// Who signed the entry.
    pub grader:   Identity,
    /// Line of the `## [identity](url)` header (1-based, 0 if built in
    /// memory).
    pub line:     usize,
}

/// One part of a graded subject, as written by graders.
///
/// Items and entries keep document order and may contain duplicates; the
/// validator is responsible for rejecting those.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDocument {
    /// Title of the part.
    pub title:   String,
    /// Rubric items in declaration order.
    pub rubric:  Vec<RubricItem>,
    /// Grade entries in document order.
    pub entries: Vec<GradeEntry>,
}

impl GradeDocument {
    /// First rubric item declared with `identifier`.
    pub fn rubric_item(&self, identifier: &str) -> Option<&RubricItem> {
        self.rubric.iter().find(|item| item.identifier == identifier)
    }

    /// First entry grading `identity`.
    pub fn entry(&self, identity: &Identity) -> Option<&GradeEntry> {
        self.entries.iter().find(|entry| &entry.identity == identity)
    }

    /// Identities that have an entry in this part.
    pub fn identities(&self) -> BTreeSet<Identity> {
        self.entries.iter().map(|e| e.identity.clone()).collect()
    }

    /// Renders the document back into the hand-editable text format.
    pub fn render(&self) -> String {
        let mut out = render_head(&self.title, &self.rubric);
        for entry in &self.entries {
            out.push_str(&format!("## [{}]({})\n\n", entry.identity, entry.source));
            for line in &entry.lines {
                match line {
                    GradeLine::Points(points) => out.push_str(&format!("{points}\n")),
                    GradeLine::Reference(identifier) => out.push_str(&format!("{identifier}\n")),
                }
            }
            if !entry.lines.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("**Grader:** {}\n\n", entry.grader));
        }
        out
    }
}

/// Renders an ungraded document: every submission gets an empty entry with a
/// blank grader line for staff to fill in.
pub fn render_scaffold<'a, I>(title: &str, rubric: &[RubricItem], submissions: I) -> String
where
    I: IntoIterator<Item = (&'a Identity, &'a str)>,
{
    let mut out = render_head(title, rubric);
    for (identity, source) in submissions {
        out.push_str(&format!("## [{identity}]({source})\n\n**Grader:** \n\n"));
    }
    out
}

/// Title, rubric, and the `# Grades` header.
fn render_head(title: &str, rubric: &[RubricItem]) -> String {
    let mut out = format!("# {title}\n\n# Rubric\n\n");
    for item in rubric {
        out.push_str(&format!("## {}\n\n", item.identifier));
        for line in &item.lines {
            out.push_str(&format!("{line}\n"));
        }
        out.push('\n');
    }
    out.push_str("# Grades\n\n");
    out
}
