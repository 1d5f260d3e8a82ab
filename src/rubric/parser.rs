#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeSet;

use crate::{
    error::{GradingError, GradingErrors, Location},
    rubric::{
        document::{GradeDocument, GradeEntry, GradeLine, RubricItem},
        tokenizer::{Located, Token, is_point_line, line, tokenize},
    },
    types::Identity,
};

/// Header of the rubric section.
pub const RUBRIC_SECTION: &str = "Rubric";
/// Header of the grades section.
pub const GRADES_SECTION: &str = "Grades";

/// Where the parser is in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before `# Rubric`; the title may or may not have been read.
    Title,
    /// Inside the rubric section.
    Rubric,
    /// Inside the grades section.
    Grades,
    /// Input consumed.
    Done,
}

/// A grade entry still being read.
struct PendingEntry {
    /// Whose work is graded.
    identity:    Identity,
    /// Link to the graded submission.
    source:      String,
    /// Body lines read so far.
    lines:       Vec<GradeLine>,
    /// Line of the entry header.
    line:        usize,
    /// Whether a grader line was seen.
    grader_seen: bool,
    /// The grader, if the grader line named one.
    grader:      Option<Identity>,
}

/// Everything a parse produced, even when it found problems.
#[derive(Debug, Clone, Default)]
pub struct PartialParse {
    /// The document, unless a structural problem stopped parsing.
    pub document:   Option<GradeDocument>,
    /// Identity of every well-formed entry header, graded or not.
    pub identities: BTreeSet<Identity>,
    /// Every problem found.
    pub errors:     GradingErrors,
}

/// Parses hand-edited grading documents into [`GradeDocument`]s.
///
/// Format problems are collected and parsing continues; a structural problem
/// (missing, repeated or misplaced `# ` sections) ends parsing because the
/// rest of the document can no longer be interpreted reliably.
pub struct DocumentParser {
    /// Base location attached to every error.
    location: Location,
    /// Current state.
    state:    State,
    /// Document being assembled.
    document: GradeDocument,
    /// Whether a title has been read.
    titled:   bool,
    /// Rubric item currently being read.
    item:     Option<RubricItem>,
    /// Entry currently being read.
    entry:    Option<PendingEntry>,
    /// Whether lines are ignored until the next entry header.
    skipping: bool,
    /// Identities named by entry headers so far.
    headers:  BTreeSet<Identity>,
    /// Problems found so far.
    errors:   GradingErrors,
}

impl DocumentParser {
    /// Creates a parser that reports errors relative to `location`.
    pub fn new(location: Location) -> Self {
        Self {
            location,
            state: State::Title,
            document: GradeDocument::default(),
            titled: false,
            item: None,
            entry: None,
            skipping: false,
            headers: BTreeSet::new(),
            errors: GradingErrors::new(),
        }
    }

    /// Parses `text`, returning the document or every problem found.
    pub fn parse(self, text: &str) -> Result<GradeDocument, GradingErrors> {
        let PartialParse {
            document, errors, ..
        } = self.parse_partial(text);
        match document {
            Some(document) => errors.into_result(document),
            None => Err(errors),
        }
    }

    /// Parses `text` as far as it can be interpreted.
    ///
    /// Unlike [`DocumentParser::parse`], the document read so far is kept
    /// alongside format problems, so callers can still compare identities
    /// across parts.
    pub fn parse_partial(mut self, text: &str) -> PartialParse {
        for located in tokenize(text) {
            let step = match self.state {
                State::Title => self.title_line(&located),
                State::Rubric => self.rubric_line(&located),
                State::Grades => self.grades_line(&located),
                State::Done => Ok(()),
            };
            if let Err(error) = step {
                self.errors.push(error);
                return self.stopped();
            }
        }

        let missing = match self.state {
            State::Title if !self.titled => Some("document has no `# <title>` line"),
            State::Title => Some("document has no `# Rubric` section"),
            State::Rubric => Some("document has no `# Grades` section"),
            State::Grades | State::Done => None,
        };
        if let Some(message) = missing {
            let error = self.structure(None, message);
            self.errors.push(error);
            return self.stopped();
        }
        self.finish_entry();
        self.state = State::Done;

        PartialParse {
            document:   Some(self.document),
            identities: self.headers,
            errors:     self.errors,
        }
    }

    /// Result of a parse ended by a structural problem.
    fn stopped(self) -> PartialParse {
        PartialParse {
            document:   None,
            identities: self.headers,
            errors:     self.errors,
        }
    }

    /// Handles a line before `# Rubric`.
    fn title_line(&mut self, located: &Located) -> Result<(), GradingError> {
        match &located.token {
            Token::Blank => Ok(()),
            Token::Section(name) if *name == RUBRIC_SECTION => {
                if !self.titled {
                    return Err(self.structure(
                        Some(located.line),
                        "`# Rubric` must be preceded by a `# <title>` line",
                    ));
                }
                self.state = State::Rubric;
                Ok(())
            }
            Token::Section(name) if *name == GRADES_SECTION => Err(self.structure(
                Some(located.line),
                "`# Grades` appears before `# Rubric`",
            )),
            Token::Section(name) if !self.titled && !name.is_empty() => {
                self.document.title = name.to_string();
                self.titled = true;
                Ok(())
            }
            _ if self.titled => Err(self.structure(
                Some(located.line),
                "expected `# Rubric` after the title",
            )),
            _ => Err(self.structure(Some(located.line), "expected a `# <title>` line")),
        }
    }

    /// Handles a line inside the rubric section.
    fn rubric_line(&mut self, located: &Located) -> Result<(), GradingError> {
        match &located.token {
            Token::Blank => {}
            Token::Section(name) if *name == GRADES_SECTION => {
                self.finish_item();
                self.state = State::Grades;
            }
            Token::Section(_) => {
                return Err(self.structure(
                    Some(located.line),
                    "only `# Grades` may follow the rubric section",
                ));
            }
            Token::Heading(identifier) => {
                self.finish_item();
                if identifier.is_empty() {
                    self.format(located, "rubric item has no identifier");
                } else if is_point_line(identifier) {
                    self.format(located, "rubric identifier reads as a point line");
                }
                self.item = Some(RubricItem {
                    identifier: identifier.to_string(),
                    lines:      Vec::new(),
                    line:       located.line,
                });
            }
            Token::Points(points) => match self.item.as_mut() {
                Some(item) => item.lines.push(points.clone()),
                None => self.format(located, "point line outside of a rubric item"),
            },
            Token::Grader(_) | Token::Total(_) | Token::Text(_) => {
                self.format(located, "rubric items may only contain point lines");
            }
        }
        Ok(())
    }

    /// Handles a line inside the grades section.
    fn grades_line(&mut self, located: &Located) -> Result<(), GradingError> {
        match &located.token {
            Token::Blank => return Ok(()),
            Token::Section(_) => {
                return Err(self.structure(
                    Some(located.line),
                    "no `# ` section may follow the grades section",
                ));
            }
            Token::Heading(header) => {
                self.finish_entry();
                match line::entry_link(header) {
                    Ok((identity, source)) => {
                        self.skipping = false;
                        self.headers.insert(Identity::new(identity));
                        self.entry = Some(PendingEntry {
                            identity:    Identity::new(identity),
                            source:      source.to_string(),
                            lines:       Vec::new(),
                            line:        located.line,
                            grader_seen: false,
                            grader:      None,
                        });
                    }
                    Err(_) => {
                        self.skipping = true;
                        self.format(located, "grade entry header must be `## [identity](url)`");
                    }
                }
                return Ok(());
            }
            _ => {}
        }

        if self.skipping {
            return Ok(());
        }

        let known = |identifier: &str| self.document.rubric_item(identifier).is_some();
        let problem = match (self.entry.as_ref(), &located.token) {
            (None, _) => Some("line outside of a grade entry"),
            (Some(entry), _) if entry.grader_seen => {
                Some("the grader line must be the last line of an entry")
            }
            (Some(_), Token::Text(text)) if !known(*text) => {
                Some("neither a point line nor a known rubric item")
            }
            (Some(_), Token::Total(_)) => Some("total lines do not belong in grade entries"),
            (Some(_), Token::Grader(name)) if name.is_empty() => Some("entry has not been graded"),
            _ => None,
        };
        if let Some(message) = problem {
            if let (Some(entry), Token::Grader(_)) = (self.entry.as_mut(), &located.token) {
                entry.grader_seen = true;
            }
            self.format(located, message);
            return Ok(());
        }

        if let Some(entry) = self.entry.as_mut() {
            match &located.token {
                Token::Points(points) => entry.lines.push(GradeLine::Points(points.clone())),
                Token::Text(identifier) => {
                    entry.lines.push(GradeLine::Reference(identifier.to_string()))
                }
                Token::Grader(name) => {
                    entry.grader_seen = true;
                    entry.grader = Some(Identity::new(*name));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Moves the rubric item being read into the document.
    fn finish_item(&mut self) {
        if let Some(item) = self.item.take() {
            self.document.rubric.push(item);
        }
    }

    /// Moves the entry being read into the document, if it is complete.
    fn finish_entry(&mut self) {
        let Some(pending) = self.entry.take() else {
            return;
        };
        match pending.grader {
            Some(grader) => self.document.entries.push(GradeEntry {
                identity: pending.identity,
                source: pending.source,
                lines: pending.lines,
                grader,
                line: pending.line,
            }),
            None if !pending.grader_seen => {
                self.errors.push(GradingError::Format {
                    location: self.location.at_line(pending.line),
                    line:     format!("[{}]({})", pending.identity, pending.source),
                    message:  "entry has no `**Grader:**` line".to_string(),
                });
            }
            // Already reported when the grader line was read.
            None => {}
        }
    }

    /// Builds a structure error at `line`.
    fn structure(&self, line: Option<usize>, message: &str) -> GradingError {
        let location = match line {
            Some(line) => self.location.at_line(line),
            None => self.location.clone(),
        };
        GradingError::Structure {
            location,
            message: message.to_string(),
        }
    }

    /// Records a format error for `located`.
    fn format(&mut self, located: &Located, message: &str) {
        self.errors.push(GradingError::Format {
            location: self.location.at_line(located.line),
            line:     located.raw.to_string(),
            message:  message.to_string(),
        });
    }
}

/// Parses one grading document, reporting errors relative to `location`.
pub fn parse_document(text: &str, location: &Location) -> Result<GradeDocument, GradingErrors> {
    DocumentParser::new(location.clone()).parse(text)
}
