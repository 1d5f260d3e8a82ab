#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! `{{variable}}` substitution over a fixed set of names.
//!
//! Templates come from course configuration, so nothing in them is ever
//! evaluated: a placeholder can only name one of the [`Variable`]s below.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

/// Names a template may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    /// Course identifier, e.g. `2026-fall`.
    Course,
    /// Subject being graded.
    Subject,
    /// Part title.
    Part,
    /// Identity being graded.
    Identity,
    /// Version pointer of the submission.
    Reference,
}

impl Variable {
    /// Every variable.
    pub const ALL: [Variable; 5] = [
        Variable::Course,
        Variable::Subject,
        Variable::Part,
        Variable::Identity,
        Variable::Reference,
    ];

    /// Name used inside `{{ }}`.
    pub fn name(&self) -> &'static str {
        match self {
            Variable::Course => "course",
            Variable::Subject => "subject",
            Variable::Part => "part",
            Variable::Identity => "identity",
            Variable::Reference => "reference",
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL.into_iter().find(|v| v.name() == s).ok_or(())
    }
}

/// Template problems.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names something outside the fixed variable set.
    #[error("unknown template variable `{name}` at byte {offset}")]
    UnknownVariable {
        /// The name used.
        name:   String,
        /// Byte offset of the opening braces.
        offset: usize,
    },
    /// `{{` without a matching `}}`.
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
    /// Rendering needed a variable that was not bound.
    #[error("template variable `{0}` has no value")]
    Unbound(Variable),
}

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Copied verbatim.
    Literal(String),
    /// Replaced by a bound value.
    Placeholder(Variable),
}

/// Values for a render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<Variable, String>);

impl Bindings {
    /// No values bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `variable` to `value`.
    pub fn bind(mut self, variable: Variable, value: impl Into<String>) -> Self {
        self.0.insert(variable, value.into());
        self
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Literal text and placeholders, in order.
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `text`, rejecting unknown or unterminated placeholders.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + open))?;
            let name = after[..close].trim();
            let variable = name
                .parse::<Variable>()
                .map_err(|_| TemplateError::UnknownVariable {
                    name:   name.to_string(),
                    offset: offset + open,
                })?;
            segments.push(Segment::Placeholder(variable));

            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Variables the template refers to.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(v) => Some(*v),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes every placeholder.
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(variable) => out.push_str(
                    bindings
                        .0
                        .get(variable)
                        .ok_or(TemplateError::Unbound(*variable))?,
                ),
            }
        }
        Ok(out)
    }
}
