#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Grading document data model and rendering.
pub mod document;
/// Section state machine turning tokens into documents.
pub mod parser;
/// Line grammar for documents and reports.
pub mod tokenizer;

pub use document::{GradeDocument, GradeEntry, GradeLine, PointLine, RubricItem, render_scaffold};
pub use parser::{DocumentParser, PartialParse, parse_document};
pub use tokenizer::{Token, tokenize};
