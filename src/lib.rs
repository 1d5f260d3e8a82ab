//! # gradebook
//!
//! Course administration around a hand-edited grading document format:
//! submissions are recorded in a ledger, staff grade each part of a subject
//! in a plain-text rubric document, and the documents are validated,
//! aggregated into per-student reports, and finally blended into semester
//! letter grades.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Merging per-part grades into one grade per identity
pub mod aggregate;
/// Course configuration and environment defaults
pub mod config;
/// Grading error taxonomy and the error accumulator
pub mod error;
/// Blending subject totals into letter grades
pub mod final_grade;
/// Submission records and the comment ledger codec
pub mod ledger;
/// End-to-end grading workflow
pub mod pipeline;
/// The collaboration platform the workflow drives
pub mod platform;
/// The grading document format: tokens, documents and the parser
pub mod rubric;
/// Restricted `{{variable}}` templates
pub mod template;
/// Totals, report footers and published reports
pub mod totals;
/// Identities and rosters
pub mod types;
/// Utility functions for convenience
pub mod util;
/// Duplicate and authorization checks on parsed documents
pub mod validate;

pub use error::{GradingError, GradingErrors, Location};
pub use pipeline::Pipeline;
pub use types::{Identity, Roster};
