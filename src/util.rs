#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::types::Identity;

/// Lowercases `text` and replaces every run of non-alphanumeric characters
/// with a single `-`, eg. `Part 2: Tests` becomes `part-2-tests`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Name of the private repository of a student.
pub fn student_repository(course: &str, identity: &Identity) -> String {
    format!("{course}-student-{identity}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Part 2: Tests"), "part-2-tests");
        assert_eq!(slugify("  --Design--  "), "design");
        assert_eq!(slugify("Assignment 1 grades"), "assignment-1-grades");
    }

    #[test]
    fn repositories_follow_course_naming() {
        assert_eq!(
            student_repository("2026-fall", &Identity::new("alice")),
            "2026-fall-student-alice"
        );
    }
}
