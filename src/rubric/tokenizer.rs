#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::rubric::document::PointLine;

/// Classification of a single line of a grading document or report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `# <text>`: a title or a section header.
    Section(&'a str),
    /// `## <text>`: a rubric item or grade entry header.
    Heading(&'a str),
    /// A point line, bold (`**-5** text`) or bare (`-5 text`).
    Points(PointLine),
    /// `**Grader:** <identity>`; the identity may be empty.
    Grader(&'a str),
    /// `**Total:** <n>/100`
    Total(u64),
    /// Only whitespace.
    Blank,
    /// Anything else, trimmed.
    Text(&'a str),
}

/// A token together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    /// 1-based line number.
    pub line:  usize,
    /// The raw line, trimmed.
    pub raw:   &'a str,
    /// The classified line.
    pub token: Token<'a>,
}

peg::parser! {
    /// Line grammar shared by grading documents and published reports.
    pub grammar line() for str {
        /// optional horizontal whitespace
        rule ws() = quiet!{[' ' | '\t']*}

        /// at least one horizontal whitespace character
        rule ws1() = quiet!{[' ' | '\t']+}

        /// a mandatory sign followed by digits, eg. `-10` or `+2`
        rule delta() -> i64
            = n:$(['+' | '-'] ['0'..='9']+) {? n.parse().or(Err("signed integer")) }

        /// the remainder of the line, trimmed
        rule rest() -> &'input str
            = r:$([_]*) { r.trim() }

        /// non-empty description following the delta
        rule description() -> String
            = d:rest() {? if d.is_empty() { Err("description") } else { Ok(d.to_string()) } }

        /// parses a point line in either the bold or the bare form
        pub rule point_line() -> PointLine
            = ws() "**" d:delta() "**" ws1() s:description() { PointLine::new(d, s) }
            / ws() d:delta() ws1() s:description() { PointLine::new(d, s) }

        /// parses a grader line and returns the (possibly empty) identity
        pub rule grader_line() -> &'input str
            = ws() "**Grader:**" g:rest() { g }

        /// parses the machine-extractable total footer line
        pub rule total_line() -> u64
            = ws() "**Total:**" ws() n:$(['0'..='9']+) "/100" ws() ![_]
            {? n.parse().or(Err("total")) }

        /// one character of a link target, where parentheses must balance
        rule url_part()
            = "(" url_part()* ")"
            / !['(' | ')'] [_]

        /// parses `[identity](url)` from an entry header
        pub rule entry_link() -> (&'input str, &'input str)
            = "[" i:$((!"]" [_])+) "](" u:$(url_part()*) ")" ws() ![_] { (i.trim(), u.trim()) }

        /// classifies one line
        pub rule token() -> Token<'input>
            = "## " h:rest() { Token::Heading(h) }
            / "# " s:rest() { Token::Section(s) }
            / g:grader_line() { Token::Grader(g) }
            / t:total_line() { Token::Total(t) }
            / p:point_line() { Token::Points(p) }
            / ws() ![_] { Token::Blank }
            / t:rest() { Token::Text(t) }
    }
}

/// Splits `text` into classified lines.
pub fn tokenize(text: &str) -> Vec<Located<'_>> {
    text.lines()
        .enumerate()
        .map(|(idx, raw)| {
            let token = line::token(raw).unwrap_or_else(|_| Token::Text(raw.trim()));
            Located {
                line: idx + 1,
                raw: raw.trim(),
                token,
            }
        })
        .collect()
}

/// Whether `text` would be read as a point line.
pub fn is_point_line(text: &str) -> bool {
    line::point_line(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_document_lines() {
        let tokens: Vec<Token> = tokenize(
            "# Part 1\n## late\n**-10** Late submission\n+2 Extra credit\n**Grader:** \
             carol\n\n[alice](https://x)\n**Total:** 87/100",
        )
        .into_iter()
        .map(|l| l.token)
        .collect();

        assert_eq!(
            tokens,
            vec![
                Token::Section("Part 1"),
                Token::Heading("late"),
                Token::Points(PointLine::new(-10, "Late submission")),
                Token::Points(PointLine::new(2, "Extra credit")),
                Token::Grader("carol"),
                Token::Blank,
                Token::Text("[alice](https://x)"),
                Token::Total(87),
            ]
        );
    }

    #[test]
    fn point_lines_need_sign_and_description() {
        assert!(!is_point_line("10 no sign"));
        assert!(!is_point_line("**-10**"));
        assert!(!is_point_line("**-10**   "));
        assert!(!is_point_line("-10points"));
        assert!(is_point_line("  -10 indented"));
    }

    #[test]
    fn entry_links_split_identity_and_url() {
        let (identity, url) =
            line::entry_link("[alice](https://example.test/tree/abc)").expect("parse link");
        assert_eq!(identity, "alice");
        assert_eq!(url, "https://example.test/tree/abc");
        assert!(line::entry_link("alice").is_err());
        assert!(line::entry_link("[](https://x)").is_err());
    }

    #[test]
    fn entry_links_keep_balanced_parentheses() {
        let (identity, url) = line::entry_link("[bob](https://example.test/wiki/Sum_(code))")
            .expect("parse link");
        assert_eq!(identity, "bob");
        assert_eq!(url, "https://example.test/wiki/Sum_(code)");
        assert!(line::entry_link("[bob](https://example.test/a)b)").is_err());
        assert!(line::entry_link("[bob](https://example.test/(a)").is_err());
    }

    #[test]
    fn total_line_rejects_other_denominators() {
        assert_eq!(line::total_line("**Total:** 0/100").expect("parse total"), 0);
        assert!(line::total_line("**Total:** 10/50").is_err());
        assert!(line::total_line("**Total:** -3/100").is_err());
    }
}
