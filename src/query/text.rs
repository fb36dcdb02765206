//! Text atoms: constants, substrings, regexes, symbols, languages and branches

use regex_syntax::hir::{Hir, HirKind};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::case::{self, CaseMode};
use super::Q;
use crate::error::DecodeError;

/// Parse a regex source with the fixed flag set every codec uses
///
/// Both the wire and the cache codec carry only the source string, so this
/// is the single place that decides how a transported regex is rebuilt.
///
/// Flags: negated classes such as `[^a]` match newline while `.` does not,
/// Perl classes (`\d`, `\w`, `\s`), lazy repetition and non-capturing
/// groups are accepted, and Unicode groups (`\pL`, `\p{Greek}`) are
/// enabled. `^`/`$` anchor at the text boundaries, not at line breaks.
pub(crate) fn parse_regexp(source: &str) -> Result<Hir, DecodeError> {
    regex_syntax::ParserBuilder::new()
        .unicode(true)
        .dot_matches_new_line(false)
        .multi_line(false)
        .case_insensitive(false)
        .build()
        .parse(source)
        .map_err(|e| DecodeError::regex(source, e))
}

/// Tautology or falsity produced by constant folding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Const {
    pub value: bool,
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.value { "TRUE" } else { "FALSE" })
    }
}

/// The most basic query: a literal substring
///
/// `file_name` and `content` select where to look. Both set or both clear
/// means either location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substring {
    pub pattern: String,
    pub case_sensitive: bool,
    /// Match only file names
    pub file_name: bool,
    /// Match only file content
    pub content: bool,
}

impl Substring {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn set_case(&mut self, mode: CaseMode) {
        self.case_sensitive = mode.resolve(case::has_uppercase(&self.pattern));
    }
}

impl fmt::Display for Substring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.case_sensitive {
            f.write_str("case_")?;
        }
        if self.file_name {
            f.write_str("file_")?;
        } else if self.content {
            f.write_str("content_")?;
        }
        write!(f, "substr:{:?}", self.pattern)
    }
}

/// Regular expression match over file names and/or content
///
/// The parsed form and the source string are kept together and only built
/// through [`Regexp::parse`], so they cannot drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "RegexpFrame", try_from = "RegexpFrame")]
pub struct Regexp {
    regexp: Hir,
    source: String,
    pub case_sensitive: bool,
    pub file_name: bool,
    pub content: bool,
}

impl Regexp {
    /// Parse `source` into a regex atom with all flags cleared
    pub fn parse(source: &str) -> Result<Self, DecodeError> {
        Ok(Self {
            regexp: parse_regexp(source)?,
            source: source.to_string(),
            case_sensitive: false,
            file_name: false,
            content: false,
        })
    }

    /// The parsed form
    pub fn hir(&self) -> &Hir {
        &self.regexp
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if the regex is the empty match, which every document satisfies
    pub fn is_empty_match(&self) -> bool {
        matches!(self.regexp.kind(), HirKind::Empty)
    }

    pub fn set_case(&mut self, mode: CaseMode) {
        self.case_sensitive = mode.resolve(case::regex_has_uppercase(&self.regexp));
    }
}

// The compiled form is derived from the source, so only the source counts.
impl PartialEq for Regexp {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.case_sensitive == other.case_sensitive
            && self.file_name == other.file_name
            && self.content == other.content
    }
}

impl Eq for Regexp {}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.case_sensitive {
            f.write_str("case_")?;
        }
        if self.file_name {
            f.write_str("file_")?;
        }
        write!(f, "regex:{:?}", self.source)
    }
}

/// Cache-encoding form of [`Regexp`]: the parsed form is dropped and rebuilt on decode
#[derive(Serialize, Deserialize)]
struct RegexpFrame {
    source: String,
    case_sensitive: bool,
    file_name: bool,
    content: bool,
}

impl From<Regexp> for RegexpFrame {
    fn from(q: Regexp) -> Self {
        Self {
            source: q.source,
            case_sensitive: q.case_sensitive,
            file_name: q.file_name,
            content: q.content,
        }
    }
}

impl TryFrom<RegexpFrame> for Regexp {
    type Error = DecodeError;

    fn try_from(frame: RegexpFrame) -> Result<Self, Self::Error> {
        let mut q = Regexp::parse(&frame.source)?;
        q.case_sensitive = frame.case_sensitive;
        q.file_name = frame.file_name;
        q.content = frame.content;
        Ok(q)
    }
}

/// Restricts the wrapped query to symbol definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub expr: Box<Q>,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym:{}", self.expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lang:{}", self.language)
    }
}

/// Limits search to branches matching `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub pattern: String,
    /// The branch name must equal `pattern` instead of containing it
    pub exact: bool,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exact {
            write!(f, "branch={:?}", self.pattern)
        } else {
            write!(f, "branch:{:?}", self.pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::hir::Class;

    #[test]
    fn test_substring_display() {
        let mut q = Substring::new("foo");
        assert_eq!(q.to_string(), r#"substr:"foo""#);

        q.content = true;
        assert_eq!(q.to_string(), r#"content_substr:"foo""#);

        q.file_name = true;
        q.case_sensitive = true;
        assert_eq!(q.to_string(), r#"case_file_substr:"foo""#);
    }

    #[test]
    fn test_regexp_equality_ignores_parsed_form() {
        let a = Regexp::parse("fo+").unwrap();
        let b = Regexp::parse("fo+").unwrap();
        assert_eq!(a, b);

        let mut c = Regexp::parse("fo+").unwrap();
        c.case_sensitive = true;
        assert_ne!(a, c);

        // Same language, different source
        let d = Regexp::parse("foo*").unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn test_regexp_parse_error() {
        let err = Regexp::parse("a(b").unwrap_err();
        assert!(matches!(err, DecodeError::Regex { ref pattern, .. } if pattern == "a(b"));
    }

    #[test]
    fn test_regexp_empty_match() {
        assert!(Regexp::parse("").unwrap().is_empty_match());
        assert!(!Regexp::parse("a*").unwrap().is_empty_match());
        assert!(!Regexp::parse("x").unwrap().is_empty_match());
    }

    fn class_contains(hir: &Hir, c: char) -> bool {
        match hir.kind() {
            HirKind::Class(Class::Unicode(cls)) => {
                cls.ranges().iter().any(|r| r.start() <= c && c <= r.end())
            }
            _ => false,
        }
    }

    #[test]
    fn test_regexp_parser_flags() {
        assert!(class_contains(Regexp::parse("[^a]").unwrap().hir(), '\n'));
        assert!(!class_contains(Regexp::parse(".").unwrap().hir(), '\n'));
        assert!(class_contains(Regexp::parse(".").unwrap().hir(), 'x'));

        for source in [r"\d+\s\w", r"a+?b*?", r"(?:ab)+", r"\pL", r"\p{Greek}"] {
            assert!(Regexp::parse(source).is_ok(), "Failed to parse {}", source);
        }
    }

    #[test]
    fn test_set_case_auto() {
        let mut q = Substring::new("Foo");
        q.set_case(CaseMode::Auto);
        assert!(q.case_sensitive);
        q.set_case(CaseMode::No);
        assert!(!q.case_sensitive);

        let mut r = Regexp::parse(r"foo\w+").unwrap();
        r.set_case(CaseMode::Auto);
        assert!(!r.case_sensitive);
        r.set_case(CaseMode::Yes);
        assert!(r.case_sensitive);
    }

    #[test]
    fn test_branch_display() {
        let exact = Branch { pattern: "main".to_string(), exact: true };
        let fuzzy = Branch { pattern: "dev".to_string(), exact: false };
        assert_eq!(exact.to_string(), r#"branch="main""#);
        assert_eq!(fuzzy.to_string(), r#"branch:"dev""#);
    }
}
