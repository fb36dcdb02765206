//! Case sensitivity handling for text atoms
//!
//! Case folding only ever looks at literal runs: for plain substrings that is
//! the whole pattern, for regexes it is the literal nodes of the parsed form.
//! Classes, anchors and repetition operators are never folded.

use regex_syntax::hir::{Hir, HirKind};
use strum::{Display, EnumString};

/// How a `case:` directive applies to a text atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CaseMode {
    /// Always match case-sensitively
    Yes,
    /// Always match case-insensitively
    No,
    /// Case-sensitive only if the pattern contains an uppercase literal
    Auto,
}

impl CaseMode {
    /// Resolve the mode to a concrete flag, given whether the pattern has uppercase literals
    pub fn resolve(self, has_uppercase: bool) -> bool {
        match self {
            CaseMode::Yes => true,
            CaseMode::No => false,
            CaseMode::Auto => has_uppercase,
        }
    }
}

/// True if lowercasing `s` would change it
pub fn has_uppercase(s: &str) -> bool {
    s.chars().any(|c| c.to_lowercase().ne(std::iter::once(c)))
}

/// True if any literal run in the parsed regex would change under lowercasing
///
/// The parser merges single-character alternations into a class, so `x|Y`
/// has no literal run and never counts as uppercase.
pub fn regex_has_uppercase(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Literal(lit) => match std::str::from_utf8(&lit.0) {
            Ok(s) => has_uppercase(s),
            Err(_) => lit.0.iter().any(u8::is_ascii_uppercase),
        },
        HirKind::Repetition(rep) => regex_has_uppercase(&rep.sub),
        HirKind::Capture(cap) => regex_has_uppercase(&cap.sub),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => subs.iter().any(regex_has_uppercase),
        HirKind::Empty | HirKind::Class(_) | HirKind::Look(_) => false,
    }
}
