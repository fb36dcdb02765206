//! The query tree
//!
//! A query is a closed, recursive sum type: boolean combinators (`And`, `Or`,
//! `Not`), a result-granularity wrapper (`Type`), and atoms that match file
//! content, file names, repositories, branches, languages or symbols.
//!
//! Trees are values. They are built once (by a parser, a decoder, or a
//! rewrite), never mutated while shared, and are safe to read from many
//! threads at once. Rewrites in [`crate::tree`] and [`crate::simplify`] take
//! the tree by value and move unchanged subtrees into their output.
//!
//! Every node renders as a single-line s-expression through `Display`, for
//! logs and tests. The rendering is not meant to be parsed back.

pub mod case;
pub mod repos;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

pub use case::CaseMode;
pub use repos::{BranchRepos, BranchesRepos, FileNameSet, RawConfig, Repo, RepoIds, RepoRegexp, RepoSet};
pub use text::{Branch, Const, Language, Regexp, Substring, Symbol};

/// A search query node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Q {
    And(And),
    Or(Or),
    Not(Not),
    Type(Type),
    Const(Const),
    Substring(Substring),
    Regexp(Regexp),
    Symbol(Symbol),
    Language(Language),
    Branch(Branch),
    Repo(Repo),
    RepoRegexp(RepoRegexp),
    RawConfig(RawConfig),
    RepoSet(RepoSet),
    FileNameSet(FileNameSet),
    RepoIds(RepoIds),
    BranchesRepos(BranchesRepos),
}

/// Matched when all children match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct And {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub children: Vec<Q>,
}

/// Matched when any child matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Or {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub children: Vec<Q>,
}

/// Inverts the meaning of its child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Not {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub child: Box<Q>,
}

/// Granularity of the results a query resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResultKind {
    FileMatch,
    FileName,
    Repo,
}

impl ResultKind {
    /// Numeric value used on the wire
    pub fn as_u32(self) -> u32 {
        match self {
            ResultKind::FileMatch => 0,
            ResultKind::FileName => 1,
            ResultKind::Repo => 2,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(ResultKind::FileMatch),
            1 => Some(ResultKind::FileName),
            2 => Some(ResultKind::Repo),
            _ => None,
        }
    }
}

/// Changes what kind of result the child query returns
///
/// This is not a filter: `(type:repo x)` returns the repositories containing
/// a match for `x` rather than the matches themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub child: Box<Q>,
    pub kind: ResultKind,
}

impl Q {
    /// Syntactic sugar for an `And` node
    pub fn and(children: impl IntoIterator<Item = Q>) -> Q {
        Q::And(And { children: children.into_iter().collect() })
    }

    /// Syntactic sugar for an `Or` node
    pub fn or(children: impl IntoIterator<Item = Q>) -> Q {
        Q::Or(Or { children: children.into_iter().collect() })
    }

    pub fn not(child: Q) -> Q {
        Q::Not(Not { child: Box::new(child) })
    }

    pub fn with_type(kind: ResultKind, child: Q) -> Q {
        Q::Type(Type { child: Box::new(child), kind })
    }

    pub fn constant(value: bool) -> Q {
        Q::Const(Const { value })
    }

    pub fn substring(pattern: impl Into<String>) -> Q {
        Q::Substring(Substring::new(pattern))
    }

    pub fn symbol(expr: Q) -> Q {
        Q::Symbol(Symbol { expr: Box::new(expr) })
    }

    pub fn language(language: impl Into<String>) -> Q {
        Q::Language(Language { language: language.into() })
    }

    pub fn branch(pattern: impl Into<String>, exact: bool) -> Q {
        Q::Branch(Branch { pattern: pattern.into(), exact })
    }

    /// True for combinators (`And`, `Or`, `Not`, `Type`), false for atoms
    pub fn is_combinator(&self) -> bool {
        matches!(self, Q::And(_) | Q::Or(_) | Q::Not(_) | Q::Type(_))
    }

    pub fn is_atom(&self) -> bool {
        !self.is_combinator()
    }

    /// The constant value if this node is a `Const`
    pub fn as_const(&self) -> Option<bool> {
        match self {
            Q::Const(c) => Some(c.value),
            _ => None,
        }
    }

    /// Apply a `case:` directive to this node
    ///
    /// Only substrings, regexes, and symbols wrapping one of those support
    /// case sensitivity. Returns `false` (leaving the node untouched) for
    /// every other variant.
    pub fn set_case(&mut self, mode: CaseMode) -> bool {
        match self {
            Q::Substring(s) => {
                s.set_case(mode);
                true
            }
            Q::Regexp(r) => {
                r.set_case(mode);
                true
            }
            Q::Symbol(s) => s.expr.set_case(mode),
            _ => false,
        }
    }
}

impl From<Substring> for Q {
    fn from(q: Substring) -> Self {
        Q::Substring(q)
    }
}

impl From<Regexp> for Q {
    fn from(q: Regexp) -> Self {
        Q::Regexp(q)
    }
}

impl From<Repo> for Q {
    fn from(q: Repo) -> Self {
        Q::Repo(q)
    }
}

impl From<RepoRegexp> for Q {
    fn from(q: RepoRegexp) -> Self {
        Q::RepoRegexp(q)
    }
}

impl From<RawConfig> for Q {
    fn from(q: RawConfig) -> Self {
        Q::RawConfig(q)
    }
}

impl From<RepoSet> for Q {
    fn from(q: RepoSet) -> Self {
        Q::RepoSet(q)
    }
}

impl From<FileNameSet> for Q {
    fn from(q: FileNameSet) -> Self {
        Q::FileNameSet(q)
    }
}

impl From<RepoIds> for Q {
    fn from(q: RepoIds) -> Self {
        Q::RepoIds(q)
    }
}

impl From<BranchesRepos> for Q {
    fn from(q: BranchesRepos) -> Self {
        Q::BranchesRepos(q)
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, op: &str, children: &[Q]) -> fmt::Result {
    write!(f, "({}", op)?;
    for child in children {
        write!(f, " {}", child)?;
    }
    f.write_str(")")
}

impl fmt::Display for Q {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Q::And(q) => write_children(f, "and", &q.children),
            Q::Or(q) => write_children(f, "or", &q.children),
            Q::Not(q) => write!(f, "(not {})", q.child),
            Q::Type(q) => write!(f, "(type:{} {})", q.kind, q.child),
            Q::Const(q) => fmt::Display::fmt(q, f),
            Q::Substring(q) => fmt::Display::fmt(q, f),
            Q::Regexp(q) => fmt::Display::fmt(q, f),
            Q::Symbol(q) => fmt::Display::fmt(q, f),
            Q::Language(q) => fmt::Display::fmt(q, f),
            Q::Branch(q) => fmt::Display::fmt(q, f),
            Q::Repo(q) => fmt::Display::fmt(q, f),
            Q::RepoRegexp(q) => fmt::Display::fmt(q, f),
            Q::RawConfig(q) => fmt::Display::fmt(q, f),
            Q::RepoSet(q) => fmt::Display::fmt(q, f),
            Q::FileNameSet(q) => fmt::Display::fmt(q, f),
            Q::RepoIds(q) => fmt::Display::fmt(q, f),
            Q::BranchesRepos(q) => fmt::Display::fmt(q, f),
        }
    }
}
