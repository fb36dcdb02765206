//! Reflex Query: the query algebra of a distributed code search engine
//!
//! Queries are trees of atoms (substrings, regexes, file names, repositories,
//! branches, languages, symbols) composed with boolean combinators. This
//! crate defines that tree and the operations every consumer shares; it does
//! not parse query strings and does not execute queries.
//!
//! # Architecture
//!
//! - **Query**: the closed set of node kinds and their debug rendering
//! - **Simplify**: constant folding and flattening into a normal form
//! - **Tree**: generic bottom-up rewrites and atom visitation
//! - **Wire**: schema'd message encoding for service boundaries
//! - **Cache**: compact byte encoding plus a memoizing wrapper for fan-out
//!
//! # Example Usage
//!
//! ```
//! use reflex_query::{simplify, tree, Q};
//!
//! let q = Q::and([
//!     Q::and([Q::substring("foo"), Q::constant(true)]),
//!     Q::language("go"),
//! ]);
//! let q = simplify(q);
//! assert_eq!(q.to_string(), r#"(and substr:"foo" lang:go)"#);
//!
//! let expanded = simplify(tree::map(q, tree::expand_file_content));
//! assert_eq!(
//!     expanded.to_string(),
//!     r#"(and (or file_substr:"foo" content_substr:"foo") lang:go)"#
//! );
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod depth;
pub mod error;
pub mod output;
pub mod query;
pub mod simplify;
pub mod tree;
pub mod wire;

// Re-export commonly used types
pub use cache::CachedQuery;
pub use config::CodecConfig;
pub use error::{DecodeError, EncodeError};
pub use query::{CaseMode, Q, ResultKind};
pub use simplify::simplify;
