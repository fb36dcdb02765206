//! Test Helper Functions for Query Tests
//!
//! Provides a small document corpus and a reference evaluator for query
//! trees, so tests can check that a rewrite matches exactly the same
//! documents as the query it came from.

#![allow(dead_code)]

use regex::RegexBuilder;
use reflex_query::query::{RawConfig, Substring};
use reflex_query::Q;

/// A document as the evaluator sees it
#[derive(Debug, Clone)]
pub struct Doc {
    pub repo: String,
    pub repo_id: u32,
    pub branches: Vec<String>,
    pub file_name: String,
    pub content: String,
    pub language: String,
    pub symbols: Vec<String>,
    pub private: bool,
    pub fork: bool,
    pub archived: bool,
}

impl Doc {
    fn new(repo: &str, repo_id: u32, file_name: &str, content: &str, language: &str) -> Self {
        Self {
            repo: repo.to_string(),
            repo_id,
            branches: vec!["main".to_string()],
            file_name: file_name.to_string(),
            content: content.to_string(),
            language: language.to_string(),
            symbols: Vec::new(),
            private: false,
            fork: false,
            archived: false,
        }
    }
}

/// A handful of documents covering every field the evaluator looks at
pub fn corpus() -> Vec<Doc> {
    let mut server = Doc::new(
        "github.com/acme/server",
        1,
        "cmd/server/main.go",
        "package main\n\nfunc NewServer() *Server { return &Server{} }\n",
        "go",
    );
    server.symbols = vec!["NewServer".to_string(), "Server".to_string()];
    server.branches.push("release".to_string());

    let mut client = Doc::new(
        "github.com/acme/client",
        2,
        "src/lib.rs",
        "pub fn connect(addr: &str) -> Client { Client::new(addr) }\n",
        "rust",
    );
    client.symbols = vec!["connect".to_string()];
    client.private = true;

    let mut fork = Doc::new(
        "github.com/someone/server",
        3,
        "README.md",
        "A fork of the acme server.\n",
        "markdown",
    );
    fork.fork = true;
    fork.branches = vec!["dev".to_string()];

    let mut legacy = Doc::new(
        "gitlab.com/acme/legacy",
        70_000,
        "server.py",
        "def new_server():\n    return Server()\n",
        "python",
    );
    legacy.symbols = vec!["new_server".to_string()];
    legacy.archived = true;

    vec![server, client, fork, legacy]
}

fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Which fields a text atom looks at: (file name, content)
fn scope(file_name: bool, content: bool) -> (bool, bool) {
    if file_name == content {
        (true, true)
    } else {
        (file_name, content)
    }
}

fn raw_config_matches(rc: RawConfig, doc: &Doc) -> bool {
    (!rc.contains(RawConfig::ONLY_PUBLIC) || !doc.private)
        && (!rc.contains(RawConfig::ONLY_PRIVATE) || doc.private)
        && (!rc.contains(RawConfig::ONLY_FORKS) || doc.fork)
        && (!rc.contains(RawConfig::NO_FORKS) || !doc.fork)
        && (!rc.contains(RawConfig::ONLY_ARCHIVED) || doc.archived)
        && (!rc.contains(RawConfig::NO_ARCHIVED) || !doc.archived)
}

/// Reference evaluator: does `q` match `doc`?
///
/// `Type` only changes result granularity, so it is transparent here.
pub fn matches(q: &Q, doc: &Doc) -> bool {
    match q {
        Q::And(and) => and.children.iter().all(|c| matches(c, doc)),
        Q::Or(or) => or.children.iter().any(|c| matches(c, doc)),
        Q::Not(not) => !matches(&not.child, doc),
        Q::Type(t) => matches(&t.child, doc),
        Q::Const(c) => c.value,
        Q::Substring(s) => {
            let (in_name, in_content) = scope(s.file_name, s.content);
            (in_name && contains(&doc.file_name, &s.pattern, s.case_sensitive))
                || (in_content && contains(&doc.content, &s.pattern, s.case_sensitive))
        }
        Q::Regexp(r) => {
            let re = RegexBuilder::new(r.as_str())
                .case_insensitive(!r.case_sensitive)
                .build()
                .expect("regex atoms hold valid patterns");
            let (in_name, in_content) = scope(r.file_name, r.content);
            (in_name && re.is_match(&doc.file_name)) || (in_content && re.is_match(&doc.content))
        }
        Q::Symbol(s) => doc.symbols.iter().any(|sym| {
            let mut span = doc.clone();
            span.content = sym.clone();
            span.file_name = String::new();
            matches(&s.expr, &span)
        }),
        Q::Language(l) => doc.language == l.language,
        Q::Branch(b) => doc
            .branches
            .iter()
            .any(|br| if b.exact { br == &b.pattern } else { br.contains(&b.pattern) }),
        Q::Repo(r) => r.regex().is_match(&doc.repo),
        Q::RepoRegexp(r) => r.regex().is_match(&doc.repo),
        Q::RawConfig(rc) => raw_config_matches(*rc, doc),
        Q::RepoSet(s) => s.set.contains_key(&doc.repo),
        Q::FileNameSet(s) => s.set.contains(&doc.file_name),
        Q::RepoIds(ids) => ids.repos.contains(doc.repo_id),
        Q::BranchesRepos(br) => br
            .list
            .iter()
            .any(|b| b.repos.contains(doc.repo_id) && doc.branches.contains(&b.branch)),
    }
}

/// Names of the corpus documents `q` matches, in corpus order
pub fn matching_docs(q: &Q) -> Vec<String> {
    corpus()
        .into_iter()
        .filter(|doc| matches(q, doc))
        .map(|doc| format!("{}:{}", doc.repo, doc.file_name))
        .collect()
}

/// Assert that two queries match exactly the same corpus documents
pub fn assert_same_matches(original: &Q, rewritten: &Q) {
    assert_eq!(
        matching_docs(original),
        matching_docs(rewritten),
        "Rewrite changed matches:\n  original:  {}\n  rewritten: {}",
        original,
        rewritten
    );
}

/// Substring scoped to file names only
pub fn file_substr(pattern: &str) -> Q {
    Q::Substring(Substring { file_name: true, ..Substring::new(pattern) })
}

/// Substring scoped to content only
pub fn content_substr(pattern: &str) -> Q {
    Q::Substring(Substring { content: true, ..Substring::new(pattern) })
}
