//! Wire encoding for service boundaries
//!
//! One message type per query variant, joined by the [`Q`] envelope in which
//! exactly one payload field is set. Messages are plain serde structs and
//! travel as JSON.
//!
//! The envelope is only ever produced by [`to_wire`], so a malformed one
//! (no payload, several payloads, an unknown payload kind) is rejected
//! outright rather than patched up.
//!
//! Regex fields carry only the source string and are re-parsed on decode.
//! Repository id sets carry the portable roaring bitmap bytes. `RawConfig`
//! carries its raw `u64` flags.
//!
//! JSON's own recursion limit is lifted on decode; nesting is bounded by
//! `CodecConfig::max_depth` instead, the same bound the cache codec uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CodecConfig;
use crate::depth;
use crate::error::{DecodeError, EncodeError};
use crate::query::{self, ResultKind};
use crate::query::repos::{bitmap_from_bytes, bitmap_to_bytes};

/// Envelope: exactly one field is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Q {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_config: Option<RawConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<Regexp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub constant: Option<Const>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_regexp: Option<RepoRegexp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches_repos: Option<BranchesRepos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_ids: Option<RepoIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_set: Option<RepoSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_set: Option<FileNameSet>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<Type>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substring: Option<Substring>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<And>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Or>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Not>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl Q {
    /// Number of payload fields set
    pub fn payload_count(&self) -> usize {
        [
            self.raw_config.is_some(),
            self.regexp.is_some(),
            self.symbol.is_some(),
            self.language.is_some(),
            self.constant.is_some(),
            self.repo.is_some(),
            self.repo_regexp.is_some(),
            self.branches_repos.is_some(),
            self.repo_ids.is_some(),
            self.repo_set.is_some(),
            self.file_name_set.is_some(),
            self.type_.is_some(),
            self.substring.is_some(),
            self.and.is_some(),
            self.or.is_some(),
            self.not.is_some(),
            self.branch.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub flags: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regexp {
    pub regexp: String,
    pub file_name: bool,
    pub content: bool,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Symbol {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub expr: Option<Box<Q>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Const {
    pub value: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repo {
    pub regexp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoRegexp {
    pub regexp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRepos {
    pub branch: String,
    /// Portable roaring bitmap bytes
    pub repos: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchesRepos {
    pub list: Vec<BranchRepos>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoIds {
    /// Portable roaring bitmap bytes
    pub repos: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoSet {
    pub set: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNameSet {
    pub set: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Type {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub child: Option<Box<Q>>,
    #[serde(rename = "type")]
    pub type_: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Substring {
    pub pattern: String,
    pub case_sensitive: bool,
    pub file_name: bool,
    pub content: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct And {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub children: Vec<Q>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Or {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub children: Vec<Q>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Not {
    #[serde(deserialize_with = "crate::depth::nested")]
    pub child: Option<Box<Q>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    pub pattern: String,
    pub exact: bool,
}

/// Map an in-memory query to its wire envelope
///
/// Total: every variant has a message, and the match below is exhaustive, so
/// a variant added to the catalogue without a wire mapping does not build.
pub fn to_wire(q: &query::Q) -> Q {
    match q {
        query::Q::RawConfig(rc) => Q {
            raw_config: Some(RawConfig { flags: rc.bits() }),
            ..Default::default()
        },
        query::Q::Regexp(r) => Q {
            regexp: Some(Regexp {
                regexp: r.as_str().to_string(),
                file_name: r.file_name,
                content: r.content,
                case_sensitive: r.case_sensitive,
            }),
            ..Default::default()
        },
        query::Q::Symbol(s) => Q {
            symbol: Some(Symbol { expr: Some(Box::new(to_wire(&s.expr))) }),
            ..Default::default()
        },
        query::Q::Language(l) => Q {
            language: Some(Language { language: l.language.clone() }),
            ..Default::default()
        },
        query::Q::Const(c) => Q {
            constant: Some(Const { value: c.value }),
            ..Default::default()
        },
        query::Q::Repo(r) => Q {
            repo: Some(Repo { regexp: r.as_str().to_string() }),
            ..Default::default()
        },
        query::Q::RepoRegexp(r) => Q {
            repo_regexp: Some(RepoRegexp { regexp: r.as_str().to_string() }),
            ..Default::default()
        },
        query::Q::BranchesRepos(br) => Q {
            branches_repos: Some(BranchesRepos {
                list: br
                    .list
                    .iter()
                    .map(|b| BranchRepos {
                        branch: b.branch.clone(),
                        repos: bitmap_to_bytes(&b.repos),
                    })
                    .collect(),
            }),
            ..Default::default()
        },
        query::Q::RepoIds(ids) => Q {
            repo_ids: Some(RepoIds { repos: bitmap_to_bytes(&ids.repos) }),
            ..Default::default()
        },
        query::Q::RepoSet(s) => Q {
            repo_set: Some(RepoSet { set: s.set.clone() }),
            ..Default::default()
        },
        query::Q::FileNameSet(s) => Q {
            file_name_set: Some(FileNameSet { set: s.set.iter().cloned().collect() }),
            ..Default::default()
        },
        query::Q::Type(t) => Q {
            type_: Some(Type {
                child: Some(Box::new(to_wire(&t.child))),
                type_: t.kind.as_u32(),
            }),
            ..Default::default()
        },
        query::Q::Substring(s) => Q {
            substring: Some(Substring {
                pattern: s.pattern.clone(),
                case_sensitive: s.case_sensitive,
                file_name: s.file_name,
                content: s.content,
            }),
            ..Default::default()
        },
        query::Q::And(a) => Q {
            and: Some(And { children: a.children.iter().map(to_wire).collect() }),
            ..Default::default()
        },
        query::Q::Or(o) => Q {
            or: Some(Or { children: o.children.iter().map(to_wire).collect() }),
            ..Default::default()
        },
        query::Q::Not(n) => Q {
            not: Some(Not { child: Some(Box::new(to_wire(&n.child))) }),
            ..Default::default()
        },
        query::Q::Branch(b) => Q {
            branch: Some(Branch { pattern: b.pattern.clone(), exact: b.exact }),
            ..Default::default()
        },
    }
}

/// Rebuild an in-memory query from its wire envelope
///
/// Fails on an envelope with zero or several payloads, a missing required
/// child, a regex that does not parse, bitmap bytes that do not decode, or an
/// unknown result type. No partial tree is returned.
pub fn from_wire(p: Q) -> Result<query::Q, DecodeError> {
    match p.payload_count() {
        0 => return Err(DecodeError::EmptyEnvelope),
        1 => {}
        n => return Err(DecodeError::MultiplePayloads(n)),
    }

    if let Some(rc) = p.raw_config {
        return Ok(query::Q::RawConfig(query::RawConfig::from_bits(rc.flags)));
    }
    if let Some(r) = p.regexp {
        let mut q = query::Regexp::parse(&r.regexp)?;
        q.file_name = r.file_name;
        q.content = r.content;
        q.case_sensitive = r.case_sensitive;
        return Ok(query::Q::Regexp(q));
    }
    if let Some(s) = p.symbol {
        let expr = s.expr.ok_or(DecodeError::MissingField("symbol.expr"))?;
        return Ok(query::Q::symbol(from_wire(*expr)?));
    }
    if let Some(l) = p.language {
        return Ok(query::Q::language(l.language));
    }
    if let Some(c) = p.constant {
        return Ok(query::Q::constant(c.value));
    }
    if let Some(r) = p.repo {
        return Ok(query::Q::Repo(query::Repo::new(&r.regexp)?));
    }
    if let Some(r) = p.repo_regexp {
        return Ok(query::Q::RepoRegexp(query::RepoRegexp::new(&r.regexp)?));
    }
    if let Some(br) = p.branches_repos {
        let list = br
            .list
            .into_iter()
            .map(|b| {
                Ok(query::BranchRepos {
                    branch: b.branch,
                    repos: bitmap_from_bytes(&b.repos)?,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;
        return Ok(query::Q::BranchesRepos(query::BranchesRepos { list }));
    }
    if let Some(ids) = p.repo_ids {
        return Ok(query::Q::RepoIds(query::RepoIds { repos: bitmap_from_bytes(&ids.repos)? }));
    }
    if let Some(s) = p.repo_set {
        return Ok(query::Q::RepoSet(query::RepoSet { set: s.set }));
    }
    if let Some(s) = p.file_name_set {
        return Ok(query::Q::FileNameSet(query::FileNameSet::new(s.set)));
    }
    if let Some(t) = p.type_ {
        let kind = ResultKind::from_u32(t.type_).ok_or(DecodeError::UnknownResultKind(t.type_))?;
        let child = t.child.ok_or(DecodeError::MissingField("type.child"))?;
        return Ok(query::Q::with_type(kind, from_wire(*child)?));
    }
    if let Some(s) = p.substring {
        return Ok(query::Q::Substring(query::Substring {
            pattern: s.pattern,
            case_sensitive: s.case_sensitive,
            file_name: s.file_name,
            content: s.content,
        }));
    }
    if let Some(a) = p.and {
        return Ok(query::Q::and(from_wire_list(a.children)?));
    }
    if let Some(o) = p.or {
        return Ok(query::Q::or(from_wire_list(o.children)?));
    }
    if let Some(n) = p.not {
        let child = n.child.ok_or(DecodeError::MissingField("not.child"))?;
        return Ok(query::Q::not(from_wire(*child)?));
    }
    if let Some(b) = p.branch {
        return Ok(query::Q::branch(b.pattern, b.exact));
    }

    Err(DecodeError::EmptyEnvelope)
}

fn from_wire_list(children: Vec<Q>) -> Result<Vec<query::Q>, DecodeError> {
    children.into_iter().map(from_wire).collect()
}

impl From<&query::Q> for Q {
    fn from(q: &query::Q) -> Self {
        to_wire(q)
    }
}

impl TryFrom<Q> for query::Q {
    type Error = DecodeError;

    fn try_from(p: Q) -> Result<Self, Self::Error> {
        from_wire(p)
    }
}

/// Encode a query as wire JSON bytes
pub fn encode(q: &query::Q) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(&to_wire(q))?)
}

/// Encode a query as indented wire JSON
pub fn encode_pretty(q: &query::Q) -> Result<String, EncodeError> {
    Ok(serde_json::to_string_pretty(&to_wire(q))?)
}

/// Decode wire JSON bytes into a query with the default limits
pub fn decode(bytes: &[u8]) -> Result<query::Q, DecodeError> {
    decode_with_config(bytes, &CodecConfig::default())
}

/// Decode wire JSON bytes, enforcing `config.max_depth` on query nesting
pub fn decode_with_config(bytes: &[u8], config: &CodecConfig) -> Result<query::Q, DecodeError> {
    let envelope = depth::limited(config.max_depth, || {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let envelope = Q::deserialize(&mut de)?;
        de.end()?;
        Ok::<_, serde_json::Error>(envelope)
    })?;
    from_wire(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FileNameSet as FileNames, RawConfig as Rc, RepoIds as Ids, RepoSet as Repos};
    use crate::depth::{on_large_stack, DEFAULT_MAX_DEPTH};

    fn roundtrip(q: &query::Q) -> query::Q {
        let bytes = encode(q).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_envelope_has_single_payload() {
        let p = to_wire(&query::Q::and([query::Q::substring("a"), query::Q::language("go")]));
        assert_eq!(p.payload_count(), 1);
        let and = p.and.as_ref().unwrap();
        assert!(and.children.iter().all(|c| c.payload_count() == 1));
    }

    #[test]
    fn test_roundtrip_every_variant() {
        let mut regexp = query::Regexp::parse(r"foo\s+(bar|baz)").unwrap();
        regexp.case_sensitive = true;
        regexp.content = true;

        let q = query::Q::or([
            query::Q::and([
                query::Q::substring("needle"),
                query::Q::Regexp(regexp),
                query::Q::symbol(query::Q::substring("Func")),
                query::Q::language("rust"),
                query::Q::constant(false),
                query::Q::branch("main", true),
            ]),
            query::Q::not(query::Q::Repo(query::Repo::new("^github\\.com/").unwrap())),
            query::Q::RepoRegexp(query::RepoRegexp::new("sourcegraph").unwrap()),
            query::Q::RawConfig(Rc::ONLY_PRIVATE | Rc::NO_ARCHIVED),
            query::Q::RepoSet(Repos::new(["a", "b"])),
            query::Q::FileNameSet(FileNames::new(["x.go", "y.go"])),
            query::Q::RepoIds(Ids::new([1, 2, 300_000])),
            query::Q::BranchesRepos(query::BranchesRepos::single("dev", [4, 5])),
            query::Q::with_type(ResultKind::FileName, query::Q::substring("z")),
        ]);

        assert_eq!(roundtrip(&q), q);
    }

    #[test]
    fn test_json_field_names() {
        let json = String::from_utf8(encode(&query::Q::constant(true)).unwrap()).unwrap();
        assert_eq!(json, r#"{"const":{"value":true}}"#);

        let json = String::from_utf8(
            encode(&query::Q::with_type(ResultKind::Repo, query::Q::constant(false))).unwrap(),
        )
        .unwrap();
        assert_eq!(json, r#"{"type":{"child":{"const":{"value":false}},"type":2}}"#);
    }

    #[test]
    fn test_decode_empty_envelope() {
        let err = from_wire(Q::default()).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyEnvelope));

        let err = decode(b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::EmptyEnvelope));
    }

    #[test]
    fn test_decode_multiple_payloads() {
        let p = Q {
            language: Some(Language { language: "go".to_string() }),
            constant: Some(Const { value: true }),
            ..Default::default()
        };
        assert!(matches!(from_wire(p), Err(DecodeError::MultiplePayloads(2))));
    }

    #[test]
    fn test_decode_nested_empty_envelope() {
        let p = Q {
            and: Some(And { children: vec![Q::default()] }),
            ..Default::default()
        };
        assert!(matches!(from_wire(p), Err(DecodeError::EmptyEnvelope)));
    }

    #[test]
    fn test_decode_unknown_payload_kind() {
        let err = decode(br#"{"caseQ":{"flavor":"yes"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_bad_regex() {
        let err = decode(br#"{"regexp":{"regexp":"a(b"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Regex { .. }));

        let err = decode(br#"{"repo":{"regexp":"[z-a]"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Regex { .. }));
    }

    #[test]
    fn test_decode_bad_bitmap() {
        let err = decode(br#"{"repo_ids":{"repos":[1,2,3]}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Bitmap(_)));
    }

    #[test]
    fn test_decode_missing_child() {
        let err = decode(br#"{"not":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("not.child")));

        let err = decode(br#"{"type":{"type":1}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("type.child")));
    }

    #[test]
    fn test_decode_unknown_result_type() {
        let err = decode(br#"{"type":{"child":{"const":{"value":true}},"type":9}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownResultKind(9)));
    }

    fn nested_and(levels: usize) -> query::Q {
        let mut q = query::Q::language("go");
        for _ in 0..levels {
            q = query::Q::and([q, query::Q::language("go")]);
        }
        q
    }

    fn nested_not(levels: usize) -> query::Q {
        let mut q = query::Q::substring("leaf");
        for _ in 0..levels {
            q = query::Q::not(q);
        }
        q
    }

    #[test]
    fn test_roundtrip_deep_nesting() {
        on_large_stack(|| {
            for levels in [50, 70, DEFAULT_MAX_DEPTH] {
                let and = nested_and(levels);
                assert_eq!(roundtrip(&and), and);
                let not = nested_not(levels);
                assert_eq!(roundtrip(&not), not);
            }
        });
    }

    #[test]
    fn test_decode_nesting_limit() {
        on_large_stack(|| {
            let q = nested_not(DEFAULT_MAX_DEPTH + 1);
            let bytes = encode(&q).unwrap();
            assert!(matches!(
                decode(&bytes),
                Err(DecodeError::TooDeep { limit: DEFAULT_MAX_DEPTH })
            ));

            let config = CodecConfig { max_depth: 1000, ..CodecConfig::default() };
            assert_eq!(decode_with_config(&bytes, &config).unwrap(), q);
        });
    }

    #[test]
    fn test_default_fields_may_be_omitted() {
        let q = decode(br#"{"substring":{"pattern":"foo"}}"#).unwrap();
        assert_eq!(q, query::Q::substring("foo"));

        let q = decode(br#"{"raw_config":{"flags":17}}"#).unwrap();
        assert_eq!(q, query::Q::RawConfig(Rc::ONLY_PUBLIC | Rc::ONLY_ARCHIVED));
    }
}
