//! Repository-level atoms
//!
//! These filter which repositories (and branches of them) a query runs
//! against. The set and bitmap variants exist so that large repository lists
//! can be shipped to shards compactly; their debug rendering collapses to a
//! size summary once the set is too large to be useful in a log line.

use regex::Regex;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::DecodeError;

/// Sets larger than this render as `size=N` instead of listing members
const SET_DISPLAY_LIMIT: usize = 5;

fn compile_repo_regex(source: &str) -> Result<Regex, DecodeError> {
    Regex::new(source).map_err(|e| DecodeError::regex(source, e))
}

/// Matches documents whose repository name matches the regex
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Repo {
    regexp: Regex,
}

impl Repo {
    pub fn new(source: &str) -> Result<Self, DecodeError> {
        Ok(Self { regexp: compile_repo_regex(source)? })
    }

    pub fn regex(&self) -> &Regex {
        &self.regexp
    }

    pub fn as_str(&self) -> &str {
        self.regexp.as_str()
    }
}

impl PartialEq for Repo {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<Repo> for String {
    fn from(q: Repo) -> Self {
        q.regexp.as_str().to_string()
    }
}

impl TryFrom<String> for Repo {
    type Error = DecodeError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Repo::new(&source)
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repo:{}", self.as_str())
    }
}

/// Same matching semantics as [`Repo`], kept as its own kind on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RepoRegexp {
    regexp: Regex,
}

impl RepoRegexp {
    pub fn new(source: &str) -> Result<Self, DecodeError> {
        Ok(Self { regexp: compile_repo_regex(source)? })
    }

    pub fn regex(&self) -> &Regex {
        &self.regexp
    }

    pub fn as_str(&self) -> &str {
        self.regexp.as_str()
    }
}

impl PartialEq for RepoRegexp {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<RepoRegexp> for String {
    fn from(q: RepoRegexp) -> Self {
        q.regexp.as_str().to_string()
    }
}

impl TryFrom<String> for RepoRegexp {
    type Error = DecodeError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        RepoRegexp::new(&source)
    }
}

impl fmt::Display for RepoRegexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reporegex:{:?}", self.as_str())
    }
}

/// Filters repositories on their visibility, fork and archive flags
///
/// Flags are independent bits and combine with `|`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawConfig(u64);

impl RawConfig {
    pub const ONLY_PUBLIC: RawConfig = RawConfig(1);
    pub const ONLY_PRIVATE: RawConfig = RawConfig(2);
    pub const ONLY_FORKS: RawConfig = RawConfig(1 << 2);
    pub const NO_FORKS: RawConfig = RawConfig(2 << 2);
    pub const ONLY_ARCHIVED: RawConfig = RawConfig(1 << 4);
    pub const NO_ARCHIVED: RawConfig = RawConfig(2 << 4);

    const NAMES: [(RawConfig, &'static str); 6] = [
        (RawConfig::ONLY_PUBLIC, "RcOnlyPublic"),
        (RawConfig::ONLY_PRIVATE, "RcOnlyPrivate"),
        (RawConfig::ONLY_FORKS, "RcOnlyForks"),
        (RawConfig::NO_FORKS, "RcNoForks"),
        (RawConfig::ONLY_ARCHIVED, "RcOnlyArchived"),
        (RawConfig::NO_ARCHIVED, "RcNoArchived"),
    ];

    pub const fn from_bits(bits: u64) -> Self {
        RawConfig(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: RawConfig) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RawConfig {
    type Output = RawConfig;

    fn bitor(self, rhs: RawConfig) -> RawConfig {
        RawConfig(self.0 | rhs.0)
    }
}

impl BitOrAssign for RawConfig {
    fn bitor_assign(&mut self, rhs: RawConfig) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for RawConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(mask, _)| self.0 & mask.0 != 0)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "rawConfig:{}", names.join("|"))
    }
}

/// Bulk list of repositories to match, by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSet {
    pub set: BTreeMap<String, bool>,
}

impl RepoSet {
    pub fn new<I, S>(repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set: repos.into_iter().map(|r| (r.into(), true)).collect(),
        }
    }
}

impl fmt::Display for RepoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.set.len() > SET_DISPLAY_LIMIT {
            return write!(f, "(reposet size={})", self.set.len());
        }
        let repos: Vec<&str> = self.set.keys().map(String::as_str).collect();
        write!(f, "(reposet {})", repos.join(" "))
    }
}

/// Bulk list of file names to match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNameSet {
    #[serde(with = "crate::cache::string_set")]
    pub set: BTreeSet<String>,
}

impl FileNameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for FileNameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.set.len() > SET_DISPLAY_LIMIT {
            return write!(f, "(filenameset size={})", self.set.len());
        }
        let names: Vec<&str> = self.set.iter().map(String::as_str).collect();
        write!(f, "(filenameset {})", names.join(" "))
    }
}

/// Matches repositories by numeric id, on every branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoIds {
    #[serde(with = "crate::cache::bitmap_bytes")]
    pub repos: RoaringBitmap,
}

impl RepoIds {
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        Self { repos: ids.into_iter().collect() }
    }
}

impl fmt::Display for RepoIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.repos.len();
        if size > 1 {
            write!(f, "(repoids count:{})", size)
        } else {
            write!(f, "(repoids repoid={})", BitmapDisplay(&self.repos))
        }
    }
}

/// A branch name and the repository ids to search it in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRepos {
    pub branch: String,
    #[serde(with = "crate::cache::bitmap_bytes")]
    pub repos: RoaringBitmap,
}

/// Matches (branch, repository id) pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchesRepos {
    pub list: Vec<BranchRepos>,
}

impl BranchesRepos {
    /// Search a single branch in the given repositories
    pub fn single(branch: impl Into<String>, ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            list: vec![BranchRepos {
                branch: branch.into(),
                repos: ids.into_iter().collect(),
            }],
        }
    }
}

impl fmt::Display for BranchesRepos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(branchesrepos")?;
        for br in &self.list {
            let size = br.repos.len();
            if size > 1 {
                write!(f, " {}:{}", br.branch, size)?;
            } else {
                write!(f, " {}={}", br.branch, BitmapDisplay(&br.repos))?;
            }
        }
        f.write_str(")")
    }
}

/// Renders a bitmap as `{1,2,3}` in ascending order
struct BitmapDisplay<'a>(&'a RoaringBitmap);

impl fmt::Display for BitmapDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(","))
    }
}

/// Serialize a bitmap in the portable roaring byte format
pub(crate) fn bitmap_to_bytes(bitmap: &RoaringBitmap) -> Vec<u8> {
    let mut buf = Vec::with_capacity(bitmap.serialized_size());
    bitmap
        .serialize_into(&mut buf)
        .expect("writing a bitmap into a Vec cannot fail");
    buf
}

pub(crate) fn bitmap_from_bytes(bytes: &[u8]) -> Result<RoaringBitmap, DecodeError> {
    RoaringBitmap::deserialize_from(bytes).map_err(|e| DecodeError::Bitmap(e.to_string()))
}
