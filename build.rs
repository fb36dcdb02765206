//! Build-time schema hash for the query cache encoding
//!
//! The cache encoding is a bincode dump of the in-memory query tree. Its
//! layout follows the Rust type definitions (enum variant order, field order,
//! serde overrides), so two builds with different definitions produce
//! incompatible bytes. This script hashes the source files that define that
//! layout and exports the result as `CACHE_SCHEMA_HASH`; the cache codec
//! writes it into every frame header and rejects frames from other builds.
//!
//! ## Cache-critical files:
//! - src/query/mod.rs: `Q` variant order and combinator structs
//! - src/query/text.rs: text atoms and the regex frame override
//! - src/query/repos.rs: repository atoms, bitmap and string-set overrides
//! - src/cache.rs: frame header layout

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Source files that affect the cache byte layout
const CACHE_CRITICAL_FILES: &[&str] = &[
    "src/query/mod.rs",
    "src/query/text.rs",
    "src/query/repos.rs",
    "src/cache.rs",
];

fn main() {
    let schema_hash = compute_schema_hash();

    println!("cargo:rustc-env=CACHE_SCHEMA_HASH={}", schema_hash);

    for file in CACHE_CRITICAL_FILES {
        println!("cargo:rerun-if-changed={}", file);
    }
}

/// Compute a deterministic hash of all cache-critical source files
fn compute_schema_hash() -> String {
    let mut hasher = blake3::Hasher::new();

    // BTreeSet keeps the hashing order stable
    let files: BTreeSet<String> = CACHE_CRITICAL_FILES
        .iter()
        .map(|s| s.to_string())
        .collect();

    for file_path in &files {
        let path = Path::new(file_path);

        if !path.exists() {
            panic!("Cache-critical file not found: {}", file_path);
        }

        let content = fs::read(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", file_path, e));

        hasher.update(file_path.as_bytes());
        hasher.update(&content);
    }

    // First 8 bytes as 16 hex chars; the frame header reserves exactly 16 bytes
    let hash = hasher.finalize();

    hash.as_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}
