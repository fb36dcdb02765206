//! Cache encoding for fanning a query out to many shards
//!
//! When one query is sent to many shards, serializing it once and copying the
//! bytes is much cheaper than serializing it per shard. This module provides
//! that byte encoding and [`CachedQuery`], a wrapper that computes it at most
//! once.
//!
//! The encoding is bincode over the serde derives of the query tree, with
//! overrides for the three payload kinds bincode cannot handle directly:
//! parsed regexes (sent as source, re-parsed on decode), roaring bitmaps
//! (sent as native roaring bytes), and string sets (sent as an explicit
//! length-prefixed sequence).
//!
//! It is only meant for same-build replication. It is not a storage format
//! and changes whenever the query types change; the frame header carries a
//! build schema hash so that bytes from another build are rejected instead
//! of misread.
//!
//! # Frame Format
//!
//! ```text
//! Header (32 bytes):
//!   magic: "RQGC" (4 bytes)
//!   version: 1 (u32)
//!   schema: build schema hash, ASCII hex (16 bytes)
//!   payload_len: N (u64)
//!
//! Payload (N bytes):
//!   bincode-encoded query tree
//! ```

use bincode::Options;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::config::CodecConfig;
use crate::depth;
use crate::error::{DecodeError, EncodeError};
use crate::query::Q;

const MAGIC: &[u8; 4] = b"RQGC";
const VERSION: u32 = 1;
const SCHEMA_LEN: usize = 16;
const HEADER_SIZE: usize = 32; // 4 (magic) + 4 (version) + 16 (schema) + 8 (payload_len)

/// Schema hash of this build, computed by build.rs
const SCHEMA_HASH: &str = env!("CACHE_SCHEMA_HASH");

fn schema_tag() -> [u8; SCHEMA_LEN] {
    let mut tag = [0u8; SCHEMA_LEN];
    let hash = SCHEMA_HASH.as_bytes();
    let n = hash.len().min(SCHEMA_LEN);
    tag[..n].copy_from_slice(&hash[..n]);
    tag
}

/// Encode a query into a self-contained cache frame
pub fn encode(q: &Q) -> Result<Vec<u8>, EncodeError> {
    let payload = bincode::DefaultOptions::new().serialize(q)?;
    Ok(write_frame(&payload))
}

fn write_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&schema_tag());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);

    log::trace!("Wrote cache frame with {} payload bytes", payload.len());
    buf
}

/// Decode a cache frame with the default limits
pub fn decode(bytes: &[u8]) -> Result<Q, DecodeError> {
    decode_with_config(bytes, &CodecConfig::default())
}

/// Decode a cache frame, enforcing `config.max_frame_bytes` on the payload
/// and `config.max_depth` on query nesting
pub fn decode_with_config(bytes: &[u8], config: &CodecConfig) -> Result<Q, DecodeError> {
    let payload = read_frame(bytes, config.max_frame_bytes)?;

    depth::limited(config.max_depth, || {
        bincode::DefaultOptions::new()
            .with_limit(config.max_frame_bytes)
            .deserialize::<Q>(payload)
    })
    .inspect_err(|e| log::debug!("Failed to decode cache payload: {}", e))
}

/// Validate the frame header and return the payload slice
fn read_frame(bytes: &[u8], max_payload: u64) -> Result<&[u8], DecodeError> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated {
            expected: HEADER_SIZE as u64,
            available: bytes.len() as u64,
        });
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let schema = &bytes[8..8 + SCHEMA_LEN];
    if schema != schema_tag() {
        log::warn!("Rejecting cache frame written by another build");
        return Err(DecodeError::SchemaMismatch {
            expected: String::from_utf8_lossy(&schema_tag()).into_owned(),
            found: String::from_utf8_lossy(schema).into_owned(),
        });
    }

    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[24..HEADER_SIZE]);
    let payload_len = u64::from_le_bytes(len_buf);

    if payload_len > max_payload {
        return Err(DecodeError::FrameTooLarge { size: payload_len, limit: max_payload });
    }

    let available = (bytes.len() - HEADER_SIZE) as u64;
    if available < payload_len {
        return Err(DecodeError::Truncated {
            expected: HEADER_SIZE as u64 + payload_len,
            available: bytes.len() as u64,
        });
    }
    if available > payload_len {
        return Err(DecodeError::Payload(format!(
            "{} trailing bytes after frame",
            available - payload_len
        )));
    }

    Ok(&bytes[HEADER_SIZE..])
}

/// A query that caches its own cache encoding
///
/// The encoding is computed by the first caller of [`CachedQuery::encode`];
/// concurrent callers wait for it and later callers get the stored bytes.
/// A failed encoding is stored too and handed back to every caller, it is
/// never retried.
///
/// This is a transport-only wrapper. It is not a [`Q`] variant and cannot
/// appear inside a tree. Unwrap it with [`CachedQuery::into_inner`] before
/// normalizing or executing the query.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    query: Q,
    encoded: OnceLock<Result<Vec<u8>, EncodeError>>,
}

impl CachedQuery {
    pub fn new(query: Q) -> Self {
        Self { query, encoded: OnceLock::new() }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Strip the wrapper at a transport boundary
    pub fn into_inner(self) -> Q {
        self.query
    }

    /// The cache frame for the wrapped query, computed at most once
    pub fn encode(&self) -> Result<&[u8], EncodeError> {
        self.encode_with(encode)
    }

    fn encode_with<F>(&self, encoder: F) -> Result<&[u8], EncodeError>
    where
        F: FnOnce(&Q) -> Result<Vec<u8>, EncodeError>,
    {
        let result = self.encoded.get_or_init(|| {
            log::debug!("Computing cache encoding for {}", self.query);
            encoder(&self.query)
        });
        match result {
            Ok(bytes) => Ok(bytes.as_slice()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Decode a cache frame into a fresh wrapper
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::new(decode(bytes)?))
    }
}

impl From<Q> for CachedQuery {
    fn from(query: Q) -> Self {
        Self::new(query)
    }
}

impl From<CachedQuery> for Q {
    fn from(cached: CachedQuery) -> Self {
        cached.into_inner()
    }
}

impl fmt::Display for CachedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cached({})", self.query)
    }
}

// Embedded in a larger message, the wrapper writes its memoized frame as a
// byte string, so only the first message pays for encoding the query.
impl Serialize for CachedQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.encode().map_err(ser::Error::custom)?;
        serializer.serialize_bytes(bytes)
    }
}

impl<'de> Deserialize<'de> for CachedQuery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = deserializer.deserialize_byte_buf(ByteBufVisitor)?;
        CachedQuery::decode(&bytes).map_err(de::Error::custom)
    }
}

/// Accepts a byte string however the format presents it
pub(crate) struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element()? {
            bytes.push(b);
        }
        Ok(bytes)
    }
}

/// Override for roaring bitmaps: native roaring bytes
pub(crate) mod bitmap_bytes {
    use roaring::RoaringBitmap;
    use serde::{de, Deserializer, Serializer};

    use crate::query::repos::{bitmap_from_bytes, bitmap_to_bytes};

    pub fn serialize<S: Serializer>(bitmap: &RoaringBitmap, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&bitmap_to_bytes(bitmap))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RoaringBitmap, D::Error> {
        let bytes = deserializer.deserialize_byte_buf(super::ByteBufVisitor)?;
        bitmap_from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// Override for string sets: a length-prefixed sequence of strings
pub(crate) mod string_set {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(set)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names.into_iter().collect())
    }
}
