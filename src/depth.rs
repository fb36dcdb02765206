//! Nesting limit shared by the wire and cache decoders
//!
//! Both decoders build the tree recursively, so an adversarial message can
//! nest deeply enough to exhaust the stack. Every field that holds child
//! queries deserializes through [`nested`], which counts levels on the
//! current thread and fails once the limit set by [`limited`] is passed.

use serde::de::{self, Deserialize, Deserializer};
use std::cell::Cell;

use crate::error::DecodeError;

/// Deepest query nesting a decoder accepts unless configured otherwise
pub const DEFAULT_MAX_DEPTH: usize = 128;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static LIMIT: Cell<usize> = const { Cell::new(DEFAULT_MAX_DEPTH) };
    static EXCEEDED: Cell<bool> = const { Cell::new(false) };
}

/// Restores the enclosing decode's counters, so decodes can nest
struct Scope {
    depth: usize,
    limit: usize,
    exceeded: bool,
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(self.depth));
        LIMIT.with(|l| l.set(self.limit));
        EXCEEDED.with(|e| e.set(self.exceeded));
    }
}

/// Run a decode with query nesting limited to `max_depth` levels
///
/// A decode that hits the limit fails with [`DecodeError::TooDeep`] whatever
/// error the underlying format reported.
pub(crate) fn limited<T, E, F>(max_depth: usize, decode: F) -> Result<T, DecodeError>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<DecodeError>,
{
    let _scope = Scope {
        depth: DEPTH.with(|d| d.replace(0)),
        limit: LIMIT.with(|l| l.replace(max_depth)),
        exceeded: EXCEEDED.with(|e| e.replace(false)),
    };

    match decode() {
        Ok(value) => Ok(value),
        Err(_) if EXCEEDED.with(Cell::get) => {
            log::debug!("Rejected query nested deeper than {} levels", max_depth);
            Err(DecodeError::TooDeep { limit: max_depth })
        }
        Err(e) => Err(e.into()),
    }
}

/// One level of nesting, released on drop
struct Level;

impl Level {
    fn enter<E: de::Error>() -> Result<Self, E> {
        let depth = DEPTH.with(Cell::get) + 1;
        let limit = LIMIT.with(Cell::get);
        if depth > limit {
            EXCEEDED.with(|e| e.set(true));
            return Err(E::custom(format_args!("query nesting exceeds {} levels", limit)));
        }
        DEPTH.with(|d| d.set(depth));
        Ok(Level)
    }
}

impl Drop for Level {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// `deserialize_with` hook for fields holding child queries
pub(crate) fn nested<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let _level = Level::enter::<D::Error>()?;
    T::deserialize(deserializer)
}

/// Run `f` on a thread with room for deep recursion in unoptimized builds
#[cfg(test)]
pub(crate) fn on_large_stack<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}
