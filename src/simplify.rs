//! Query normalization
//!
//! Every query passes through [`simplify`] before planning or execution. The
//! result is in normal form:
//!
//! - constants are folded away, so a `Const` only survives as the whole tree
//! - no `And`/`Or` has zero or one children
//! - no `And` directly contains an `And` (same for `Or`)
//!
//! Folding runs once, bottom-up. Flattening then repeats until a pass
//! reports no change; each pass splices one level of same-kind nesting.

use crate::query::{Q, Type};

/// Bring `q` into normal form
///
/// Pure and idempotent: `simplify(simplify(q)) == simplify(q)`. Never fails
/// on a well-formed tree.
pub fn simplify(q: Q) -> Q {
    let mut q = fold_constants(q);
    let mut passes = 0;
    loop {
        let (flat, changed) = flatten(q);
        q = flat;
        passes += 1;
        if !changed {
            break;
        }
    }
    log::trace!("Simplified query in {} flatten passes: {}", passes, q);
    q
}

fn fold_constants(q: Q) -> Q {
    match q {
        Q::And(and) => fold_and_or(and.children, true),
        Q::Or(or) => fold_and_or(or.children, false),
        Q::Not(not) => match fold_constants(*not.child) {
            Q::Const(c) => Q::constant(!c.value),
            child => Q::not(child),
        },
        Q::Type(t) => match fold_constants(*t.child) {
            // At the root this changes the kind of result returned. The only
            // meaningful cases there are `type:repo TRUE` (all repos) and
            // `type:filename TRUE`, which a constant answers just as well, so
            // the wrapper is dropped wherever it sits.
            c @ Q::Const(_) => c,
            child => Q::Type(Type { child: Box::new(child), kind: t.kind }),
        },
        Q::Substring(s) if s.pattern.is_empty() => Q::constant(true),
        Q::Regexp(r) if r.is_empty_match() => Q::constant(true),
        Q::Branch(b) if b.pattern.is_empty() => Q::constant(true),
        Q::RepoSet(s) if s.set.is_empty() => Q::constant(false),
        Q::FileNameSet(s) if s.set.is_empty() => Q::constant(false),
        q => q,
    }
}

/// Fold an `And` (`is_and`) or `Or` node
///
/// The identity constant (`true` for And, `false` for Or) is dropped; the
/// absorbing one short-circuits the whole node. With nothing left the node is
/// the identity itself.
fn fold_and_or(children: Vec<Q>, is_and: bool) -> Q {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match fold_constants(child) {
            Q::Const(c) if c.value == is_and => continue,
            Q::Const(c) => return Q::Const(c),
            child => kept.push(child),
        }
    }

    if kept.is_empty() {
        Q::constant(is_and)
    } else if is_and {
        Q::and(kept)
    } else {
        Q::or(kept)
    }
}

/// One flattening pass; the flag reports whether anything changed
fn flatten(q: Q) -> (Q, bool) {
    match q {
        Q::And(mut and) if and.children.len() == 1 => (and.children.swap_remove(0), true),
        Q::Or(mut or) if or.children.len() == 1 => (or.children.swap_remove(0), true),
        Q::And(and) => {
            let (children, changed) = flatten_children(and.children, true);
            (Q::and(children), changed)
        }
        Q::Or(or) => {
            let (children, changed) = flatten_children(or.children, false);
            (Q::or(children), changed)
        }
        Q::Not(not) => {
            let (child, changed) = flatten(*not.child);
            (Q::not(child), changed)
        }
        Q::Type(t) => {
            let (child, changed) = flatten(*t.child);
            (Q::with_type(t.kind, child), changed)
        }
        q => (q, false),
    }
}

fn flatten_children(children: Vec<Q>, is_and: bool) -> (Vec<Q>, bool) {
    let mut flat = Vec::with_capacity(children.len());
    let mut changed = false;
    for child in children {
        let (child, child_changed) = flatten(child);
        changed |= child_changed;
        match child {
            Q::And(inner) if is_and => {
                changed = true;
                flat.extend(inner.children);
            }
            Q::Or(inner) if !is_and => {
                changed = true;
                flat.extend(inner.children);
            }
            child => flat.push(child),
        }
    }
    (flat, changed)
}
