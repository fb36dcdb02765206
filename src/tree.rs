//! Generic rewrites and traversals over query trees
//!
//! Planner passes are written as single-node functions and driven over a
//! whole tree with [`map`]. Read-only passes (collecting atoms, checking for
//! a feature) use [`visit_atoms`].

use crate::query::{And, Not, Or, Q, Type};

/// Rewrite `q` bottom-up with `f`
///
/// Children of `And`/`Or`/`Not`/`Type` are rewritten first and the combinator
/// rebuilt around them; the rebuilt node (or, for atoms, the node itself) is
/// then handed to `f`, whose result replaces it. `f` may return a node of a
/// different kind. The expression inside a `Symbol` is not descended into:
/// `Symbol` is an atom.
pub fn map<F>(q: Q, mut f: F) -> Q
where
    F: FnMut(Q) -> Q,
{
    map_node(q, &mut f)
}

fn map_node<F>(q: Q, f: &mut F) -> Q
where
    F: FnMut(Q) -> Q,
{
    let q = match q {
        Q::And(and) => Q::And(And { children: map_list(and.children, f) }),
        Q::Or(or) => Q::Or(Or { children: map_list(or.children, f) }),
        Q::Not(not) => Q::Not(Not { child: Box::new(map_node(*not.child, f)) }),
        Q::Type(t) => Q::Type(Type {
            child: Box::new(map_node(*t.child, f)),
            kind: t.kind,
        }),
        atom => atom,
    };
    f(q)
}

fn map_list<F>(children: Vec<Q>, f: &mut F) -> Vec<Q>
where
    F: FnMut(Q) -> Q,
{
    children.into_iter().map(|child| map_node(child, f)).collect()
}

/// Call `v` on every atom of `q`, in the same post-order [`map`] uses
///
/// Combinators (`And`, `Or`, `Not`, `Type`) are never passed to `v`.
pub fn visit_atoms<'a, V>(q: &'a Q, mut v: V)
where
    V: FnMut(&'a Q),
{
    visit_node(q, &mut v);
}

fn visit_node<'a, V>(q: &'a Q, v: &mut V)
where
    V: FnMut(&'a Q),
{
    match q {
        Q::And(And { children }) | Q::Or(Or { children }) => {
            for child in children {
                visit_node(child, v);
            }
        }
        Q::Not(not) => visit_node(&not.child, v),
        Q::Type(t) => visit_node(&t.child, v),
        atom => v(atom),
    }
}

/// Split an unscoped substring or regex into `(or file_… content_…)`
///
/// Atoms with `file_name == content` (both set or both clear) are replaced by
/// an `Or` of two copies, one matching only file names and one matching only
/// content. Every other node is returned unchanged. This is a single-node
/// rewrite; pass it to [`map`] to apply it to a whole tree.
pub fn expand_file_content(q: Q) -> Q {
    match q {
        Q::Substring(s) if s.file_name == s.content => {
            let mut file = s.clone();
            file.file_name = true;
            file.content = false;
            let mut content = s;
            content.file_name = false;
            content.content = true;
            Q::or([Q::Substring(file), Q::Substring(content)])
        }
        Q::Regexp(r) if r.file_name == r.content => {
            let mut file = r.clone();
            file.file_name = true;
            file.content = false;
            let mut content = r;
            content.file_name = false;
            content.content = true;
            Q::or([Q::Regexp(file), Q::Regexp(content)])
        }
        q => q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Regexp, ResultKind, Substring};

    fn sample() -> Q {
        Q::and([
            Q::substring("a"),
            Q::or([Q::language("go"), Q::not(Q::substring("b"))]),
            Q::with_type(ResultKind::Repo, Q::symbol(Q::substring("c"))),
        ])
    }

    #[test]
    fn test_map_identity_preserves_tree() {
        let q = sample();
        assert_eq!(map(q.clone(), |n| n), q);
    }

    #[test]
    fn test_map_is_post_order() {
        let mut seen = Vec::new();
        map(sample(), |n| {
            seen.push(n.to_string());
            n
        });
        assert_eq!(
            seen,
            vec![
                r#"substr:"a""#,
                "lang:go",
                r#"substr:"b""#,
                r#"(not substr:"b")"#,
                r#"(or lang:go (not substr:"b"))"#,
                r#"sym:substr:"c""#,
                r#"(type:repo sym:substr:"c")"#,
                r#"(and substr:"a" (or lang:go (not substr:"b")) (type:repo sym:substr:"c"))"#,
            ]
        );
    }

    #[test]
    fn test_map_can_change_kind() {
        let q = map(sample(), |n| match n {
            Q::Language(_) => Q::constant(true),
            other => other,
        });
        assert_eq!(
            q.to_string(),
            r#"(and substr:"a" (or TRUE (not substr:"b")) (type:repo sym:substr:"c"))"#
        );
    }

    #[test]
    fn test_visit_atoms_skips_combinators() {
        let q = sample();
        let mut atoms = Vec::new();
        visit_atoms(&q, |a| atoms.push(a));
        assert_eq!(atoms.len(), 4);
        assert!(atoms.iter().all(|a| a.is_atom()));
        assert_eq!(atoms[3], &Q::symbol(Q::substring("c")));
    }

    #[test]
    fn test_expand_unscoped_substring() {
        let q = expand_file_content(Q::substring("x"));
        let expected = Q::or([
            Q::Substring(Substring { file_name: true, ..Substring::new("x") }),
            Q::Substring(Substring { content: true, ..Substring::new("x") }),
        ]);
        assert_eq!(q, expected);
    }

    #[test]
    fn test_expand_both_flags_set() {
        let mut s = Substring::new("x");
        s.file_name = true;
        s.content = true;
        s.case_sensitive = true;
        let Q::Or(or) = expand_file_content(Q::Substring(s)) else {
            panic!("expected or");
        };
        assert_eq!(or.children.len(), 2);
        assert_eq!(or.children[0].to_string(), r#"case_file_substr:"x""#);
        assert_eq!(or.children[1].to_string(), r#"case_content_substr:"x""#);
    }

    #[test]
    fn test_expand_regexp() {
        let q = expand_file_content(Q::Regexp(Regexp::parse("a.b").unwrap()));
        assert_eq!(q.to_string(), r#"(or file_regex:"a.b" regex:"a.b")"#);
        let Q::Or(or) = q else { panic!("expected or") };
        assert!(matches!(&or.children[1], Q::Regexp(r) if r.content && !r.file_name));
    }

    #[test]
    fn test_expand_is_noop_on_scoped_and_other_nodes() {
        let scoped = Q::Substring(Substring { content: true, ..Substring::new("x") });
        assert_eq!(expand_file_content(scoped.clone()), scoped);

        let lang = Q::language("rust");
        assert_eq!(expand_file_content(lang.clone()), lang);

        let and = Q::and([Q::substring("x")]);
        assert_eq!(expand_file_content(and.clone()), and);
    }

    #[test]
    fn test_expand_tree_wide_via_map() {
        let q = Q::and([Q::substring("x"), Q::not(Q::substring("y"))]);
        let expanded = map(q, expand_file_content);
        assert_eq!(
            expanded.to_string(),
            r#"(and (or file_substr:"x" content_substr:"x") (not (or file_substr:"y" content_substr:"y")))"#
        );
    }
}
