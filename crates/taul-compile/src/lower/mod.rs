//! Rewrites precedence PPRs into left-recursion-free form (spec.md §4.3).
//!
//! A `precedence` PPR's alternatives are split into the ones that start by
//! recursing into the rule itself (the climbing alternatives) and the ones
//! that don't (the base alternatives). The rewritten body is
//! `base_alts (recurse_tail)*`, where `recurse_tail` is the climbing
//! alternative with its leading self-reference stripped. Each original
//! alternative keeps its position as a monotonically increasing
//! precedence tag, lowest-bound-first, so the table builder can break
//! what would otherwise be PREDICT-set ambiguity between climbing
//! alternatives by precedence instead.

use crate::ast::Expr;

/// The precedence tag carried by one alternative of a lowered precedence
/// PPR, in source order (`0` is tightest-binding/first-declared).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrecedenceTag(pub u32);

/// A single climbing alternative, tagged with the precedence it was
/// declared at and stripped of its leading self-reference.
#[derive(Debug, Clone)]
pub struct RecurseTail {
    pub tag: PrecedenceTag,
    pub body: Expr,
}

/// A precedence PPR's body after lowering: zero or more base alternatives
/// that don't recurse, and zero or more recursive tails applied in a
/// left-associative loop.
#[derive(Debug, Clone)]
pub struct LoweredPrecedence {
    pub base: Expr,
    pub tails: Vec<RecurseTail>,
}

fn alternatives(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::Alternation(alts) => alts.clone(),
        other => vec![other.clone()],
    }
}

fn starts_with_self(expr: &Expr, rule_name: &str) -> bool {
    match expr {
        Expr::Name(n) => n == rule_name,
        Expr::Sequence(items) => items.first().is_some_and(|first| starts_with_self(first, rule_name)),
        _ => false,
    }
}

/// Strips the leading self-reference from a climbing alternative, leaving
/// the rest of the sequence as the recursive tail's body.
fn strip_leading_self(expr: Expr) -> Expr {
    match expr {
        Expr::Sequence(mut items) if !items.is_empty() => {
            items.remove(0);
            Expr::from_items(items)
        }
        Expr::Name(_) => Expr::Sequence(Vec::new()),
        other => other,
    }
}

/// Rewrites a precedence PPR's body. Non-precedence rules pass through
/// untouched as a single base alternative with no tails.
pub fn lower_precedence_body(rule_name: &str, body: &Expr) -> LoweredPrecedence {
    let mut base_alts = Vec::new();
    let mut tails = Vec::new();
    for (i, alt) in alternatives(body).into_iter().enumerate() {
        if starts_with_self(&alt, rule_name) {
            tails.push(RecurseTail { tag: PrecedenceTag(i as u32), body: strip_leading_self(alt) });
        } else {
            base_alts.push(alt);
        }
    }
    LoweredPrecedence { base: Expr::from_alternatives(base_alts), tails }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_recursive_alternative_becomes_a_base_alt() {
        let body = Expr::Alternation(vec![
            Expr::StringLit("lit".into()),
            Expr::Sequence(vec![Expr::Name("expr".into()), Expr::StringLit("+".into()), Expr::Name("expr".into())]),
        ]);
        let lowered = lower_precedence_body("expr", &body);
        assert_eq!(lowered.base, Expr::StringLit("lit".into()));
        assert_eq!(lowered.tails.len(), 1);
        assert_eq!(
            lowered.tails[0].body,
            Expr::Sequence(vec![Expr::StringLit("+".into()), Expr::Name("expr".into())])
        );
    }

    #[test]
    fn bare_self_reference_strips_to_empty_sequence() {
        let body = Expr::Name("expr".into());
        let lowered = lower_precedence_body("expr", &body);
        assert_eq!(lowered.base, Expr::Sequence(Vec::new()));
        assert_eq!(lowered.tails.len(), 1);
        assert_eq!(lowered.tails[0].body, Expr::Sequence(Vec::new()));
    }

    #[test]
    fn multiple_climbing_alternatives_keep_source_order_tags() {
        let body = Expr::Alternation(vec![
            Expr::Sequence(vec![Expr::Name("e".into()), Expr::StringLit("*".into()), Expr::Name("e".into())]),
            Expr::Sequence(vec![Expr::Name("e".into()), Expr::StringLit("+".into()), Expr::Name("e".into())]),
        ]);
        let lowered = lower_precedence_body("e", &body);
        assert_eq!(lowered.tails[0].tag, PrecedenceTag(0));
        assert_eq!(lowered.tails[1].tag, PrecedenceTag(1));
    }
}
