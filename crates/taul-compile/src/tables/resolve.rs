//! Resolves a validated (and, for precedence PPRs, lowered) rule body's
//! [`Expr`] tree into [`RExpr`]: every `name` reference becomes a
//! [`SymbolId`], and every literal leaf becomes the [`TermSet`] it denotes.
//!
//! The same `Expr::Name` opcode means two different things depending on
//! where it appears (spec.md §4.4's FIRST split between "code points for
//! the lexical table" and "token ids for the syntactic table"):
//!
//! - Inside an LPR body, a name always refers to another LPR, invoked as a
//!   lexical subroutine — i.e. a nonterminal call within the lexical table.
//! - Inside a PPR body, a name referring to an LPR is a *terminal*
//!   reference to that specific token kind; a name referring to another
//!   PPR is a nonterminal call within the syntactic table.

use std::collections::HashSet;

use indexmap::IndexMap;
use taul_core::symbol::CODE_POINT_MAX;
use taul_core::{SymbolId, SymbolRange, SymbolSet};

use super::term::TermSet;
use crate::ast::Expr;
use crate::lower::LoweredPrecedence;

/// Which partition a rule body being resolved belongs to — determines
/// whether a `name` reference to an LPR is a subroutine call or a
/// terminal match (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Lexical,
    Syntactic,
}

/// A rule body after name resolution, ready for FIRST/FOLLOW/PREDICT
/// computation and for the runtime pipeline to interpret directly.
#[derive(Debug, Clone)]
pub enum RExpr {
    /// Matches one terminal that is a member of the set, consuming it.
    Terminal(TermSet),
    /// Matches one terminal that is *not* a member of the set, consuming
    /// it. Distinct from `LookaheadNot(Terminal(..))`, which consumes
    /// nothing (spec.md §9 open question (b), resolved in DESIGN.md).
    NotTerminal(TermSet),
    /// `end` — zero-width assertion, succeeds only when the current
    /// terminal is the `end_of_input` sentinel.
    End,
    /// A nonterminal subroutine call: another LPR (lexical table) or PPR
    /// (syntactic table).
    Ref(SymbolId),
    Sequence(Vec<RExpr>),
    Alternation(Vec<RExpr>),
    Lookahead(Box<RExpr>),
    LookaheadNot(Box<RExpr>),
    Optional(Box<RExpr>),
    KleeneStar(Box<RExpr>),
    KleenePlus(Box<RExpr>),
    /// The resolved body of a `precedence`-qualified PPR: parse `base`,
    /// then greedily apply admissible `tails` (spec.md §4.3, §9
    /// "Precedence left-recursion"). Every tail is tagged with its source
    /// order; the runtime parser applies one only while its tag is at
    /// least the caller's minimum, building a left-associative chain
    /// instead of naive unbounded right recursion.
    PrecedenceClimb { id: SymbolId, base: Box<RExpr>, tails: Vec<(u32, RExpr)> },
    /// A reference to a precedence-qualified PPR, carrying the minimum
    /// tag admissible for this particular call. An ordinary reference
    /// (from another rule, or the rule's own non-recursive alternatives)
    /// carries `0`; the trailing self-reference inside one of the rule's
    /// own tails carries `tag + 1`, which is what forces left- rather
    /// than right-associativity (spec.md §9 open question (b) is
    /// unrelated; this resolves the *other* open design question, how
    /// "admissibility is a numeric comparison" maps onto the LL engine).
    PrecedenceRef { id: SymbolId, min_tag: u32 },
}

fn full_code_point_range() -> SymbolSet {
    SymbolSet::from_range(SymbolRange::new(
        SymbolId::from_code_point(0),
        SymbolId::from_code_point(CODE_POINT_MAX),
    ))
}

fn full_lpr_range(lpr_count: u32) -> SymbolSet {
    if lpr_count == 0 {
        return SymbolSet::new();
    }
    SymbolSet::from_range(SymbolRange::new(SymbolId::from_lpr_index(0), SymbolId::from_lpr_index(lpr_count - 1)))
}

fn string_termset(s: &str) -> TermSet {
    // A multi-character string literal is resolved to a Sequence of single
    // code point terminals by `resolve`, so this only ever sees one char.
    let c = s.chars().next().expect("empty string literal");
    TermSet::single(SymbolId::from_code_point(c as u32))
}

fn charset_termset(pairs: &[(u32, u32)]) -> TermSet {
    let mut set = SymbolSet::new();
    for &(lo, hi) in pairs {
        set.add_range(SymbolRange::new(SymbolId::from_code_point(lo), SymbolId::from_code_point(hi)));
    }
    TermSet::from_ranges(set)
}

/// The universe `not` subtracts from: every code point in an LPR body,
/// every token kind plus `failure` in a PPR body (`not` never wraps `end`,
/// which the no-end-subexpression mark excludes from its interior).
fn not_domain(scope: RuleScope, lpr_count: u32) -> TermSet {
    match scope {
        RuleScope::Lexical => TermSet::from_ranges(full_code_point_range()),
        RuleScope::Syntactic => TermSet::from_ranges(full_lpr_range(lpr_count)).union(&TermSet::failure()),
    }
}

/// Resolves `expr`, the body of a rule declared in `scope`, against the
/// id maps recovered by the validator. `precedence_ids` names every
/// `precedence`-qualified PPR in the grammar so that a `name` reference to
/// one of them resolves to [`RExpr::PrecedenceRef`] (minimum tag `0`)
/// rather than a plain [`RExpr::Ref`] — see [`resolve_precedence_rule`]
/// for how a precedence rule's own tails retag their self-references.
pub fn resolve(
    expr: &Expr,
    scope: RuleScope,
    lpr_ids: &IndexMap<String, SymbolId>,
    ppr_ids: &IndexMap<String, SymbolId>,
    lpr_count: u32,
    precedence_ids: &HashSet<SymbolId>,
) -> RExpr {
    match expr {
        Expr::End => RExpr::End,
        Expr::Any => RExpr::Terminal(TermSet::from_ranges(full_code_point_range())),
        Expr::StringLit(s) => {
            let chars: Vec<char> = s.chars().collect();
            if chars.len() == 1 {
                RExpr::Terminal(string_termset(s))
            } else {
                RExpr::Sequence(
                    chars
                        .into_iter()
                        .map(|c| RExpr::Terminal(TermSet::single(SymbolId::from_code_point(c as u32))))
                        .collect(),
                )
            }
        }
        Expr::CharsetLit(pairs) => RExpr::Terminal(charset_termset(pairs)),
        Expr::Token => RExpr::Terminal(TermSet::from_ranges(full_lpr_range(lpr_count))),
        Expr::Failure => RExpr::Terminal(TermSet::failure()),
        Expr::Name(name) => {
            let id = lpr_ids
                .get(name)
                .copied()
                .or_else(|| ppr_ids.get(name).copied())
                .expect("validator guarantees every name reference resolves");
            match scope {
                // Within an LPR body a name can only ever resolve to
                // another LPR (the validator rejects PPR references here);
                // it is always a lexical subroutine call.
                RuleScope::Lexical => RExpr::Ref(id),
                // Within a PPR body, an LPR reference is a terminal (match
                // this specific token kind); a PPR reference is a call,
                // climbing if it is precedence-qualified.
                RuleScope::Syntactic => {
                    if id.is_lpr() {
                        RExpr::Terminal(TermSet::single(id))
                    } else if precedence_ids.contains(&id) {
                        RExpr::PrecedenceRef { id, min_tag: 0 }
                    } else {
                        RExpr::Ref(id)
                    }
                }
            }
        }
        Expr::Sequence(items) => RExpr::Sequence(
            items.iter().map(|e| resolve(e, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)).collect(),
        ),
        Expr::Alternation(alts) => RExpr::Alternation(
            alts.iter().map(|e| resolve(e, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)).collect(),
        ),
        Expr::Lookahead(inner) => {
            RExpr::Lookahead(Box::new(resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)))
        }
        Expr::LookaheadNot(inner) => {
            RExpr::LookaheadNot(Box::new(resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)))
        }
        Expr::Not(inner) => {
            // `not`'s interior is validated to be a single terminal (a
            // charset, single-char string, `token`, or `failure` — never
            // `end`, excluded by the no-end-subexpression mark), so the
            // complement against the enclosing table's domain is computed
            // once here rather than carried as an unresolved negation.
            match resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids) {
                RExpr::Terminal(set) => RExpr::NotTerminal(not_domain(scope, lpr_count).difference(&set)),
                other => other,
            }
        }
        Expr::Optional(inner) => {
            RExpr::Optional(Box::new(resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)))
        }
        Expr::KleeneStar(inner) => {
            RExpr::KleeneStar(Box::new(resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)))
        }
        Expr::KleenePlus(inner) => {
            RExpr::KleenePlus(Box::new(resolve(inner, scope, lpr_ids, ppr_ids, lpr_count, precedence_ids)))
        }
    }
}

/// Resolves a `precedence`-qualified PPR's already-lowered body into a
/// [`RExpr::PrecedenceClimb`]. Each tail's self-references (left by
/// [`resolve`] as `PrecedenceRef { min_tag: 0, .. }`, the default for any
/// reference to a precedence PPR) are retagged to `tag + 1`, so that a
/// recursive call from inside the tail only accepts operators that bind
/// tighter than the one that produced the tail — the numeric-comparison
/// admissibility rule spec.md §9 calls for.
pub fn resolve_precedence_rule(
    id: SymbolId,
    lowered: LoweredPrecedence,
    lpr_ids: &IndexMap<String, SymbolId>,
    ppr_ids: &IndexMap<String, SymbolId>,
    lpr_count: u32,
    precedence_ids: &HashSet<SymbolId>,
) -> RExpr {
    let base = resolve(&lowered.base, RuleScope::Syntactic, lpr_ids, ppr_ids, lpr_count, precedence_ids);
    let tails = lowered
        .tails
        .into_iter()
        .map(|t| {
            let mut body = resolve(&t.body, RuleScope::Syntactic, lpr_ids, ppr_ids, lpr_count, precedence_ids);
            retag_self_refs(&mut body, id, t.tag.0 + 1);
            (t.tag.0, body)
        })
        .collect();
    RExpr::PrecedenceClimb { id, base: Box::new(base), tails }
}

fn retag_self_refs(expr: &mut RExpr, id: SymbolId, tag: u32) {
    match expr {
        RExpr::PrecedenceRef { id: rid, min_tag } if *rid == id => *min_tag = tag,
        RExpr::Sequence(items) | RExpr::Alternation(items) => {
            for item in items {
                retag_self_refs(item, id, tag);
            }
        }
        RExpr::Lookahead(inner)
        | RExpr::LookaheadNot(inner)
        | RExpr::Optional(inner)
        | RExpr::KleeneStar(inner)
        | RExpr::KleenePlus(inner) => retag_self_refs(inner, id, tag),
        RExpr::PrecedenceClimb { .. } | RExpr::PrecedenceRef { .. } | RExpr::Terminal(_) | RExpr::NotTerminal(_)
        | RExpr::End | RExpr::Ref(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpr_name_reference_is_always_a_subroutine_call() {
        let mut lpr_ids = IndexMap::new();
        lpr_ids.insert("digit".to_string(), SymbolId::from_lpr_index(0));
        let ppr_ids = IndexMap::new();
        let resolved =
            resolve(&Expr::Name("digit".into()), RuleScope::Lexical, &lpr_ids, &ppr_ids, 1, &HashSet::new());
        assert!(matches!(resolved, RExpr::Ref(id) if id == SymbolId::from_lpr_index(0)));
    }

    #[test]
    fn ppr_name_reference_to_lpr_becomes_a_terminal() {
        let mut lpr_ids = IndexMap::new();
        lpr_ids.insert("digit".to_string(), SymbolId::from_lpr_index(0));
        let ppr_ids = IndexMap::new();
        let resolved =
            resolve(&Expr::Name("digit".into()), RuleScope::Syntactic, &lpr_ids, &ppr_ids, 1, &HashSet::new());
        assert!(matches!(resolved, RExpr::Terminal(set) if set.contains(SymbolId::from_lpr_index(0))));
    }

    #[test]
    fn ppr_name_reference_to_ppr_stays_a_call() {
        let lpr_ids = IndexMap::new();
        let mut ppr_ids = IndexMap::new();
        ppr_ids.insert("expr".to_string(), SymbolId::from_ppr_index(0));
        let resolved =
            resolve(&Expr::Name("expr".into()), RuleScope::Syntactic, &lpr_ids, &ppr_ids, 0, &HashSet::new());
        assert!(matches!(resolved, RExpr::Ref(id) if id == SymbolId::from_ppr_index(0)));
    }

    #[test]
    fn ppr_name_reference_to_precedence_ppr_becomes_a_precedence_ref() {
        let lpr_ids = IndexMap::new();
        let mut ppr_ids = IndexMap::new();
        let expr_id = SymbolId::from_ppr_index(0);
        ppr_ids.insert("expr".to_string(), expr_id);
        let mut precedence_ids = HashSet::new();
        precedence_ids.insert(expr_id);
        let resolved = resolve(&Expr::Name("expr".into()), RuleScope::Syntactic, &lpr_ids, &ppr_ids, 0, &precedence_ids);
        assert!(matches!(resolved, RExpr::PrecedenceRef { id, min_tag: 0 } if id == expr_id));
    }

    #[test]
    fn not_charset_excludes_only_the_named_code_points() {
        let lpr_ids = IndexMap::new();
        let ppr_ids = IndexMap::new();
        let inner = Expr::Not(Box::new(Expr::CharsetLit(vec![('a' as u32, 'a' as u32)])));
        let resolved = resolve(&inner, RuleScope::Lexical, &lpr_ids, &ppr_ids, 0, &HashSet::new());
        match resolved {
            RExpr::NotTerminal(set) => {
                assert!(!set.contains(SymbolId::from_code_point('a' as u32)));
                assert!(set.contains(SymbolId::from_code_point('b' as u32)));
            }
            other => panic!("expected NotTerminal, got {other:?}"),
        }
    }

    #[test]
    fn multi_char_string_becomes_a_sequence_of_single_code_point_terminals() {
        let lpr_ids = IndexMap::new();
        let ppr_ids = IndexMap::new();
        let resolved =
            resolve(&Expr::StringLit("ab".into()), RuleScope::Lexical, &lpr_ids, &ppr_ids, 0, &HashSet::new());
        match resolved {
            RExpr::Sequence(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Sequence, got {other:?}"),
        }
    }
}
