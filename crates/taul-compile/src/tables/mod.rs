//! FIRST/FOLLOW/PREDICT over resolved rule bodies (spec.md §4.4): a
//! fixpoint over every rule in one partition computes each rule's FIRST
//! set and nullability, a second fixpoint over the same rules computes
//! FOLLOW, and a tree walk over every `Alternation` node uses both to
//! check that no two alternatives predict on an overlapping terminal.
//!
//! The runtime pipeline doesn't consume a flattened "table" distinct from
//! the resolved [`RExpr`] tree — it walks the tree directly the same way
//! [`taul_core::spec::interpret`] walks the instruction stream, consulting
//! [`ParseTable::first_of`]/[`ParseTable::is_nullable`] only at `Ref`
//! boundaries where a called rule's own facts are needed.

mod resolve;
mod term;

use std::collections::HashSet;

use indexmap::IndexMap;

use taul_core::error::ErrorKind;
use taul_core::{ErrorCounter, SymbolId};

pub use resolve::{RExpr, RuleScope, resolve, resolve_precedence_rule};
pub use term::TermSet;

/// One rule's FIRST set and nullability, as recovered by [`ParseTable::build`].
#[derive(Debug, Clone, Default)]
struct RuleFacts {
    first: TermSet,
    nullable: bool,
}

/// The per-rule facts needed to make a PREDICT decision at any choice
/// point in a partition's rule set, plus (build-time only) each rule's
/// FOLLOW set, kept around for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ParseTable {
    first: IndexMap<SymbolId, TermSet>,
    nullable: IndexMap<SymbolId, bool>,
    follow: IndexMap<SymbolId, TermSet>,
}

impl ParseTable {
    pub fn first_of(&self, id: SymbolId) -> TermSet {
        self.first.get(&id).cloned().unwrap_or_default()
    }

    pub fn is_nullable(&self, id: SymbolId) -> bool {
        self.nullable.get(&id).copied().unwrap_or(false)
    }

    pub fn follow_of(&self, id: SymbolId) -> TermSet {
        self.follow.get(&id).cloned().unwrap_or_default()
    }

    /// FIRST and nullability of an arbitrary resolved expression, using
    /// each already-built rule's own facts at every `Ref`/`PrecedenceRef`
    /// boundary instead of a build-time fixpoint map. The runtime parser
    /// calls this at every choice point (`Alternation`, `Optional`,
    /// `KleeneStar`/`KleenePlus`) a resolved rule body contains, not just
    /// at a rule's own top level — the same computation [`Self::build`]
    /// runs once per rule while converging `first`/`nullable`, reused here
    /// per call site instead of being cached per-subexpression.
    pub fn first_and_nullable(&self, expr: &RExpr) -> (TermSet, bool) {
        match expr {
            RExpr::End => (TermSet::end_of_input(), true),
            RExpr::Terminal(set) | RExpr::NotTerminal(set) => (set.clone(), false),
            RExpr::Ref(id) | RExpr::PrecedenceRef { id, .. } => (self.first_of(*id), self.is_nullable(*id)),
            RExpr::PrecedenceClimb { base, .. } => self.first_and_nullable(base),
            RExpr::Sequence(items) => {
                let mut out = TermSet::empty();
                let mut nullable = true;
                for item in items {
                    if !nullable {
                        break;
                    }
                    let (f, n) = self.first_and_nullable(item);
                    out.union_with(&f);
                    nullable = n;
                }
                (out, nullable)
            }
            RExpr::Alternation(alts) => {
                let mut out = TermSet::empty();
                let mut nullable = false;
                for alt in alts {
                    let (f, n) = self.first_and_nullable(alt);
                    out.union_with(&f);
                    nullable = nullable || n;
                }
                (out, nullable)
            }
            RExpr::Lookahead(inner) => (self.first_and_nullable(inner).0, true),
            RExpr::LookaheadNot(_) => (TermSet::empty(), true),
            RExpr::Optional(inner) => (self.first_and_nullable(inner).0, true),
            RExpr::KleeneStar(inner) => (self.first_and_nullable(inner).0, true),
            RExpr::KleenePlus(inner) => self.first_and_nullable(inner),
        }
    }

    /// Builds the table for one partition's rules (all LPRs, or all PPRs)
    /// and records an [`ErrorKind::IllegalAmbiguity`] for every pair of
    /// alternatives, anywhere in the partition, whose PREDICT sets
    /// overlap. `names` maps each rule id back to its declared name for
    /// error messages.
    pub fn build(
        rules: &IndexMap<SymbolId, RExpr>,
        names: &IndexMap<SymbolId, String>,
        errors: &mut ErrorCounter,
    ) -> ParseTable {
        log::trace!("building parse table for {} rule(s)", rules.len());
        let facts = compute_facts(rules);
        let follow = compute_follow(rules, &facts);

        for (&id, expr) in rules {
            let name = names.get(&id).cloned().unwrap_or_default();
            check_ambiguity(expr, &facts, follow.get(&id).cloned().unwrap_or_default(), &name, errors);
        }

        let mut first = IndexMap::new();
        let mut nullable = IndexMap::new();
        for (&id, f) in &facts {
            first.insert(id, f.first.clone());
            nullable.insert(id, f.nullable);
        }
        log::trace!("parse table built");
        ParseTable { first, nullable, follow }
    }
}

fn facts_lookup(facts: &IndexMap<SymbolId, RuleFacts>, id: SymbolId) -> (TermSet, bool) {
    match facts.get(&id) {
        Some(f) => (f.first.clone(), f.nullable),
        None => (TermSet::empty(), false),
    }
}

/// FIRST and nullability of `expr`, given the current (possibly still
/// converging) facts for every `Ref`-reachable rule.
fn first_of(expr: &RExpr, facts: &IndexMap<SymbolId, RuleFacts>) -> (TermSet, bool) {
    match expr {
        RExpr::End => (TermSet::end_of_input(), true),
        RExpr::Terminal(set) | RExpr::NotTerminal(set) => (set.clone(), false),
        RExpr::Ref(id) | RExpr::PrecedenceRef { id, .. } => facts_lookup(facts, *id),
        // FIRST/nullability of the whole climb comes only from `base` —
        // every tail begins after a complete base match, the same way a
        // `Sequence`'s tail never contributes to its own FIRST set. Looking
        // `id` up here instead would just be this rule's own in-progress
        // facts entry, which never converges to anything but empty.
        RExpr::PrecedenceClimb { base, .. } => first_of(base, facts),
        RExpr::Sequence(items) => {
            let mut out = TermSet::empty();
            let mut nullable = true;
            for item in items {
                if !nullable {
                    break;
                }
                let (f, n) = first_of(item, facts);
                out.union_with(&f);
                nullable = n;
            }
            (out, nullable)
        }
        RExpr::Alternation(alts) => {
            let mut out = TermSet::empty();
            let mut nullable = false;
            for alt in alts {
                let (f, n) = first_of(alt, facts);
                out.union_with(&f);
                nullable = nullable || n;
            }
            (out, nullable)
        }
        // Zero-width: a positive lookahead still requires its interior's
        // terminal to be present to succeed, but never consumes it.
        RExpr::Lookahead(inner) => {
            let (f, _) = first_of(inner, facts);
            (f, true)
        }
        // A negative lookahead's success condition isn't expressible as a
        // required terminal, so it contributes nothing to FIRST beyond
        // "doesn't consume" — whatever follows supplies the real PREDICT
        // terminal.
        RExpr::LookaheadNot(_) => (TermSet::empty(), true),
        RExpr::Optional(inner) => {
            let (f, _) = first_of(inner, facts);
            (f, true)
        }
        RExpr::KleeneStar(inner) => {
            let (f, _) = first_of(inner, facts);
            (f, true)
        }
        RExpr::KleenePlus(inner) => first_of(inner, facts),
    }
}

fn compute_facts(rules: &IndexMap<SymbolId, RExpr>) -> IndexMap<SymbolId, RuleFacts> {
    let mut facts: IndexMap<SymbolId, RuleFacts> = rules.keys().map(|&id| (id, RuleFacts::default())).collect();
    loop {
        let mut changed = false;
        for (&id, expr) in rules {
            let (first, nullable) = first_of(expr, &facts);
            let entry = facts.get_mut(&id).expect("every rule has a facts entry");
            if entry.first.union_with(&first) {
                changed = true;
            }
            if nullable && !entry.nullable {
                entry.nullable = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    facts
}

fn referenced_ids(rules: &IndexMap<SymbolId, RExpr>) -> HashSet<SymbolId> {
    fn visit(expr: &RExpr, set: &mut HashSet<SymbolId>) {
        match expr {
            RExpr::Ref(id) | RExpr::PrecedenceRef { id, .. } => {
                set.insert(*id);
            }
            RExpr::Sequence(items) | RExpr::Alternation(items) => {
                for item in items {
                    visit(item, set);
                }
            }
            RExpr::Lookahead(inner)
            | RExpr::LookaheadNot(inner)
            | RExpr::Optional(inner)
            | RExpr::KleeneStar(inner)
            | RExpr::KleenePlus(inner) => visit(inner, set),
            RExpr::PrecedenceClimb { base, tails, .. } => {
                visit(base, set);
                for (_, tail) in tails {
                    visit(tail, set);
                }
            }
            RExpr::End | RExpr::Terminal(_) | RExpr::NotTerminal(_) => {}
        }
    }
    let mut set = HashSet::new();
    for expr in rules.values() {
        visit(expr, &mut set);
    }
    set
}

/// Propagates `cont` — the FIRST set and nullability of whatever follows
/// `expr` in its enclosing rule — down to every `Ref` reachable from
/// `expr` without crossing another rule boundary, adding `cont.0` (and,
/// when `cont` is itself nullable, transitively the caller's own FOLLOW
/// already folded into `cont.0`) to each referenced rule's FOLLOW set.
fn walk_follow(
    expr: &RExpr,
    cont: (TermSet, bool),
    facts: &IndexMap<SymbolId, RuleFacts>,
    follow: &mut IndexMap<SymbolId, TermSet>,
    changed: &mut bool,
) {
    match expr {
        RExpr::End | RExpr::Terminal(_) | RExpr::NotTerminal(_) => {}
        RExpr::Ref(id) | RExpr::PrecedenceRef { id, .. } => {
            if follow.entry(*id).or_default().union_with(&cont.0) {
                *changed = true;
            }
        }
        // Mirrors a `Sequence(base, KleeneStar(Alternation(tails)))`: what
        // follows the whole climb also follows `base` when no tail is
        // taken, and follows every tail body (which loops back around to
        // itself, since another tail may follow once this one completes).
        RExpr::PrecedenceClimb { base, tails, .. } => {
            let mut tails_first = TermSet::empty();
            for (_, tail) in tails {
                let (f, _) = first_of(tail, facts);
                tails_first.union_with(&f);
            }
            // The tail loop is always nullable (zero applications is
            // legal), so whatever follows the whole climb also follows
            // `base` directly, alongside FIRST of a first tail application.
            let loop_cont = (tails_first.union(&cont.0), cont.1);
            walk_follow(base, loop_cont.clone(), facts, follow, changed);
            for (_, tail) in tails {
                walk_follow(tail, loop_cont.clone(), facts, follow, changed);
            }
        }
        RExpr::Sequence(items) => {
            let mut suffix = cont;
            for item in items.iter().rev() {
                walk_follow(item, suffix.clone(), facts, follow, changed);
                let (f, n) = first_of(item, facts);
                suffix = (if n { f.union(&suffix.0) } else { f }, n && suffix.1);
            }
        }
        RExpr::Alternation(alts) => {
            for alt in alts {
                walk_follow(alt, cont.clone(), facts, follow, changed);
            }
        }
        // Zero-width: what follows the assertion is exactly what follows
        // the whole construct.
        RExpr::Lookahead(inner) | RExpr::LookaheadNot(inner) => {
            walk_follow(inner, cont, facts, follow, changed);
        }
        RExpr::Optional(inner) => {
            walk_follow(inner, cont, facts, follow, changed);
        }
        RExpr::KleeneStar(inner) | RExpr::KleenePlus(inner) => {
            let (inner_first, _) = first_of(inner, facts);
            let loop_cont = (inner_first.union(&cont.0), cont.1);
            walk_follow(inner, loop_cont, facts, follow, changed);
        }
    }
}

fn compute_follow(
    rules: &IndexMap<SymbolId, RExpr>,
    facts: &IndexMap<SymbolId, RuleFacts>,
) -> IndexMap<SymbolId, TermSet> {
    let referenced = referenced_ids(rules);
    let mut follow: IndexMap<SymbolId, TermSet> = rules.keys().map(|&id| (id, TermSet::empty())).collect();
    // A rule nothing else in its partition refers to can only be a parse
    // entry point, invoked directly rather than from within another rule;
    // the only thing that can legally follow it is the end of input.
    for &id in rules.keys() {
        if !referenced.contains(&id) {
            follow.get_mut(&id).expect("every rule has a follow entry").union_with(&TermSet::end_of_input());
        }
    }
    loop {
        let mut changed = false;
        for (&id, expr) in rules {
            let own_follow = follow.get(&id).cloned().unwrap_or_default();
            walk_follow(expr, (own_follow, true), facts, &mut follow, &mut changed);
        }
        if !changed {
            break;
        }
    }
    follow
}

/// Walks every `Alternation` node reachable from `expr` (without crossing
/// a `Ref`) and records an ambiguity error for any pair of alternatives
/// whose PREDICT sets overlap. `rule_follow` stands in for the enclosing
/// rule's FOLLOW at every nesting depth — an approximation that is exact
/// for alternations at a rule's own top level and conservative (it can
/// only over-report, never miss a genuine top-level ambiguity) for more
/// deeply nested ones.
fn check_ambiguity(
    expr: &RExpr,
    facts: &IndexMap<SymbolId, RuleFacts>,
    rule_follow: TermSet,
    rule_name: &str,
    errors: &mut ErrorCounter,
) {
    match expr {
        RExpr::Alternation(alts) => {
            let predicts: Vec<TermSet> = alts
                .iter()
                .map(|alt| {
                    let (first, nullable) = first_of(alt, facts);
                    if nullable { first.union(&rule_follow) } else { first }
                })
                .collect();
            for i in 0..predicts.len() {
                for j in (i + 1)..predicts.len() {
                    if predicts[i].overlaps(&predicts[j]) {
                        log::debug!(
                            "ambiguity: '{rule_name}' alternatives {i} and {j} overlap on {}",
                            predicts[i]
                        );
                        errors.push_unlocated(ErrorKind::IllegalAmbiguity(
                            rule_name.to_string(),
                            format!("{}", predicts[i]),
                        ));
                    }
                }
            }
            for alt in alts {
                check_ambiguity(alt, facts, rule_follow.clone(), rule_name, errors);
            }
        }
        RExpr::Sequence(items) => {
            for item in items {
                check_ambiguity(item, facts, rule_follow.clone(), rule_name, errors);
            }
        }
        RExpr::Lookahead(inner)
        | RExpr::LookaheadNot(inner)
        | RExpr::Optional(inner)
        | RExpr::KleeneStar(inner)
        | RExpr::KleenePlus(inner) => {
            check_ambiguity(inner, facts, rule_follow, rule_name, errors);
        }
        // A precedence climb's own alternatives are deliberately exempt
        // from the static overlap check: every tail starts with the
        // operator that follows a complete base match, so tails routinely
        // share PREDICT terminals with each other (and with `base`'s
        // FOLLOW) by construction. Admissibility between them is resolved
        // at parse time by precedence tag instead (spec.md §4.3, §9), so
        // only their interiors are checked for ambiguity, never siblings
        // against each other.
        RExpr::PrecedenceClimb { base, tails, .. } => {
            check_ambiguity(base, facts, rule_follow.clone(), rule_name, errors);
            for (_, tail) in tails {
                check_ambiguity(tail, facts, rule_follow.clone(), rule_name, errors);
            }
        }
        RExpr::End | RExpr::Terminal(_) | RExpr::NotTerminal(_) | RExpr::Ref(_) | RExpr::PrecedenceRef { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taul_core::SymbolId;

    fn lpr(n: u32) -> SymbolId {
        SymbolId::from_lpr_index(n)
    }
    fn ppr(n: u32) -> SymbolId {
        SymbolId::from_ppr_index(n)
    }
    fn cp(c: char) -> TermSet {
        TermSet::single(SymbolId::from_code_point(c as u32))
    }

    #[test]
    fn disjoint_alternatives_raise_no_ambiguity() {
        let mut rules = IndexMap::new();
        rules.insert(ppr(0), RExpr::Alternation(vec![RExpr::Terminal(cp('a')), RExpr::Terminal(cp('b'))]));
        let mut names = IndexMap::new();
        names.insert(ppr(0), "start".to_string());
        let mut errors = ErrorCounter::new();
        ParseTable::build(&rules, &names, &mut errors);
        assert!(!errors.has_errors());
    }

    #[test]
    fn overlapping_alternatives_raise_ambiguity() {
        let mut rules = IndexMap::new();
        rules.insert(ppr(0), RExpr::Alternation(vec![RExpr::Terminal(cp('a')), RExpr::Terminal(cp('a'))]));
        let mut names = IndexMap::new();
        names.insert(ppr(0), "start".to_string());
        let mut errors = ErrorCounter::new();
        ParseTable::build(&rules, &names, &mut errors);
        assert!(errors.iter().any(|d| matches!(&d.kind, ErrorKind::IllegalAmbiguity(n, _) if n == "start")));
    }

    #[test]
    fn follow_seeds_entry_rule_with_end_of_input() {
        let mut rules = IndexMap::new();
        rules.insert(ppr(0), RExpr::Terminal(cp('a')));
        let facts = compute_facts(&rules);
        let follow = compute_follow(&rules, &facts);
        assert!(follow.get(&ppr(0)).unwrap().contains(SymbolId::END_OF_INPUT));
    }

    #[test]
    fn follow_propagates_through_nullable_sequence() {
        // rule a = b c?; rule b referenced so its FOLLOW should include
        // FIRST(c) plus, because c is optional, a's own FOLLOW.
        let mut rules = IndexMap::new();
        rules.insert(
            ppr(0),
            RExpr::Sequence(vec![RExpr::Ref(ppr(1)), RExpr::Optional(Box::new(RExpr::Ref(ppr(2))))]),
        );
        rules.insert(ppr(1), RExpr::Terminal(cp('b')));
        rules.insert(ppr(2), RExpr::Terminal(cp('c')));
        let facts = compute_facts(&rules);
        let follow = compute_follow(&rules, &facts);
        let b_follow = follow.get(&ppr(1)).unwrap();
        assert!(b_follow.contains(SymbolId::from_code_point('c' as u32)));
        assert!(b_follow.contains(SymbolId::END_OF_INPUT));
    }

    #[test]
    fn mutually_recursive_lexical_rules_reach_a_fixpoint() {
        // digit -> '0'..'9'; number -> digit number | digit
        let mut rules = IndexMap::new();
        rules.insert(
            lpr(0),
            RExpr::Alternation(vec![
                RExpr::Sequence(vec![RExpr::Ref(lpr(1)), RExpr::Ref(lpr(0))]),
                RExpr::Ref(lpr(1)),
            ]),
        );
        rules.insert(lpr(1), RExpr::Terminal(TermSet::single(SymbolId::from_code_point('0' as u32))));
        let facts = compute_facts(&rules);
        assert!(facts.get(&lpr(0)).unwrap().first.contains(SymbolId::from_code_point('0' as u32)));
        assert!(!facts.get(&lpr(0)).unwrap().nullable);
    }
}
