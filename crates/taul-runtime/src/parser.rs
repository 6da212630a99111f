//! The parser: drives the syntactic parse table over a [`Lexer`]'s tokens
//! to build a [`ParseTree`] (spec.md §4.5 "Parser").
//!
//! The body walk mirrors [`crate::lexer::Lexer::match_rexpr`] structurally
//! (same `RExpr` recursion), but works in tokens instead of glyphs, always
//! builds a tree rather than just counting consumed units, and can recover
//! from a mismatch by consulting a bound [`ErrorHandler`] instead of just
//! backtracking.

use taul_core::source::SourcePos;
use taul_core::{ParseTree, SymbolId, Token};
use taul_compile::{Grammar, RExpr, TermSet};

use crate::error_handler::{ErrorHandler, ErrorRecovery, NoRecoveryErrorHandler};
use crate::lexer::Lexer;
use crate::listener::Listener;

/// A one-token lookahead buffer over a [`Lexer`], with checkpoint/restore
/// for the parser's non-consuming `lookahead`/`lookahead_not` assertions.
/// Always forces `cut_skip`: the parser never sees a `skip`-qualified
/// token (spec.md §4.5, point 1).
struct TokenCursor<'g> {
    lexer: Lexer<'g>,
    peeked: Option<Token>,
    /// The end-of-input token, once seen — `Lexer::next_token` reports it
    /// exactly once and then returns `None` forever, but the cursor needs
    /// to keep handing it back on every subsequent `peek`.
    eoi: Option<Token>,
}

impl<'g> TokenCursor<'g> {
    fn new(mut lexer: Lexer<'g>) -> Self {
        lexer.set_cut_skip(true);
        TokenCursor { lexer, peeked: None, eoi: None }
    }

    fn pull(&mut self) -> Token {
        match self.lexer.next_token() {
            Some(tok) => {
                if tok.is_end_of_input() {
                    self.eoi = Some(tok);
                }
                tok
            }
            None => self.eoi.expect("lexer exhausted without ever emitting end-of-input"),
        }
    }

    fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.pull());
        }
        self.peeked.unwrap()
    }

    fn next(&mut self) -> Token {
        let tok = self.peek();
        self.peeked = None;
        tok
    }

    fn done(&mut self) -> bool {
        self.peek().is_end_of_input()
    }

    /// The byte position of the next unconsumed token — a checkpoint
    /// `restore` can return to.
    fn checkpoint(&mut self) -> SourcePos {
        self.peek().low_pos()
    }

    fn restore(&mut self, pos: SourcePos) {
        self.lexer.seek(pos);
        self.peeked = None;
    }
}

/// What a pending syntax error's recovery must re-check for (spec.md §4.5
/// "Error handler contract"): the same PREDICT condition that originally
/// failed, re-tested at the (possibly advanced) current position.
#[derive(Clone)]
enum PendingCheck {
    Terminal(TermSet),
    Nonterminal { first: TermSet, nullable: bool, follow: TermSet },
}

impl PendingCheck {
    fn holds(&self, actual: SymbolId) -> bool {
        match self {
            PendingCheck::Terminal(set) => set.contains(actual),
            PendingCheck::Nonterminal { first, nullable, follow } => {
                first.contains(actual) || (*nullable && follow.contains(actual))
            }
        }
    }
}

/// Drives a [`Grammar`]'s syntactic table over a [`Lexer`] to build a
/// [`ParseTree`], reporting syntax errors live to an optional bound
/// [`Listener`] and recovering from them via a bound [`ErrorHandler`]
/// (default [`NoRecoveryErrorHandler`] — no recovery, the first
/// unresolved error aborts the parse).
pub struct Parser<'g> {
    grammar: &'g Grammar,
    cursor: TokenCursor<'g>,
    listener: Option<Box<dyn Listener>>,
    error_handler: Box<dyn ErrorHandler>,
    pending: Option<PendingCheck>,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar, lexer: Lexer<'g>) -> Self {
        Parser {
            grammar,
            cursor: TokenCursor::new(lexer),
            listener: None,
            error_handler: Box::new(NoRecoveryErrorHandler::new()),
            pending: None,
        }
    }

    pub fn bind_listener(&mut self, listener: impl Listener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn unbind_listener(&mut self) {
        self.listener = None;
    }

    pub fn bind_error_handler(&mut self, handler: impl ErrorHandler + 'static) {
        self.error_handler = Box::new(handler);
    }

    /// Parses `start` into a full [`ParseTree`], then (if a listener is
    /// bound) replays the tree's construction events into it exactly once
    /// (spec.md §9 "Push-based listener vs pull-based pipeline" — see
    /// `crate::listener` module docs for why this isn't done live).
    pub fn parse(&mut self, start: SymbolId) -> ParseTree {
        let mut tree = ParseTree::new();
        self.error_handler.begin_session();
        self.parse_ppr(start, &mut tree);
        self.error_handler.end_session();
        if let Some(listener) = self.listener.take() {
            let mut listener = listener;
            listener.playback(&tree);
            self.listener = Some(listener);
        }
        tree
    }

    /// Parses `start` for validation only, discarding the tree it builds
    /// internally. A literal no-allocation implementation isn't possible
    /// here: the left-recursion rewrite (`ParseTree::wrap_as_parent`) and
    /// listener playback both need the finished node array to work from,
    /// not just a pass/fail verdict (documented in DESIGN.md).
    pub fn parse_notree(&mut self, start: SymbolId) -> bool {
        let tree = self.parse(start);
        !tree.is_aborted()
    }

    fn rule_expr(&self, id: SymbolId) -> &'g RExpr {
        &self.grammar.ppr_rule(id).expect("referenced PPR exists in this grammar").expr
    }

    fn parse_ppr(&mut self, id: SymbolId, tree: &mut ParseTree) -> bool {
        if matches!(self.rule_expr(id), RExpr::PrecedenceClimb { .. }) {
            return self.parse_precedence(id, 0, tree);
        }
        let pos = self.cursor.peek().low_pos();
        tree.syntactic(id, pos);
        let follow = self.grammar.syntactic_table.follow_of(id);
        let ok = self.parse_expr(self.rule_expr(id), id, &follow, tree);
        tree.close();
        ok
    }

    /// Drives a `precedence`-qualified PPR: match `base`, then greedily
    /// apply every admissible tail (tag at least `min_tag`), wrapping the
    /// previous complete application as the new node's left child each
    /// time (spec.md §4.3, §9; see the `wrap_as_parent_rebuilds_left_leaning_chain`
    /// test in `taul-core` for the node-surgery shape this drives).
    fn parse_precedence(&mut self, id: SymbolId, min_tag: u32, tree: &mut ParseTree) -> bool {
        let (base, tails) = match self.rule_expr(id) {
            RExpr::PrecedenceClimb { base, tails, .. } => (base.as_ref(), tails),
            _ => unreachable!("parse_precedence called on a non-precedence-qualified PPR"),
        };
        let follow = self.grammar.syntactic_table.follow_of(id);

        let pos = self.cursor.peek().low_pos();
        let root = tree.syntactic(id, pos);
        if !self.parse_expr(base, id, &follow, tree) {
            tree.close();
            return false;
        }
        tree.close();
        let child_root = root.index().expect("syntactic() always yields a live node");

        loop {
            let actual = self.cursor.peek();
            let chosen = tails.iter().find(|(tag, tail)| {
                if *tag < min_tag {
                    return false;
                }
                let (first, nullable) = self.grammar.syntactic_table.first_and_nullable(tail);
                first.contains(actual.id()) || (nullable && follow.contains(actual.id()))
            });
            let Some((_, tail)) = chosen else { break };
            tree.wrap_as_parent(child_root, id);
            if !self.parse_expr(tail, id, &follow, tree) {
                tree.close();
                return false;
            }
            tree.close();
        }
        true
    }

    /// Walks one PPR body. `rule_id`/`rule_follow` stand in for the
    /// enclosing rule's own identity and FOLLOW set at every nesting
    /// depth — the same approximation `ParseTable::build`'s ambiguity
    /// check uses (tables/mod.rs), threaded through unchanged by
    /// `Sequence`/`Optional`/`Lookahead`/Kleene and consulted only at an
    /// `Alternation` boundary.
    fn parse_expr(&mut self, expr: &'g RExpr, rule_id: SymbolId, rule_follow: &TermSet, tree: &mut ParseTree) -> bool {
        match expr {
            RExpr::End => self.expect(|t| t.is_end_of_input(), TermSet::end_of_input(), false, tree),
            RExpr::Terminal(set) | RExpr::NotTerminal(set) => {
                self.expect(|t| set.contains(t.id()), set.clone(), true, tree)
            }
            RExpr::Ref(id) => self.parse_ppr(*id, tree),
            RExpr::PrecedenceRef { id, min_tag } => self.parse_precedence(*id, *min_tag, tree),
            RExpr::PrecedenceClimb { .. } => {
                unreachable!("a precedence climb only ever appears as its own rule's top-level body")
            }
            RExpr::Sequence(items) => {
                for item in items {
                    if !self.parse_expr(item, rule_id, rule_follow, tree) {
                        return false;
                    }
                }
                true
            }
            RExpr::Alternation(alts) => match self.choose_alt(alts, rule_id, rule_follow, tree) {
                Some(alt) => self.parse_expr(alt, rule_id, rule_follow, tree),
                None => false,
            },
            RExpr::Lookahead(inner) => {
                let cp = self.cursor.checkpoint();
                let ok = self.probe(inner);
                self.cursor.restore(cp);
                if ok {
                    true
                } else {
                    self.fail_assertion(rule_id, tree)
                }
            }
            RExpr::LookaheadNot(inner) => {
                let cp = self.cursor.checkpoint();
                let ok = self.probe(inner);
                self.cursor.restore(cp);
                if !ok {
                    true
                } else {
                    self.fail_assertion(rule_id, tree)
                }
            }
            RExpr::Optional(inner) => {
                let (first, _) = self.grammar.syntactic_table.first_and_nullable(inner);
                if first.contains(self.cursor.peek().id()) {
                    self.parse_expr(inner, rule_id, rule_follow, tree)
                } else {
                    true
                }
            }
            RExpr::KleeneStar(inner) => {
                loop {
                    let (first, _) = self.grammar.syntactic_table.first_and_nullable(inner);
                    if !first.contains(self.cursor.peek().id()) {
                        break;
                    }
                    let before = self.cursor.peek().low_pos();
                    if !self.parse_expr(inner, rule_id, rule_follow, tree) {
                        return false;
                    }
                    if self.cursor.peek().low_pos() == before {
                        break;
                    }
                }
                true
            }
            RExpr::KleenePlus(inner) => {
                let mut n = 0u32;
                loop {
                    let (first, _) = self.grammar.syntactic_table.first_and_nullable(inner);
                    if !first.contains(self.cursor.peek().id()) {
                        break;
                    }
                    let before = self.cursor.peek().low_pos();
                    if !self.parse_expr(inner, rule_id, rule_follow, tree) {
                        return false;
                    }
                    n += 1;
                    if self.cursor.peek().low_pos() == before {
                        break;
                    }
                }
                if n == 0 {
                    // Force one real attempt so the ordinary terminal/
                    // nonterminal error path (with recovery) reports and
                    // handles the missing mandatory iteration.
                    self.parse_expr(inner, rule_id, rule_follow, tree)
                } else {
                    true
                }
            }
        }
    }

    /// Picks the alternative whose PREDICT set contains the current
    /// token, retrying after a recovered nonterminal error.
    fn choose_alt(
        &mut self,
        alts: &'g [RExpr],
        rule_id: SymbolId,
        rule_follow: &TermSet,
        tree: &mut ParseTree,
    ) -> Option<&'g RExpr> {
        loop {
            let actual = self.cursor.peek();
            if let Some(alt) = alts.iter().find(|alt| {
                let (first, nullable) = self.grammar.syntactic_table.first_and_nullable(alt);
                first.contains(actual.id()) || (nullable && rule_follow.contains(actual.id()))
            }) {
                return Some(alt);
            }
            let mut first = TermSet::empty();
            let mut nullable = false;
            for alt in alts {
                let (f, n) = self.grammar.syntactic_table.first_and_nullable(alt);
                first.union_with(&f);
                nullable = nullable || n;
            }
            if !self.raise_nonterminal_error(
                rule_id,
                actual,
                PendingCheck::Nonterminal { first, nullable, follow: rule_follow.clone() },
                tree,
            ) {
                return None;
            }
        }
    }

    /// A failed `lookahead`/`lookahead_not` assertion is reported the same
    /// way an unpredicted alternative is: no terminal was expected, so
    /// there's no `TermSet` to name, but the enclosing rule still failed
    /// to make progress on the actual token.
    fn fail_assertion(&mut self, rule_id: SymbolId, tree: &mut ParseTree) -> bool {
        let actual = self.cursor.peek();
        self.raise_nonterminal_error(
            rule_id,
            actual,
            PendingCheck::Nonterminal { first: TermSet::empty(), nullable: false, follow: TermSet::empty() },
            tree,
        )
    }

    /// Repeatedly tests `matches` against the current token, consuming
    /// and recording it into `tree` on success (unless `consume` is
    /// false, for zero-width assertions like `end`); on mismatch, reports
    /// a terminal error and retries after a recovered position.
    fn expect(
        &mut self,
        matches: impl Fn(Token) -> bool,
        expected: TermSet,
        consume: bool,
        tree: &mut ParseTree,
    ) -> bool {
        loop {
            let tok = self.cursor.peek();
            if matches(tok) {
                if consume {
                    self.cursor.next();
                    tree.lexical(tok);
                }
                return true;
            }
            if !self.raise_terminal_error(expected.clone(), tok, tree) {
                return false;
            }
        }
    }

    fn raise_terminal_error(&mut self, expected: TermSet, actual: Token, tree: &mut ParseTree) -> bool {
        log::debug!("terminal error: expected {expected}, got {actual:?}");
        if let Some(listener) = &mut self.listener {
            listener.on_terminal_error(expected.clone(), actual);
        }
        self.pending = Some(PendingCheck::Terminal(expected));
        let mut handler = std::mem::replace(&mut self.error_handler, Box::new(NoRecoveryErrorHandler::new()));
        let recovered = handler.report_terminal_error(self, actual);
        self.error_handler = handler;
        self.pending = None;
        if !recovered {
            log::warn!("unrecovered terminal error, aborting parse");
            tree.abort();
        }
        recovered
    }

    fn raise_nonterminal_error(
        &mut self,
        rule_id: SymbolId,
        actual: Token,
        check: PendingCheck,
        tree: &mut ParseTree,
    ) -> bool {
        log::debug!("nonterminal error in {rule_id}: got {actual:?}");
        if let Some(listener) = &mut self.listener {
            listener.on_nonterminal_error(rule_id, actual);
        }
        self.pending = Some(check);
        let mut handler = std::mem::replace(&mut self.error_handler, Box::new(NoRecoveryErrorHandler::new()));
        let recovered = handler.report_nonterminal_error(self, actual);
        self.error_handler = handler;
        self.pending = None;
        if !recovered {
            log::warn!("unrecovered nonterminal error, aborting parse");
            tree.abort();
        }
        recovered
    }

    /// Pure backtracking match used only inside `lookahead`/
    /// `lookahead_not` assertions: consumes tokens from the cursor to
    /// test whether `expr` matches, contributes nothing to any tree, and
    /// never reports an error — the caller always restores the cursor's
    /// checkpoint afterward regardless of the result. Mirrors
    /// `Lexer::match_rexpr`'s backtracking shape, one level up (tokens
    /// instead of glyphs).
    fn probe(&mut self, expr: &RExpr) -> bool {
        match expr {
            RExpr::End => self.cursor.peek().is_end_of_input(),
            RExpr::Terminal(set) | RExpr::NotTerminal(set) => {
                if set.contains(self.cursor.peek().id()) {
                    self.cursor.next();
                    true
                } else {
                    false
                }
            }
            RExpr::Ref(id) => self.probe(self.rule_expr(*id)),
            RExpr::PrecedenceRef { id, .. } => self.probe(self.rule_expr(*id)),
            RExpr::PrecedenceClimb { base, tails, .. } => {
                if !self.probe(base) {
                    return false;
                }
                loop {
                    let mut applied = false;
                    for (_, tail) in tails {
                        let cp = self.cursor.checkpoint();
                        if self.probe(tail) {
                            applied = true;
                            break;
                        }
                        self.cursor.restore(cp);
                    }
                    if !applied {
                        break;
                    }
                }
                true
            }
            RExpr::Sequence(items) => {
                let cp = self.cursor.checkpoint();
                for item in items {
                    if !self.probe(item) {
                        self.cursor.restore(cp);
                        return false;
                    }
                }
                true
            }
            RExpr::Alternation(alts) => {
                let cp = self.cursor.checkpoint();
                for alt in alts {
                    if self.probe(alt) {
                        return true;
                    }
                    self.cursor.restore(cp);
                }
                false
            }
            RExpr::Lookahead(inner) => {
                let cp = self.cursor.checkpoint();
                let ok = self.probe(inner);
                self.cursor.restore(cp);
                ok
            }
            RExpr::LookaheadNot(inner) => {
                let cp = self.cursor.checkpoint();
                let ok = self.probe(inner);
                self.cursor.restore(cp);
                !ok
            }
            RExpr::Optional(inner) => {
                let cp = self.cursor.checkpoint();
                if !self.probe(inner) {
                    self.cursor.restore(cp);
                }
                true
            }
            RExpr::KleeneStar(inner) => {
                loop {
                    let cp = self.cursor.checkpoint();
                    if !self.probe(inner) || self.cursor.checkpoint() == cp {
                        self.cursor.restore(cp);
                        break;
                    }
                }
                true
            }
            RExpr::KleenePlus(inner) => {
                let mut n = 0u32;
                loop {
                    let cp = self.cursor.checkpoint();
                    if !self.probe(inner) || self.cursor.checkpoint() == cp {
                        self.cursor.restore(cp);
                        break;
                    }
                    n += 1;
                }
                n > 0
            }
        }
    }
}

impl<'g> ErrorRecovery for Parser<'g> {
    fn eh_peek(&mut self) -> Token {
        self.cursor.peek()
    }

    fn eh_next(&mut self) -> Token {
        self.cursor.next()
    }

    fn eh_done(&mut self) -> bool {
        self.cursor.done()
    }

    fn eh_check(&mut self) -> bool {
        let actual = self.cursor.peek().id();
        self.pending.as_ref().is_some_and(|p| p.holds(actual))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taul_core::{Qualifier, SourceCode, SpecWriter};
    use taul_compile::load;

    use super::*;
    use crate::Reader;

    fn src(text: &str) -> Arc<SourceCode> {
        let mut sc = SourceCode::new();
        sc.add("t", text);
        Arc::new(sc)
    }

    /// S2 from spec.md §8: three `any`-matched children under one root.
    #[test]
    fn s2_three_any_char_children() {
        let mut w = SpecWriter::new();
        w.lpr_decl("chr");
        w.ppr_decl("start");
        w.lpr("chr", Qualifier::None).any().close();
        w.ppr("start", Qualifier::None).name("chr").name("chr").name("chr").close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let lexer = Lexer::new(&g, Reader::new(src("abc")));
        let mut parser = Parser::new(&g, lexer);
        let start = g.ppr_id("start").unwrap();
        let tree = parser.parse(start);

        assert!(tree.is_sealed());
        assert!(!tree.is_aborted());
        let root = tree.root().unwrap();
        assert_eq!(root.child_count(), 3);
        assert_eq!(root.len(), 3);
    }

    /// S5 from spec.md §8/§9: left-recursive `precedence` PPR climbs into
    /// a left-leaning tree instead of diverging.
    #[test]
    fn s5_precedence_left_recursion_builds_left_leaning_tree() {
        let mut w = SpecWriter::new();
        w.lpr_decl("int");
        w.lpr_decl("plus");
        w.ppr_decl("expr");
        w.lpr("int", Qualifier::None).charset("123").close();
        w.lpr("plus", Qualifier::None).string("+").close();
        w.ppr("expr", Qualifier::Precedence)
            .name("expr")
            .name("plus")
            .name("expr")
            .alternative()
            .name("int")
            .close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let lexer = Lexer::new(&g, Reader::new(src("1+2+3")));
        let mut parser = Parser::new(&g, lexer);
        let start = g.ppr_id("expr").unwrap();
        let tree = parser.parse(start);

        assert!(tree.is_sealed());
        assert!(!tree.is_aborted());
        let root = tree.root().unwrap();
        assert_eq!(root.len(), 5);
        assert_eq!(root.child_count(), 3);
        let lhs = tree.get(root.right_child()).unwrap();
        assert!(lhs.is_syntactic());
        assert_eq!(lhs.child_count(), 3);
        assert_eq!(lhs.low_pos().offset(), 0);
        assert_eq!(lhs.len(), 3);
    }

    /// A `not_recovery`-handled terminal mismatch aborts the tree.
    #[test]
    fn unrecovered_terminal_error_aborts_the_tree() {
        let mut w = SpecWriter::new();
        w.lpr_decl("a");
        w.ppr_decl("start");
        w.lpr("a", Qualifier::None).string("a").close();
        w.ppr("start", Qualifier::None).name("a").close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let lexer = Lexer::new(&g, Reader::new(src("b")));
        let mut parser = Parser::new(&g, lexer);
        let start = g.ppr_id("start").unwrap();
        let tree = parser.parse(start);
        assert!(tree.is_aborted());
    }

    /// With a `RegularErrorHandler` bound, a single bad token before a
    /// recognizable one is skipped and the parse completes.
    #[test]
    fn regular_handler_recovers_past_a_bad_token() {
        let mut w = SpecWriter::new();
        w.lpr_decl("a");
        w.lpr_decl("junk");
        w.ppr_decl("start");
        w.lpr("a", Qualifier::None).string("a").close();
        w.lpr("junk", Qualifier::None).charset("xyz").close();
        w.ppr("start", Qualifier::None).name("a").close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let lexer = Lexer::new(&g, Reader::new(src("xa")));
        let mut parser = Parser::new(&g, lexer);
        parser.bind_error_handler(crate::error_handler::RegularErrorHandler::new());
        let start = g.ppr_id("start").unwrap();
        let tree = parser.parse(start);
        assert!(!tree.is_aborted());
        assert!(tree.is_sealed());
    }
}
