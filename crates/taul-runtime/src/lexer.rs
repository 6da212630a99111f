//! The lexer: drives the lexical parse table over a [`Reader`]'s glyphs to
//! produce tokens (spec.md §4.5 "Lexer").

use taul_core::source::SourcePos;
use taul_core::{Glyph, Qualifier, SymbolId, Token};
use taul_compile::{Grammar, RExpr};

use crate::reader::Reader;

/// Holds a grammar reference and a cut-skip flag (default `true`); drives
/// the longest-match lexical scan at the reader's current position.
pub struct Lexer<'g> {
    grammar: &'g Grammar,
    reader: Reader,
    cut_skip: bool,
    end_emitted: bool,
    end_of_input_attempted: bool,
    observer: Option<Box<dyn FnMut(Token)>>,
}

impl<'g> Lexer<'g> {
    pub fn new(grammar: &'g Grammar, reader: Reader) -> Self {
        Lexer { grammar, reader, cut_skip: true, end_emitted: false, end_of_input_attempted: false, observer: None }
    }

    pub fn set_cut_skip(&mut self, cut_skip: bool) {
        self.cut_skip = cut_skip;
    }

    pub fn cut_skip(&self) -> bool {
        self.cut_skip
    }

    pub fn bind_observer(&mut self, observer: impl FnMut(Token) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn reset(&mut self) {
        self.reader.reset();
        self.end_emitted = false;
        self.end_of_input_attempted = false;
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Repositions the lexer to resume scanning from `pos`, as if it had
    /// just been reset there — used by the parser to restore a checkpoint
    /// after a non-consuming lookahead assertion (`lookahead`/
    /// `lookahead_not`) over a stretch of already-lexed tokens.
    pub fn seek(&mut self, pos: SourcePos) {
        self.rewind_to(pos);
        self.end_emitted = false;
        self.end_of_input_attempted = false;
    }

    pub fn done(&self) -> bool {
        self.end_emitted
    }

    /// Whether `tok` was produced by a `skip`-qualified LPR.
    fn is_skip(&self, tok: Token) -> bool {
        tok.rule_id()
            .and_then(|id| self.grammar.lpr_rule(id))
            .is_some_and(|r| r.qualifier == Qualifier::Skip)
    }

    /// Produces the next token, or `None` once `end-of-input` has already
    /// been reported. When cut-skip is set, a `skip`-qualified match is
    /// still reported to the bound observer but never returned here —
    /// this loops straight through to the next real token instead (spec.md
    /// §4.5, point 1).
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let tok = self.scan_one()?;
            if self.cut_skip && self.is_skip(tok) {
                continue;
            }
            return Some(tok);
        }
    }

    /// One raw lexer attempt: a normal (possibly `skip`-qualified) token,
    /// a coalesced `failure` token, or `end-of-input`.
    ///
    /// Consecutive `failure` tokens are coalesced into a single `failure`
    /// spanning their combined length before being delivered (spec.md
    /// §4.5, point 4) — this loop keeps scanning raw attempts itself
    /// rather than delegating coalescing to the caller.
    ///
    /// On an entirely empty source, an entry point still gets exactly one
    /// match attempt before `end-of-input` is declared (spec.md §8 S3:
    /// `f: -end;` over `""` must report a `failure`, not `end-of-input`,
    /// since the lookahead-not-end assertion itself fails there). No
    /// glyph remains to force a length-one failure the way the non-empty
    /// case does, so that single attempt reports a zero-length failure
    /// instead (§9 Open Question (a), extended to the no-glyphs-left
    /// case). This only fires at position 0 — reaching true end-of-input
    /// after real content has already been consumed is ordinary
    /// exhaustion, not this degenerate case, and still goes straight to
    /// `end-of-input` as before. `end_of_input_attempted` bounds the
    /// one-time attempt so a grammar with no possible match at position 0
    /// can't loop re-trying it forever.
    fn scan_one(&mut self) -> Option<Token> {
        if self.end_emitted {
            return None;
        }
        if self.reader.peek().is_end_of_input() {
            if !self.end_of_input_attempted && self.reader.pos() == SourcePos::new(0) {
                self.end_of_input_attempted = true;
                if let Some(tok) = self.attempt_one() {
                    self.notify(tok);
                    return Some(tok);
                }
                let failure = Token::failure(self.reader.peek().pos(), 0);
                self.notify(failure);
                return Some(failure);
            }
            self.end_emitted = true;
            let tok = Token::end_of_input(self.reader.peek().pos());
            self.notify(tok);
            return Some(tok);
        }

        let start = self.reader.peek().pos();
        let mut failure_len: u32 = 0;
        loop {
            match self.attempt_one() {
                // A non-empty match: either the token itself (no failure
                // run preceded it) or the signal to stop the run here and
                // deliver the coalesced failure now, replaying this same
                // match on the caller's next `next_token` call.
                Some(tok) if tok.len() > 0 => {
                    if failure_len == 0 {
                        self.notify(tok);
                        return Some(tok);
                    }
                    let failure = Token::failure(start, failure_len);
                    self.rewind_to(tok.low_pos());
                    self.notify(failure);
                    return Some(failure);
                }
                // No match, or a zero-length match (spec.md §4.5, point
                // 2): both cannot make progress on their own, so force
                // one glyph's worth of failure and keep scanning — a
                // run of either kind coalesces into one failure token.
                _ => {
                    let glyph = self.reader.next();
                    failure_len += glyph.len().max(1);
                    if self.reader.peek().is_end_of_input() {
                        let failure = Token::failure(start, failure_len);
                        self.notify(failure);
                        return Some(failure);
                    }
                }
            }
        }
    }

    fn notify(&mut self, tok: Token) {
        if let Some(obs) = &mut self.observer {
            obs(tok);
        }
    }

    /// Rewinds the reader back to `pos`, used after a lookahead attempt
    /// that consumed glyphs past a failure run's boundary. `Reader` has no
    /// native seek, so this replays from the start — cheap in practice
    /// since failure runs are short and lexing is already linear in input
    /// length.
    fn rewind_to(&mut self, pos: SourcePos) {
        self.reader.reset();
        while self.reader.pos() < pos {
            self.reader.next();
        }
    }

    /// Attempts the longest match among every lexer entry point at the
    /// reader's current position (skipping `support`-qualified rules,
    /// which are reachable only as subroutines). Ties are broken by
    /// declaration order, the first-declared rule winning. Returns `None`
    /// if no entry point matches a non-empty span and no entry point
    /// matches an empty one either (i.e. this is the "no match" case that
    /// the caller turns into one glyph's worth of failure).
    fn attempt_one(&mut self) -> Option<Token> {
        let start = self.reader.pos();
        let mut best: Option<(SymbolId, u32)> = None;
        for rule in self.grammar.lexer_entry_points() {
            self.rewind_to(start);
            if let Some(len) = self.match_lpr(rule.id) {
                let better = match best {
                    Some((_, best_len)) => len > best_len,
                    None => true,
                };
                if better {
                    best = Some((rule.id, len));
                }
            }
        }
        self.rewind_to(start);
        match best {
            Some((id, len)) if len > 0 => {
                for _ in 0..len {
                    self.reader.next();
                }
                // `len` is a glyph count; the token's own length is in
                // bytes, recovered from how far advancing that many
                // glyphs actually moved the reader.
                Some(Token::normal(id, SourcePos::new(start.offset()), self.reader.pos().offset() - start.offset()))
            }
            Some((id, _)) => Some(Token::normal(id, start, 0)),
            None => None,
        }
    }

    /// Matches LPR `id`'s body against the reader starting at its current
    /// position, returning the number of glyphs consumed on success.
    fn match_lpr(&mut self, id: SymbolId) -> Option<u32> {
        let rule = self.grammar.lpr_rule(id)?;
        let mut count = 0u32;
        if self.match_rexpr(&rule.expr, &mut count) { Some(count) } else { None }
    }

    /// Walks one LPR body: `count` accumulates the number of glyphs
    /// consumed so far (used only for the top-level entry-point match
    /// length; subroutine calls consume glyphs but don't themselves
    /// report a length back to `attempt_one`).
    fn match_rexpr(&mut self, expr: &RExpr, count: &mut u32) -> bool {
        match expr {
            RExpr::End => self.reader.peek().is_end_of_input(),
            // `resolve` already folds `not`'s complement against the
            // enclosing table's domain into the stored set
            // (tables/resolve.rs), so `NotTerminal` is matched exactly
            // like `Terminal` here — membership, not exclusion, against
            // `set`.
            RExpr::Terminal(set) | RExpr::NotTerminal(set) => {
                let glyph = self.reader.peek();
                let id = glyph_symbol(glyph);
                if set.contains(id) {
                    self.reader.next();
                    *count += 1;
                    true
                } else {
                    false
                }
            }
            RExpr::Ref(id) => self.match_lpr(*id).map(|n| *count += n).is_some(),
            RExpr::PrecedenceRef { .. } | RExpr::PrecedenceClimb { .. } => {
                // The `precedence` qualifier is PPR-only (spec.md §3); no
                // LPR body can resolve to either variant.
                unreachable!("precedence constructs never appear in a lexical rule body")
            }
            RExpr::Sequence(items) => {
                let checkpoint = self.reader.pos();
                let mut local = 0u32;
                for item in items {
                    if !self.match_rexpr(item, &mut local) {
                        self.rewind_to(checkpoint);
                        return false;
                    }
                }
                *count += local;
                true
            }
            RExpr::Alternation(alts) => {
                let checkpoint = self.reader.pos();
                for alt in alts {
                    let mut local = 0u32;
                    if self.match_rexpr(alt, &mut local) {
                        *count += local;
                        return true;
                    }
                    self.rewind_to(checkpoint);
                }
                false
            }
            RExpr::Lookahead(inner) => {
                let checkpoint = self.reader.pos();
                let mut local = 0u32;
                let ok = self.match_rexpr(inner, &mut local);
                self.rewind_to(checkpoint);
                ok
            }
            RExpr::LookaheadNot(inner) => {
                let checkpoint = self.reader.pos();
                let mut local = 0u32;
                let ok = self.match_rexpr(inner, &mut local);
                self.rewind_to(checkpoint);
                !ok
            }
            RExpr::Optional(inner) => {
                let checkpoint = self.reader.pos();
                let mut local = 0u32;
                if self.match_rexpr(inner, &mut local) {
                    *count += local;
                } else {
                    self.rewind_to(checkpoint);
                }
                true
            }
            RExpr::KleeneStar(inner) => {
                loop {
                    let checkpoint = self.reader.pos();
                    let mut local = 0u32;
                    if !self.match_rexpr(inner, &mut local) || local == 0 {
                        self.rewind_to(checkpoint);
                        break;
                    }
                    *count += local;
                }
                true
            }
            RExpr::KleenePlus(inner) => {
                let mut n = 0u32;
                loop {
                    let checkpoint = self.reader.pos();
                    let mut local = 0u32;
                    if !self.match_rexpr(inner, &mut local) || local == 0 {
                        self.rewind_to(checkpoint);
                        break;
                    }
                    *count += local;
                    n += 1;
                }
                n > 0
            }
        }
    }
}

fn glyph_symbol(glyph: Glyph) -> SymbolId {
    match glyph {
        Glyph::Normal { code_point, .. } => SymbolId::from_code_point(code_point),
        Glyph::Failure { .. } => SymbolId::FAILURE,
        Glyph::EndOfInput { .. } => SymbolId::END_OF_INPUT,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taul_core::{Qualifier, SourceCode, SpecWriter};
    use taul_compile::load;

    use super::*;

    fn grammar_abc_ws() -> Grammar {
        let mut w = SpecWriter::new();
        w.lpr_decl("abc");
        w.lpr_decl("ws");
        w.lpr("abc", Qualifier::None).string("abc").close();
        w.lpr("ws", Qualifier::Skip).kleene_plus().charset(" ").close().close();
        let spec = w.done();
        load(&spec).expect("grammar loads")
    }

    fn src(text: &str) -> Arc<SourceCode> {
        let mut sc = SourceCode::new();
        sc.add("t", text);
        Arc::new(sc)
    }

    /// S1 from spec.md §8.
    #[test]
    fn s1_three_abc_tokens_with_skipped_whitespace() {
        let g = grammar_abc_ws();
        let mut lexer = Lexer::new(&g, Reader::new(src("abc  abcabc")));
        let mut positions = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            if tok.is_end_of_input() {
                break;
            }
            if tok.is_normal() {
                positions.push(tok.low_pos().offset());
                assert_eq!(tok.len(), 3);
            }
        }
        assert_eq!(positions, vec![0, 5, 8]);
    }

    /// S4 from spec.md §8: `not` of a charset.
    #[test]
    fn s4_not_charset_matches_excluded_code_point_only() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).not().charset("abc").close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let mut lexer = Lexer::new(&g, Reader::new(src("xa")));
        let tok = lexer.next_token().unwrap();
        assert!(tok.is_normal());
        assert_eq!(tok.len(), 1);

        let mut lexer = Lexer::new(&g, Reader::new(src("a")));
        let tok = lexer.next_token().unwrap();
        assert!(tok.is_failure());
    }

    #[test]
    fn empty_successful_match_forces_a_length_one_failure_next() {
        // f: -end; matches empty at input start (spec.md §8 S3), and any
        // non-empty-remaining input afterward reports a failure token
        // since no rule can then progress past the forced checkpoint.
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).lookahead_not().end().close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let mut lexer = Lexer::new(&g, Reader::new(src("a")));
        let tok = lexer.next_token().unwrap();
        assert!(tok.is_failure());
        assert_eq!(tok.len(), 1);
    }

    /// S3 from spec.md §8, the `""` half: `-end` itself fails the
    /// lookahead-not assertion at true end-of-input, so `f` never
    /// matches and the lexer must report a `failure`, not jump straight
    /// to `end-of-input`.
    #[test]
    fn empty_input_reports_failure_before_end_of_input() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).lookahead_not().end().close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let mut lexer = Lexer::new(&g, Reader::new(src("")));
        let tok = lexer.next_token().unwrap();
        assert!(tok.is_failure());
        assert_eq!(tok.len(), 0);

        let tok = lexer.next_token().unwrap();
        assert!(tok.is_end_of_input());
    }
}
