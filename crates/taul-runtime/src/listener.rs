//! The push-based listener sink (spec.md §4.5 "Parser", §9 "Push-based
//! listener vs pull-based pipeline").
//!
//! The pipeline itself stays pull-based end to end: [`crate::Parser`]
//! drives the syntactic table and builds a [`ParseTree`] directly, then
//! adapts that finished tree into a listener's push events via
//! [`playback`] — exactly the way the tree's node array is itself "the
//! would-be tree" a live push adapter would have produced, but computed
//! once the whole structure (including any left-recursion rewriting, see
//! `ParseTree::wrap_as_parent`) is already known. Terminal/nonterminal
//! syntax errors are the one event pair that does *not* round-trip
//! through playback — they aren't part of the tree, so a bound listener
//! is notified of them directly as the parser encounters them.

use taul_core::source::SourcePos;
use taul_core::{ParseTree, SymbolId, Token};
use taul_compile::TermSet;

/// Receives parse-tree construction events, either live (errors only) or
/// replayed from a finished tree (everything else). Every method has a
/// no-op default so an implementor only overrides the handful of events
/// it actually cares about.
pub trait Listener {
    fn on_startup(&mut self) {}
    fn on_shutdown(&mut self) {}
    fn on_lexical(&mut self, _token: Token) {}
    fn on_syntactic(&mut self, _ppr: SymbolId, _pos: SourcePos) {}
    fn on_close(&mut self) {}
    fn on_abort(&mut self) {}

    /// A token failed to match an expected terminal set. Does not
    /// participate in [`playback`] — it isn't part of the parse tree.
    fn on_terminal_error(&mut self, _expected: TermSet, _actual: Token) {}
    /// No alternative of `rule` could be predicted on `actual`. Does not
    /// participate in [`playback`].
    fn on_nonterminal_error(&mut self, _rule: SymbolId, _actual: Token) {}

    /// Replays the event sequence that would have arisen while `tree` was
    /// being built: `on_startup`, one `on_syntactic`/`on_lexical`/`on_close`
    /// per node in depth-first order, `on_abort` if the tree was aborted,
    /// then `on_shutdown`.
    fn playback(&mut self, tree: &ParseTree)
    where
        Self: Sized,
    {
        playback_into(self, tree);
    }
}

/// Free function twin of [`Listener::playback`], usable through a
/// `&mut dyn Listener` (the trait method itself requires `Self: Sized`
/// so it can't be called through a trait object).
pub fn playback_into(listener: &mut (impl Listener + ?Sized), tree: &ParseTree) {
    listener.on_startup();
    // Mirrors the node-level bookkeeping of a live push adapter: a stack
    // of currently-open syntactic node indices, innermost last. A node
    // whose level is no deeper than the stack top's means every node
    // still open at that level or deeper has been fully visited.
    let mut open: Vec<usize> = Vec::new();
    for node in tree.iter() {
        while let Some(&top) = open.last() {
            if node.level() > tree.nodes()[top].level() {
                break;
            }
            listener.on_close();
            open.pop();
        }
        if node.is_lexical() {
            listener.on_lexical(token_for(node));
        } else if node.is_syntactic() {
            listener.on_syntactic(node.symbol(), node.low_pos());
            open.push(node.index());
        }
    }
    while !open.is_empty() {
        listener.on_close();
        open.pop();
    }
    if tree.is_aborted() {
        listener.on_abort();
    }
    listener.on_shutdown();
}

/// Reconstructs the [`Token`] a lexical node was built from: a normal
/// token when the node carries a rule reference, otherwise the `failure`
/// sentinel (the only non-LPR symbol a leaf node can carry, §3).
fn token_for(node: &taul_core::tree::Node) -> Token {
    match node.rule_ref() {
        Some(rule) => Token::normal(rule, node.low_pos(), node.len()),
        None => Token::failure(node.low_pos(), node.len()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use taul_core::SourceCode;
    use taul_core::SpecWriter;
    use taul_core::Qualifier;
    use taul_compile::load;

    use super::*;
    use crate::{Lexer, Parser, Reader};

    #[derive(Default)]
    struct Recorder(Vec<String>);
    impl Listener for Recorder {
        fn on_startup(&mut self) {
            self.0.push("startup".into());
        }
        fn on_shutdown(&mut self) {
            self.0.push("shutdown".into());
        }
        fn on_lexical(&mut self, token: Token) {
            self.0.push(format!("lexical({})", token.id()));
        }
        fn on_syntactic(&mut self, ppr: SymbolId, pos: SourcePos) {
            self.0.push(format!("syntactic({}@{})", ppr, pos.offset()));
        }
        fn on_close(&mut self) {
            self.0.push("close".into());
        }
    }

    #[test]
    fn playback_round_trips_a_simple_tree() {
        let mut w = SpecWriter::new();
        w.lpr_decl("chr");
        w.ppr_decl("start");
        w.lpr("chr", Qualifier::None).any().close();
        w.ppr("start", Qualifier::None).name("chr").name("chr").close();
        let spec = w.done();
        let g = load(&spec).unwrap();

        let mut sc = SourceCode::new();
        sc.add("t", "ab");
        let reader = Reader::new(std::sync::Arc::new(sc));
        let lexer = Lexer::new(&g, reader);
        let mut parser = Parser::new(&g, lexer);
        let start = g.ppr_id("start").unwrap();
        let tree = parser.parse(start);
        assert!(tree.is_sealed());

        let events = Rc::new(RefCell::new(Recorder::default()));
        let events2 = events.clone();
        struct Forward(Rc<RefCell<Recorder>>);
        impl Listener for Forward {
            fn on_startup(&mut self) {
                self.0.borrow_mut().on_startup();
            }
            fn on_shutdown(&mut self) {
                self.0.borrow_mut().on_shutdown();
            }
            fn on_lexical(&mut self, token: Token) {
                self.0.borrow_mut().on_lexical(token);
            }
            fn on_syntactic(&mut self, ppr: SymbolId, pos: SourcePos) {
                self.0.borrow_mut().on_syntactic(ppr, pos);
            }
            fn on_close(&mut self) {
                self.0.borrow_mut().on_close();
            }
        }
        let mut fwd = Forward(events2);
        fwd.playback(&tree);

        let seq = events.borrow().0.clone();
        assert_eq!(seq.first().unwrap(), "startup");
        assert_eq!(seq.last().unwrap(), "shutdown");
        assert_eq!(seq.iter().filter(|s| *s == "close").count(), 1);
    }
}
