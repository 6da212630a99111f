//! The reader: the pipeline's glyph source (spec.md §4.5 "Reader").
//!
//! A [`SourceCode`] is built from already-decoded `&str` pages (decoding
//! and encoding detection are an explicit non-goal of the core), so a
//! [`Reader`] over one can never actually hit the `failure`-glyph path —
//! every byte offset it visits is a UTF-8 char boundary by construction.
//! [`Glyph::Failure`] stays part of the type so the lexer's coalescing
//! logic is exercised the same way it would be over a source that *could*
//! contain raw decode failures, and so a future `SourceCode` constructor
//! taking raw bytes has somewhere to report into.

use std::sync::Arc;

use taul_core::source::SourcePos;
use taul_core::{Glyph, SourceCode};

/// Produces one [`Glyph`] per Unicode scalar value of a bound source, in
/// order, ending in exactly one `end-of-input` glyph.
///
/// Owns its source reference, per spec.md §5 ("readers own their source
/// text reference"). `peek` is idempotent; `next` advances by the peeked
/// glyph's byte length and notifies the bound observer, if any.
pub struct Reader {
    source: Arc<SourceCode>,
    pos: u32,
    observer: Option<Box<dyn FnMut(Glyph)>>,
}

impl Reader {
    pub fn new(source: Arc<SourceCode>) -> Self {
        Reader { source, pos: 0, observer: None }
    }

    /// Binds a callback invoked with every glyph `next` emits.
    pub fn bind_observer(&mut self, observer: impl FnMut(Glyph) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn unbind_observer(&mut self) {
        self.observer = None;
    }

    /// Rewinds to the start of the source. Does not clear the bound
    /// observer.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.pos)
    }

    /// True once every glyph, including the terminal `end-of-input` one,
    /// has been consumed by `next`.
    pub fn done(&self) -> bool {
        self.pos > self.source.len()
    }

    /// The glyph at the current position, without advancing.
    pub fn peek(&self) -> Glyph {
        if self.pos >= self.source.len() {
            return Glyph::EndOfInput { pos: SourcePos::new(self.source.len()) };
        }
        let pos = SourcePos::new(self.pos);
        let rest = &self.source.text()[self.pos as usize..];
        match rest.chars().next() {
            Some(c) => Glyph::Normal { code_point: c as u32, pos, len: c.len_utf8() as u32 },
            None => Glyph::EndOfInput { pos },
        }
    }

    /// Advances past the peeked glyph and notifies the bound observer.
    pub fn next(&mut self) -> Glyph {
        let glyph = self.peek();
        if glyph.is_end_of_input() {
            // Emitted exactly once: advancing past it moves `pos` one
            // further than source length so `done` flips permanently
            // instead of `peek` looping forever at end-of-input.
            self.pos = self.source.len() + 1;
        } else {
            self.pos += glyph.len();
        }
        if let Some(obs) = &mut self.observer {
            obs(glyph);
        }
        glyph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(text: &str) -> Arc<SourceCode> {
        let mut sc = SourceCode::new();
        sc.add("t", text);
        Arc::new(sc)
    }

    #[test]
    fn emits_one_glyph_per_code_point_then_end_of_input() {
        let mut r = Reader::new(src("ab"));
        assert_eq!(r.next().code_point(), Some('a' as u32));
        assert_eq!(r.next().code_point(), Some('b' as u32));
        let end = r.next();
        assert!(end.is_end_of_input());
        assert_eq!(end.pos(), SourcePos::new(2));
        assert!(r.done());
    }

    #[test]
    fn peek_is_idempotent() {
        let mut r = Reader::new(src("xy"));
        assert_eq!(r.peek(), r.peek());
        let peeked = r.peek();
        assert_eq!(r.next(), peeked);
    }

    #[test]
    fn observer_sees_every_emitted_glyph() {
        let mut r = Reader::new(src("ab"));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        r.bind_observer(move |g| seen2.lock().unwrap().push(g));
        while !r.done() {
            r.next();
        }
        assert_eq!(seen.lock().unwrap().len(), 3); // 'a', 'b', end-of-input
    }

    #[test]
    fn reset_rewinds_without_clearing_observer() {
        let mut r = Reader::new(src("a"));
        r.next();
        r.reset();
        assert_eq!(r.pos(), SourcePos::new(0));
        assert_eq!(r.peek().code_point(), Some('a' as u32));
    }

    #[test]
    fn multi_byte_code_point_advances_by_its_utf8_length() {
        let mut r = Reader::new(src("\u{1F600}a"));
        let g = r.next();
        assert_eq!(g.len(), 4);
        assert_eq!(r.peek().code_point(), Some('a' as u32));
    }
}
