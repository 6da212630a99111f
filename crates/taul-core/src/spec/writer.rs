use std::sync::Arc;

use super::opcode::Instr;
use crate::qualifier::Qualifier;
use crate::source::SourceCode;

/// An immutable, append-only instruction stream describing lexer/parser
/// rules. Built once by a [`SpecWriter`], thereafter shared freely.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    instrs: Vec<Instr>,
    src: Option<Arc<SourceCode>>,
}

impl Spec {
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn src(&self) -> Option<&Arc<SourceCode>> {
        self.src.as_ref()
    }

    pub fn associate(&mut self, src: Option<Arc<SourceCode>>) {
        self.src = src;
    }

    /// Concatenates two specs: instructions appended verbatim, the first
    /// spec's source-code association preserved.
    pub fn concat(a: &Spec, b: &Spec) -> Spec {
        let mut instrs = a.instrs.clone();
        instrs.extend(b.instrs.iter().cloned());
        Spec { instrs, src: a.src.clone() }
    }
}

/// Appends one opcode-tagged instruction per call; `done()` finishes the
/// stream and resets the writer for reuse.
#[derive(Debug, Clone, Default)]
pub struct SpecWriter {
    instrs: Vec<Instr>,
    src: Option<Arc<SourceCode>>,
}

impl SpecWriter {
    pub fn new() -> Self {
        SpecWriter::default()
    }

    /// Changes the source position tagged onto instructions written after
    /// this call; default is 0 until first changed.
    pub fn pos(&mut self, new_pos: u32) -> &mut Self {
        self.instrs.push(Instr::Pos(new_pos));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.instrs.push(Instr::Close);
        self
    }

    pub fn alternative(&mut self) -> &mut Self {
        self.instrs.push(Instr::Alternative);
        self
    }

    pub fn lpr_decl(&mut self, name: impl Into<String>) -> &mut Self {
        self.instrs.push(Instr::LprDecl(name.into()));
        self
    }

    pub fn ppr_decl(&mut self, name: impl Into<String>) -> &mut Self {
        self.instrs.push(Instr::PprDecl(name.into()));
        self
    }

    pub fn lpr(&mut self, name: impl Into<String>, qualifier: Qualifier) -> &mut Self {
        self.instrs.push(Instr::Lpr(name.into(), qualifier));
        self
    }

    pub fn ppr(&mut self, name: impl Into<String>, qualifier: Qualifier) -> &mut Self {
        self.instrs.push(Instr::Ppr(name.into(), qualifier));
        self
    }

    pub fn end(&mut self) -> &mut Self {
        self.instrs.push(Instr::End);
        self
    }

    pub fn any(&mut self) -> &mut Self {
        self.instrs.push(Instr::Any);
        self
    }

    pub fn string(&mut self, s: impl Into<String>) -> &mut Self {
        self.instrs.push(Instr::String(s.into()));
        self
    }

    pub fn charset(&mut self, s: impl Into<String>) -> &mut Self {
        self.instrs.push(Instr::Charset(s.into()));
        self
    }

    pub fn token(&mut self) -> &mut Self {
        self.instrs.push(Instr::Token);
        self
    }

    pub fn failure(&mut self) -> &mut Self {
        self.instrs.push(Instr::Failure);
        self
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.instrs.push(Instr::Name(name.into()));
        self
    }

    pub fn sequence(&mut self) -> &mut Self {
        self.instrs.push(Instr::Sequence);
        self
    }

    pub fn lookahead(&mut self) -> &mut Self {
        self.instrs.push(Instr::Lookahead);
        self
    }

    pub fn lookahead_not(&mut self) -> &mut Self {
        self.instrs.push(Instr::LookaheadNot);
        self
    }

    pub fn not(&mut self) -> &mut Self {
        self.instrs.push(Instr::Not);
        self
    }

    pub fn optional(&mut self) -> &mut Self {
        self.instrs.push(Instr::Optional);
        self
    }

    pub fn kleene_star(&mut self) -> &mut Self {
        self.instrs.push(Instr::KleeneStar);
        self
    }

    pub fn kleene_plus(&mut self) -> &mut Self {
        self.instrs.push(Instr::KleenePlus);
        self
    }

    pub fn associate(&mut self, src: Arc<SourceCode>) -> &mut Self {
        self.src = Some(src);
        self
    }

    /// Appends the entirety of `x`'s instructions to the stream being built.
    pub fn write_spec(&mut self, x: &Spec) -> &mut Self {
        self.instrs.extend(x.instrs.iter().cloned());
        self
    }

    /// Finishes writing, returning the completed spec and resetting the
    /// writer's state.
    pub fn done(&mut self) -> Spec {
        let instrs = std::mem::take(&mut self.instrs);
        let src = self.src.take();
        Spec { instrs, src }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_builds_then_resets() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f").lpr("f", Qualifier::None).string("abc").close();
        let s = w.done();
        assert_eq!(s.len(), 4);
        assert!(w.done().is_empty());
    }

    #[test]
    fn concat_preserves_first_src_association() {
        let mut a = SpecWriter::new();
        a.lpr_decl("a");
        let a = a.done();
        let mut b = SpecWriter::new();
        b.lpr_decl("b");
        let b = b.done();
        let c = Spec::concat(&a, &b);
        assert_eq!(c.len(), 2);
        assert!(c.src().is_none());
    }
}
